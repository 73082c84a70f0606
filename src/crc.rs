//! CRC by binary long division, with a printable trace of every step.
//!
//! Messages are strings of `'0'` and `'1'`. The generator is one of the
//! [`Polynomial`]s; its divisor bits are looked up, never derived.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polynomial {
    /// x⁸+x²+x+1
    X8X2X1,
    /// x³+x²+x+1
    X3X2X1,
    /// x³+1
    X3Plus1,
}

impl Polynomial {
    pub const ALL: [Polynomial; 3] = [Polynomial::X8X2X1, Polynomial::X3X2X1, Polynomial::X3Plus1];

    pub fn divisor(&self) -> &'static str {
        match self {
            Polynomial::X8X2X1 => "100000111",
            Polynomial::X3X2X1 => "1111",
            Polynomial::X3Plus1 => "1001",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Polynomial::X8X2X1 => "x8+x2+x+1",
            Polynomial::X3X2X1 => "x³+x²+x+1",
            Polynomial::X3Plus1 => "x³+1",
        }
    }

    /// Number of CRC bits.
    pub fn degree(&self) -> usize {
        self.divisor().len() - 1
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Polynomial {
    type Err = Error;

    /// Accepts the display names and their plain ASCII spellings
    /// (`x3+x2+x+1`, `x^3 + 1`).
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '^')
            .map(|c| match c {
                '⁸' => '8',
                '³' => '3',
                '²' => '2',
                other => other.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "x8+x2+x+1" => Ok(Polynomial::X8X2X1),
            "x3+x2+x+1" => Ok(Polynomial::X3X2X1),
            "x3+1" => Ok(Polynomial::X3Plus1),
            _ => Err(Error::NotFound(format!("generator polynomial '{}'", s))),
        }
    }
}

/// Rejects empty input and anything other than '0' and '1'.
pub fn ensure_binary(data: &str) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidInput("binary data is empty".into()));
    }
    match data.chars().find(|c| *c != '0' && *c != '1') {
        Some(c) => Err(Error::InvalidInput(format!(
            "'{}' is not binary (found '{}')",
            data, c
        ))),
        None => Ok(()),
    }
}

fn xor(a: &str, b: &str) -> String {
    a.chars()
        .zip(b.chars())
        .map(|(x, y)| if x == y { '0' } else { '1' })
        .collect()
}

/// Long division of `data` by `divisor`, appending trace lines to `steps`.
/// Returns the remainder, exactly `divisor.len() - 1` bits wide.
fn divide(data: &str, divisor: &str, steps: &mut Vec<String>) -> String {
    let k = divisor.len();
    let n = data.len();

    steps.push(format!("dividend: {}", data));
    steps.push(format!("divisor G(x): {}", divisor));
    steps.push(format!("divisor bits (k): {}", k));
    steps.push("---".to_string());

    if n < k {
        let remainder = format!("{:0>width$}", data, width = k - 1);
        steps.push(format!(
            "dividend is shorter than the divisor, it is the remainder: {}",
            remainder
        ));
        return remainder;
    }

    let mut window = data[..k].to_string();
    for i in 0..=(n - k) {
        let indent = " ".repeat(i);
        steps.push(format!("step {}:", i + 1));
        steps.push(format!(
            "  dividend (window):   {}[{}]{}",
            &data[..i],
            &data[i..i + k],
            &data[i + k..]
        ));
        steps.push(format!("  remainder before:    {}", window));

        let xored = if window.starts_with('1') {
            steps.push(format!("  divisor G(x):        {}{}", indent, divisor));
            xor(&window, divisor)
        } else {
            steps.push(format!("  divisor (0...0):     {}{}", indent, "0".repeat(k)));
            window.clone()
        };
        steps.push("  ---".to_string());
        steps.push(format!("  xor result:          {}{}", indent, xored));

        let trimmed = xored.trim_start_matches('0');
        let effective = if trimmed.is_empty() { "0" } else { trimmed };
        steps.push(format!("  remainder after:     {}", effective));

        if i + k < n {
            let next = &data[i + k..i + k + 1];
            window = format!("{:0>width$}", format!("{}{}", effective, next), width = k);
            steps.push(format!("  bring down '{}', new window: {}", next, window));
        } else {
            // leading bit is always 0 after the last subtraction
            window = xored[1..].to_string();
            steps.push("  all data bits processed".to_string());
        }
        steps.push("---".to_string());
    }

    steps.push(format!("final remainder (CRC): {}", window));
    debug!("{} mod {} = {}", data, divisor, window);
    window
}

/// CRC bits for `message`.
pub fn compute(message: &str, polynomial: Polynomial) -> Result<String> {
    let mut steps = Vec::new();
    run(message, polynomial, &mut steps)
}

/// Full printable calculation for `message`, ending with the CRC line.
pub fn get_steps(message: &str, polynomial: Polynomial) -> Result<Vec<String>> {
    let mut steps = Vec::new();
    run(message, polynomial, &mut steps)?;
    Ok(steps)
}

/// `message` followed by its CRC.
pub fn encode(message: &str, polynomial: Polynomial) -> Result<String> {
    Ok(format!("{}{}", message, compute(message, polynomial)?))
}

/// True iff dividing `data` (message followed by CRC) leaves no remainder.
pub fn validate(data: &str, polynomial: Polynomial) -> Result<bool> {
    ensure_binary(data)?;
    let mut steps = Vec::new();
    let remainder = divide(data, polynomial.divisor(), &mut steps);
    Ok(remainder.chars().all(|c| c == '0'))
}

fn run(message: &str, polynomial: Polynomial, steps: &mut Vec<String>) -> Result<String> {
    ensure_binary(message)?;

    let degree = polynomial.degree();
    let padded = format!("{}{}", message, "0".repeat(degree));

    steps.push("CRC calculation".to_string());
    steps.push(format!("message: {}", message));
    steps.push(format!(
        "generator polynomial: {} (binary {})",
        polynomial,
        polynomial.divisor()
    ));
    steps.push(format!("CRC bits (degree): {}", degree));
    steps.push("---".to_string());
    steps.push(format!("append {} zero bits to '{}'", degree, message));
    steps.push(format!("  padded data: {}", padded));
    steps.push("---".to_string());

    Ok(divide(&padded, polynomial.divisor(), steps))
}
