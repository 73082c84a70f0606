use routelab::Error;
use routelab::crc::{self, Polynomial};

fn flip(data: &str, index: usize) -> String {
    data.char_indices()
        .map(|(i, c)| match (i == index, c) {
            (true, '0') => '1',
            (true, _) => '0',
            (false, c) => c,
        })
        .collect()
}

#[test]
fn test_round_trip_detects_single_bit_errors() {
    let message = "1101011011";
    let poly: Polynomial = "x³+x²+x+1".parse().unwrap();
    assert_eq!(poly.divisor(), "1111");

    let remainder = crc::compute(message, poly).unwrap();
    assert_eq!(remainder.len(), 3);

    let transmitted = format!("{}{}", message, remainder);
    assert!(crc::validate(&transmitted, poly).unwrap());

    for i in 0..transmitted.len() {
        let corrupted = flip(&transmitted, i);
        assert!(!crc::validate(&corrupted, poly).unwrap(), "flip at {} went undetected", i);
    }
}

#[test]
fn test_every_polynomial_round_trips() {
    for poly in Polynomial::ALL {
        for message in ["1", "10", "1011", "111000111000", "100000000001"] {
            let data = crc::encode(message, poly).unwrap();
            assert_eq!(data.len(), message.len() + poly.degree());
            assert!(crc::validate(&data, poly).unwrap(), "{} with {}", message, poly);
        }
    }
}

#[test]
fn test_steps_end_with_crc() {
    let steps = crc::get_steps("1101011011", Polynomial::X3Plus1).unwrap();
    assert!(steps.iter().any(|s| s.contains("binary 1001")));
    assert_eq!(steps.last().unwrap(), "final remainder (CRC): 100");
}

#[test]
fn test_rejects_bad_input() {
    assert!(matches!("x7+1".parse::<Polynomial>(), Err(Error::NotFound(_))));
    assert!(matches!(crc::ensure_binary("10 01"), Err(Error::InvalidInput(_))));
    assert!(matches!(crc::get_steps("abc", Polynomial::X3X2X1), Err(Error::InvalidInput(_))));
}
