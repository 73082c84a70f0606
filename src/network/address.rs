use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Four-octet address used for hosts, networks and subnet masks.
///
/// Parsing only accepts dotted-decimal text with exactly four octets in
/// `0..=255`. Values are immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    octets: [u8; 4],
}

impl Address {
    pub const UNSPECIFIED: Address = Address { octets: [0, 0, 0, 0] };

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self { octets: [a, b, c, d] }
    }

    pub const fn from_octets(octets: [u8; 4]) -> Self {
        Self { octets }
    }

    /// Builds an address from a byte slice, which must be exactly four bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let octets: [u8; 4] = bytes
            .try_into()
            .map_err(|_| Error::InvalidAddress(format!("{:?} (expected 4 bytes)", bytes)))?;
        Ok(Self { octets })
    }

    pub fn parse(text: &str) -> Result<Self> {
        text.parse()
    }

    /// Parses a subnet mask, rejecting masks whose one bits are not contiguous.
    pub fn parse_mask(text: &str) -> Result<Self> {
        let mask = Self::parse(text)?;
        mask.validate_mask()?;
        Ok(mask)
    }

    pub fn octets(&self) -> [u8; 4] {
        self.octets
    }

    /// Big-endian integer form.
    pub fn to_bits(&self) -> u32 {
        u32::from_be_bytes(self.octets)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self { octets: bits.to_be_bytes() }
    }

    /// Component-wise AND with `mask`.
    pub fn network_address(&self, mask: Address) -> Address {
        let mut octets = [0u8; 4];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = self.octets[i] & mask.octets[i];
        }
        Address { octets }
    }

    /// Number of leading one bits when this address is read as a mask.
    pub fn prefix_len(&self) -> u8 {
        self.to_bits().leading_ones() as u8
    }

    pub fn validate_mask(&self) -> Result<()> {
        ipnet::ipv4_mask_to_prefix(Ipv4Addr::from(*self))
            .map(|_| ())
            .map_err(|_| Error::InvalidAddress(format!("{} (mask bits are not contiguous)", self)))
    }

    /// True iff both masks are equal and both addresses fall in the same network.
    pub fn same_subnet(a: Address, mask_a: Address, b: Address, mask_b: Address) -> bool {
        if mask_a != mask_b {
            return false;
        }
        (a.to_bits() & mask_a.to_bits()) == (b.to_bits() & mask_b.to_bits())
    }

    /// `network/prefix` rendering, falling back to `network/mask` for
    /// masks that have no prefix form.
    pub fn cidr_notation(network: Address, mask: Address) -> String {
        match Ipv4Net::with_netmask(network.into(), mask.into()) {
            Ok(net) => net.to_string(),
            Err(_) => format!("{}/{}", network, mask),
        }
    }
}

/// Converts a dotted-decimal mask to its prefix length.
pub fn cidr_from_mask(mask: &str) -> Result<u8> {
    Ok(Address::parse_mask(mask)?.prefix_len())
}

/// Converts a prefix length to its dotted-decimal mask.
pub fn mask_from_cidr(prefix: u8) -> Result<Address> {
    let net = Ipv4Net::new(Ipv4Addr::UNSPECIFIED, prefix)
        .map_err(|_| Error::InvalidInput(format!("prefix length {} is outside 0..=32", prefix)))?;
    Ok(net.netmask().into())
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split('.').collect();
        if parts.len() != 4 {
            return Err(Error::InvalidAddress(text.to_string()));
        }

        let mut octets = [0u8; 4];
        for (octet, part) in octets.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::InvalidAddress(text.to_string()));
            }
            *octet = part
                .parse::<u8>()
                .map_err(|_| Error::InvalidAddress(text.to_string()))?;
        }
        Ok(Self { octets })
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(text: String) -> Result<Self> {
        text.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl From<Ipv4Addr> for Address {
    fn from(addr: Ipv4Addr) -> Self {
        Self { octets: addr.octets() }
    }
}

impl From<Address> for Ipv4Addr {
    fn from(addr: Address) -> Self {
        Ipv4Addr::from(addr.octets)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(text: &str) -> Address {
        Address::parse(text).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let a = addr("192.168.1.10");
        assert_eq!(a.octets(), [192, 168, 1, 10]);
        assert_eq!(a.to_string(), "192.168.1.10");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in [
            "192.168.1",
            "192.168.1.1.1",
            "256.0.0.1",
            "a.b.c.d",
            "",
            "1..2.3",
            "+192.+168.+1.+1",
            "10.0.0.+1",
            " 10.0.0.1",
        ] {
            assert!(
                matches!(Address::parse(text), Err(Error::InvalidAddress(_))),
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn test_from_bytes_requires_four() {
        assert_eq!(Address::from_bytes(&[10, 0, 0, 1]).unwrap(), addr("10.0.0.1"));
        assert!(Address::from_bytes(&[10, 0, 0]).is_err());
        assert!(Address::from_bytes(&[10, 0, 0, 1, 2]).is_err());
    }

    #[test]
    fn test_network_address() {
        let net = addr("192.168.1.77").network_address(addr("255.255.255.0"));
        assert_eq!(net, addr("192.168.1.0"));
    }

    #[test]
    fn test_masking_is_idempotent() {
        let hosts = ["10.1.2.3", "192.168.200.17", "255.255.255.255", "0.0.0.0", "172.16.9.254"];
        for host in hosts {
            for prefix in 0..=32u8 {
                let mask = mask_from_cidr(prefix).unwrap();
                let once = addr(host).network_address(mask);
                assert_eq!(once.network_address(mask), once);
            }
        }
    }

    #[test]
    fn test_cidr_conversion() {
        assert_eq!(cidr_from_mask("255.255.255.0").unwrap(), 24);
        assert_eq!(cidr_from_mask("255.255.0.0").unwrap(), 16);
        assert_eq!(cidr_from_mask("0.0.0.0").unwrap(), 0);
        assert_eq!(cidr_from_mask("255.255.255.255").unwrap(), 32);
        assert!(cidr_from_mask("255.255.0").is_err());
        assert!(cidr_from_mask("255.255.300.0").is_err());
        assert!(matches!(cidr_from_mask("255.0.255.0"), Err(Error::InvalidAddress(_))));

        assert_eq!(mask_from_cidr(24).unwrap(), addr("255.255.255.0"));
        assert_eq!(mask_from_cidr(0).unwrap(), Address::UNSPECIFIED);
        assert!(mask_from_cidr(33).is_err());
    }

    #[test]
    fn test_parse_mask_rejects_holes() {
        assert!(Address::parse_mask("255.255.255.0").is_ok());
        assert!(Address::parse_mask("255.0.255.0").is_err());
    }

    #[test]
    fn test_same_subnet() {
        let mask = addr("255.255.255.0");
        assert!(Address::same_subnet(addr("10.0.1.5"), mask, addr("10.0.1.200"), mask));
        assert!(!Address::same_subnet(addr("10.0.1.5"), mask, addr("10.0.2.5"), mask));
        assert!(!Address::same_subnet(
            addr("10.0.1.5"),
            mask,
            addr("10.0.1.6"),
            addr("255.255.0.0")
        ));
    }

    #[test]
    fn test_bits_agree_with_octet_masking() {
        let host = addr("172.20.33.129");
        let mask = addr("255.255.255.192");
        let by_bits = Address::from_bits(host.to_bits() & mask.to_bits());
        assert_eq!(by_bits, host.network_address(mask));
    }

    #[test]
    fn test_cidr_notation() {
        assert_eq!(
            Address::cidr_notation(addr("10.1.0.0"), addr("255.255.0.0")),
            "10.1.0.0/16"
        );
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&addr("10.0.0.1")).unwrap();
        assert_eq!(json, "\"10.0.0.1\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr("10.0.0.1"));
        assert!(serde_json::from_str::<Address>("\"10.0.0\"").is_err());
    }
}
