//! Conversion between dotted-quad IPv4 text and its numeric form.
//!
//! The numeric form is what the CSV and SQL copies of the GeoIP data are
//! keyed on: `24.24.24.24` is `404232216`.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GeoIpError;

/// An IPv4 address held as its big-endian 32-bit value.
///
/// # Example
///
/// ```
/// use geoip::Ipv4Address;
///
/// let addr: Ipv4Address = "24.24.24.24".parse().unwrap();
/// assert_eq!(addr.to_u32(), 404_232_216);
/// assert_eq!(addr.to_string(), "24.24.24.24");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ipv4Address(u32);

impl Ipv4Address {
    /// Builds an address from its four octets, most significant first.
    #[must_use]
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Address(u32::from_be_bytes([a, b, c, d]))
    }

    /// Wraps a numeric address.
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Ipv4Address(value)
    }

    /// Returns the numeric address.
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    /// Returns the four octets, most significant first.
    #[must_use]
    pub fn octets(self) -> [u8; 4] {
        let mut octets = [0u8; 4];
        for (i, octet) in octets.iter_mut().rev().enumerate() {
            *octet = ((self.0 >> (i * 8)) & 0xFF) as u8;
        }
        octets
    }

    /// Returns the network of length `prefix` that contains this address.
    ///
    /// ```
    /// use geoip::Ipv4Address;
    ///
    /// let addr = Ipv4Address::new(24, 24, 24, 24);
    /// let net = addr.network(16).unwrap();
    /// assert_eq!(net.to_string(), "24.24.0.0/16");
    /// ```
    pub fn network(self, prefix: u8) -> Result<Ipv4Network, GeoIpError> {
        let mask = match prefix {
            1..=32 => u32::MAX << (32 - u32::from(prefix)),
            _ => 0,
        };
        let network = Ipv4Network::new(Ipv4Addr::from(self.0 & mask), prefix)?;
        Ok(network)
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets();
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl FromStr for Ipv4Address {
    type Err = GeoIpError;

    /// Parses strict dotted-quad text: four groups of one to three digits,
    /// each at most 255, with no leading zeros, signs or whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut value: u32 = 0;
        let mut groups = 0;
        for group in s.split('.') {
            groups += 1;
            if groups > 4 {
                return Err(GeoIpError::invalid_format(format!(
                    "{s:?} has more than four octets"
                )));
            }
            value = (value << 8) | u32::from(parse_octet(s, group)?);
        }
        if groups != 4 {
            return Err(GeoIpError::invalid_format(format!(
                "{s:?} does not have four octets"
            )));
        }
        Ok(Ipv4Address(value))
    }
}

fn parse_octet(input: &str, group: &str) -> Result<u8, GeoIpError> {
    if group.is_empty() || group.len() > 3 {
        return Err(GeoIpError::invalid_format(format!(
            "{input:?} has an octet of invalid length"
        )));
    }
    if !group.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GeoIpError::invalid_format(format!(
            "{input:?} contains a non-numeric octet {group:?}"
        )));
    }
    if group.len() > 1 && group.starts_with('0') {
        return Err(GeoIpError::invalid_format(format!(
            "{input:?} has an octet with a leading zero"
        )));
    }
    let octet: u16 = group
        .parse()
        .map_err(|_| GeoIpError::invalid_format(format!("{input:?} is not a number")))?;
    u8::try_from(octet)
        .map_err(|_| GeoIpError::invalid_format(format!("octet {octet} of {input:?} exceeds 255")))
}

impl From<u32> for Ipv4Address {
    fn from(value: u32) -> Self {
        Ipv4Address(value)
    }
}

impl From<Ipv4Address> for u32 {
    fn from(addr: Ipv4Address) -> Self {
        addr.0
    }
}

impl From<[u8; 4]> for Ipv4Address {
    fn from(octets: [u8; 4]) -> Self {
        Ipv4Address(u32::from_be_bytes(octets))
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Ipv4Address(u32::from(addr))
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(addr: Ipv4Address) -> Self {
        Ipv4Addr::from(addr.0)
    }
}

/// Numbers wider than 32 bits are rejected rather than truncated.
impl TryFrom<u64> for Ipv4Address {
    type Error = GeoIpError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        u32::try_from(value).map(Ipv4Address).map_err(|_| {
            GeoIpError::invalid_format(format!("{value} is out of the IPv4 range"))
        })
    }
}

impl TryFrom<i64> for Ipv4Address {
    type Error = GeoIpError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value).map(Ipv4Address).map_err(|_| {
            GeoIpError::invalid_format(format!("{value} is out of the IPv4 range"))
        })
    }
}

impl Serialize for Ipv4Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

/// Returns the numeric form of a dotted-quad address.
///
/// ```
/// assert_eq!(geoip::addr_to_num("24.24.24.24").unwrap(), 404_232_216);
/// assert!(geoip::addr_to_num("256.1.1.1").is_err());
/// ```
pub fn addr_to_num(addr: &str) -> Result<u32, GeoIpError> {
    addr.parse::<Ipv4Address>().map(Ipv4Address::to_u32)
}

/// Returns the dotted-quad text of a numeric address.
///
/// ```
/// assert_eq!(geoip::num_to_addr(404_232_216).unwrap(), "24.24.24.24");
/// assert!(geoip::num_to_addr(1 << 32).is_err());
/// ```
pub fn num_to_addr(num: u64) -> Result<String, GeoIpError> {
    Ipv4Address::try_from(num).map(|addr| addr.to_string())
}
