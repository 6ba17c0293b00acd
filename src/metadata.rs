//! Database metadata types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::charset::Charset;
use crate::error::GeoIpError;

/// The kind of database, which decides the shape of a lookup result.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    /// City-level records.
    City,
    /// Country id per address.
    Country,
    /// Organization name per address.
    #[serde(alias = "org")]
    Organization,
    /// ISP name per address.
    Isp,
    /// Domain name per address.
    Domain,
    /// Connection speed per address.
    #[serde(alias = "net_speed")]
    NetSpeed,
}

impl Edition {
    /// The result key of a single-value edition, or `None` for City and
    /// Country.
    #[must_use]
    pub fn value_key(self) -> Option<&'static str> {
        match self {
            Edition::Organization => Some("name"),
            Edition::Isp => Some("isp"),
            Edition::Domain => Some("domain"),
            Edition::NetSpeed => Some("netspeed"),
            Edition::City | Edition::Country => None,
        }
    }

    /// Returns true for the editions that yield one string per address.
    #[must_use]
    pub fn is_single_value(self) -> bool {
        self.value_key().is_some()
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Edition::City => "city",
            Edition::Country => "country",
            Edition::Organization => "organization",
            Edition::Isp => "isp",
            Edition::Domain => "domain",
            Edition::NetSpeed => "netspeed",
        })
    }
}

impl FromStr for Edition {
    type Err = GeoIpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "city" => Ok(Edition::City),
            "country" => Ok(Edition::Country),
            "organization" | "org" => Ok(Edition::Organization),
            "isp" => Ok(Edition::Isp),
            "domain" => Ok(Edition::Domain),
            "netspeed" | "net_speed" => Ok(Edition::NetSpeed),
            _ => Err(GeoIpError::invalid_database(format!(
                "unknown database edition {s:?}"
            ))),
        }
    }
}

/// Metadata about a GeoIP database.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Metadata {
    /// Kind of records the database holds.
    pub edition: Edition,
    /// Unix timestamp when the database was built.
    #[serde(default)]
    pub build_epoch: u64,
    /// Free-form description, e.g. "GEO-533LITE 20090601 Build 1".
    #[serde(default)]
    pub description: String,
    /// Character set of the text fields.
    #[serde(default)]
    pub charset: Charset,
}

impl Metadata {
    /// Metadata with no build time or description, ISO-8859-1 text.
    #[must_use]
    pub fn new(edition: Edition) -> Self {
        Metadata {
            edition,
            build_epoch: 0,
            description: String::new(),
            charset: Charset::default(),
        }
    }

    /// Returns the database build time as a `SystemTime`.
    ///
    /// This converts the `build_epoch` Unix timestamp to a `SystemTime`.
    ///
    /// # Example
    ///
    /// ```
    /// use geoip::{Edition, Metadata};
    ///
    /// let mut metadata = Metadata::new(Edition::City);
    /// metadata.build_epoch = 1_243_814_400;
    /// println!("Database built: {:?}", metadata.build_time());
    /// ```
    #[must_use]
    pub fn build_time(&self) -> std::time::SystemTime {
        std::time::UNIX_EPOCH + std::time::Duration::from_secs(self.build_epoch)
    }
}
