#![deny(trivial_casts, trivial_numeric_casts, unused_import_braces)]
//! # GeoIP
//!
//! This library converts IPv4 addresses between dotted-quad text and their
//! numeric form, and decodes legacy GeoIP lookups (City, Country,
//! Organization, ISP, Domain and NetSpeed) into flat field maps.
//!
//! ## Features
//!
//! - **`mmap`** (default: disabled): Memory-map the database file for
//!   [`LoadMode::Filesystem`] lookups instead of reading it
//! - **`simdutf8`** (default: disabled): Use SIMD instructions for faster
//!   UTF-8 validation during text transcoding
//!
//! ## Thread Safety
//!
//! [`RecordDecoder`] and the address codec are stateless. [`TableDatabase`]
//! is `Send` and `Sync`, so a [`Database`] over it can be shared across
//! threads.
//!
//! ## Quick Start
//!
//! ```rust
//! use geoip::{Database, OpenOptions, TableDatabase};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Open database file
//! #   let db = Database::<TableDatabase>::open(
//! #       "test-data/GeoLiteCity-Test.json", &OpenOptions::default())?;
//! #   /*
//!     let db = Database::<TableDatabase>::open("/path/to/GeoLiteCity.json", &OpenOptions::default())?;
//! #   */
//!
//!     // Look up an IP address
//!     if let Some(city) = db.look_up("24.24.24.24")? {
//!         println!("City: {}", city.get_str("city").unwrap_or("Unknown"));
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Numeric Addresses
//!
//! CSV and SQL copies of the data are keyed on the numeric address:
//!
//! ```rust
//! assert_eq!(geoip::addr_to_num("24.24.24.24").unwrap(), 404_232_216);
//! assert_eq!(geoip::num_to_addr(404_232_216).unwrap(), "24.24.24.24");
//! ```

mod charset;
mod codec;
mod database;
mod decoder;
mod error;
mod metadata;
mod record;
mod table;
mod tables;

// Re-export public types
pub use charset::{transcode, transcode_strict, Charset};
pub use codec::{addr_to_num, num_to_addr, Ipv4Address};
pub use database::{Database, GeoDatabase, LoadMode, OpenOptions};
pub use decoder::{DecoderOptions, RecordDecoder};
pub use error::GeoIpError;
pub use metadata::{Edition, Metadata};
pub use record::{FieldValue, LookupResult, RawRecord, RawText};
pub use table::TableDatabase;
pub use tables::{CountryTable, RegionTable, Tables};

#[cfg(test)]
mod database_test;
