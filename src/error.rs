//! Error types for GeoIP operations.

use std::io;

use ipnetwork::IpNetworkError;
use thiserror::Error;

/// Error returned by GeoIP operations.
///
/// A lookup that finds nothing is not an error: it is reported as `Ok(None)`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GeoIpError {
    /// Malformed address text or an out-of-range numeric address.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of what is malformed.
        message: String,
    },

    /// The requested load mode is not one of `memory`, `filesystem` or `index`.
    #[error("unsupported load mode {0:?}, expected memory, filesystem or index")]
    UnsupportedMode(String),

    /// Lookup tables disagree with an id the database reported as valid.
    #[error("data integrity error: {message}")]
    DataIntegrity {
        /// Description of the inconsistency.
        message: String,
    },

    /// Text could not be transcoded to UTF-8.
    #[error("encoding error: {message}")]
    Encoding {
        /// Description of the undecodable input.
        message: String,
    },

    /// The database document is invalid or corrupted.
    #[error("{}", format_invalid_database(.message, .location))]
    InvalidDatabase {
        /// Description of what is invalid.
        message: String,
        /// Line and column in the document where the error was detected.
        location: Option<(usize, usize)>,
    },

    /// An I/O error occurred while reading the database.
    #[error("i/o error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),

    /// Memory mapping failed.
    #[cfg(feature = "mmap")]
    #[error("memory map error: {0}")]
    Mmap(#[source] io::Error),

    /// A network in the database is invalid.
    #[error("invalid network: {0}")]
    InvalidNetwork(
        #[from]
        #[source]
        IpNetworkError,
    ),
}

fn format_invalid_database(message: &str, location: &Option<(usize, usize)>) -> String {
    match location {
        Some((line, column)) => {
            format!("invalid database at line {line}, column {column}: {message}")
        }
        None => format!("invalid database: {message}"),
    }
}

impl GeoIpError {
    /// Creates an InvalidFormat error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        GeoIpError::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a DataIntegrity error.
    pub fn data_integrity(message: impl Into<String>) -> Self {
        GeoIpError::DataIntegrity {
            message: message.into(),
        }
    }

    /// Creates an Encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        GeoIpError::Encoding {
            message: message.into(),
        }
    }

    /// Creates an InvalidDatabase error with just a message.
    pub fn invalid_database(message: impl Into<String>) -> Self {
        GeoIpError::InvalidDatabase {
            message: message.into(),
            location: None,
        }
    }

    /// Creates an InvalidDatabase error with message and location.
    pub fn invalid_database_at(message: impl Into<String>, line: usize, column: usize) -> Self {
        GeoIpError::InvalidDatabase {
            message: message.into(),
            location: Some((line, column)),
        }
    }
}

impl From<serde_json::Error> for GeoIpError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            return GeoIpError::Io(err.into());
        }
        let (line, column) = (err.line(), err.column());
        // serde_json reports 0/0 when the error has no position, e.g. a
        // custom error raised after the whole document was read.
        if line == 0 {
            GeoIpError::invalid_database(err.to_string())
        } else {
            GeoIpError::invalid_database_at(err.to_string(), line, column)
        }
    }
}
