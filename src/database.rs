//! Database handles and the lookup front end.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, trace};

use crate::decoder::{DecoderOptions, RecordDecoder};
use crate::error::GeoIpError;
use crate::metadata::{Edition, Metadata};
use crate::record::{LookupResult, RawRecord, RawText};
use crate::tables::Tables;

/// How much of a database is held in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LoadMode {
    /// Load the whole database into memory. Fastest lookups.
    #[default]
    FullMemory,
    /// Read from storage on every lookup. Least memory.
    ///
    /// With the `mmap` feature the file is mapped while it is read, so an
    /// updated database must be moved into place with a rename rather than
    /// rewritten in place.
    Filesystem,
    /// Keep the index in memory and read records on demand.
    PartialIndex,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadMode::FullMemory => "memory",
            LoadMode::Filesystem => "filesystem",
            LoadMode::PartialIndex => "index",
        })
    }
}

impl FromStr for LoadMode {
    type Err = GeoIpError;

    /// Accepts `memory`, `filesystem` and `index`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(LoadMode::FullMemory),
            "filesystem" => Ok(LoadMode::Filesystem),
            "index" => Ok(LoadMode::PartialIndex),
            _ => Err(GeoIpError::UnsupportedMode(s.to_owned())),
        }
    }
}

/// Options for opening a database.
///
/// # Example
///
/// ```
/// use geoip::{LoadMode, OpenOptions};
///
/// // Whole database in memory, no freshness check (the default)
/// let opts = OpenOptions::default();
///
/// // Read from disk per lookup and reload when the file changes
/// let opts = OpenOptions::default()
///     .mode(LoadMode::Filesystem)
///     .check_cache();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    mode: LoadMode,
    check_cache: bool,
}

impl OpenOptions {
    /// Sets the load mode.
    #[must_use]
    pub fn mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Check the file's modification time before each lookup and reload the
    /// database if it changed.
    #[must_use]
    pub fn check_cache(mut self) -> Self {
        self.check_cache = true;
        self
    }

    /// The selected load mode.
    #[must_use]
    pub fn load_mode(&self) -> LoadMode {
        self.mode
    }

    /// Whether the freshness check is enabled.
    #[must_use]
    pub fn checks_cache(&self) -> bool {
        self.check_cache
    }
}

/// A geolocation engine able to answer raw lookups.
///
/// Implementations own the storage and search structure; [`Database`] turns
/// their raw answers into [`LookupResult`]s. Addresses are passed as the
/// caller gave them.
pub trait GeoDatabase {
    /// Opens the database at `path`.
    fn open<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self, GeoIpError>
    where
        Self: Sized;

    /// Metadata of the open database.
    fn metadata(&self) -> &Metadata;

    /// Country and region tables of the open database.
    fn tables(&self) -> Arc<Tables>;

    /// Returns the City record for `addr`, if any, with the tables of the
    /// same database version.
    fn record_by_addr(&self, addr: &str) -> Result<Option<(RawRecord, Arc<Tables>)>, GeoIpError>;

    /// Returns the country id for `addr`, 0 when unknown, with the tables of
    /// the same database version.
    fn country_id_by_addr(&self, addr: &str) -> Result<(i32, Arc<Tables>), GeoIpError>;

    /// Returns the single value stored for `addr` in an Organization, ISP,
    /// Domain or NetSpeed database, if any.
    fn name_by_addr(&self, addr: &str) -> Result<Option<RawText>, GeoIpError>;

    /// Releases the resources held by the database. Called exactly once, by
    /// [`Database`] when it goes away.
    fn close(&mut self) {}
}

/// An open database together with its record decoder.
///
/// The underlying handle is released when the `Database` is dropped or
/// [`close`](Database::close)d.
///
/// # Example
///
/// ```
/// use geoip::{Database, OpenOptions, TableDatabase};
///
/// # fn main() -> Result<(), geoip::GeoIpError> {
/// let db = Database::<TableDatabase>::open(
///     "test-data/GeoLiteCity-Test.json",
///     &OpenOptions::default(),
/// )?;
/// if let Some(city) = db.look_up("24.24.24.24")? {
///     println!("City: {:?}", city.get_str("city"));
/// }
/// # Ok(())
/// # }
/// ```
pub struct Database<D: GeoDatabase> {
    inner: D,
    decoder: RecordDecoder,
}

impl<D: GeoDatabase> Database<D> {
    /// Opens the database at `path`, decoding text in the charset its
    /// metadata declares.
    pub fn open<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self, GeoIpError> {
        let path = path.as_ref();
        debug!(
            "opening {} in {} mode (check cache: {})",
            path.display(),
            options.load_mode(),
            options.checks_cache()
        );
        Ok(Database::new(D::open(path, options)?))
    }

    /// Wraps an already open handle.
    pub fn new(inner: D) -> Self {
        let options = DecoderOptions::default().charset(inner.metadata().charset);
        Database {
            inner,
            decoder: RecordDecoder::new(options),
        }
    }

    /// Replaces the decoder options.
    #[must_use]
    pub fn with_decoder_options(mut self, options: DecoderOptions) -> Self {
        self.decoder = RecordDecoder::new(options);
        self
    }

    /// The kind of records this database holds.
    pub fn edition(&self) -> Edition {
        self.inner.metadata().edition
    }

    /// Database metadata.
    pub fn metadata(&self) -> &Metadata {
        self.inner.metadata()
    }

    /// The underlying handle.
    pub fn get_ref(&self) -> &D {
        &self.inner
    }

    /// Looks up an address.
    ///
    /// Returns `Ok(None)` when the database knows nothing about it. The
    /// shape of the result depends on the [`edition`](Self::edition):
    ///
    /// - City: any of country_code, country_code3, country_name, region,
    ///   region_name, city, postal_code, latitude, longitude, dma_code,
    ///   area_code
    /// - Country: country_code, country_code3, country_name
    /// - Organization, ISP, Domain, NetSpeed: name, isp, domain or netspeed
    pub fn look_up(&self, addr: &str) -> Result<Option<LookupResult>, GeoIpError> {
        let edition = self.edition();
        trace!("looking up {addr} in {edition} database");
        match edition {
            Edition::City => {
                let Some((raw, tables)) = self.inner.record_by_addr(addr)? else {
                    return Ok(None);
                };
                Ok(Some(self.decoder.decode_city(&raw, &tables.regions)))
            }
            Edition::Country => {
                let (country_id, tables) = self.inner.country_id_by_addr(addr)?;
                self.decoder.decode_country(country_id, &tables.countries)
            }
            Edition::Organization | Edition::Isp | Edition::Domain | Edition::NetSpeed => {
                let raw = self.inner.name_by_addr(addr)?;
                Ok(self.decoder.decode_single_value(edition, raw.as_ref()))
            }
        }
    }

    /// Releases the database now instead of at the end of scope.
    pub fn close(self) {}
}

impl<D: GeoDatabase> Drop for Database<D> {
    fn drop(&mut self) {
        debug!("closing {} database", self.inner.metadata().edition);
        self.inner.close();
    }
}

impl<D: GeoDatabase> fmt::Debug for Database<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("metadata", self.inner.metadata())
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}
