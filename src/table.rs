//! A [`GeoDatabase`] backed by a JSON network table.
//!
//! The document lists networks in CIDR notation, each with the data a
//! lookup inside it returns:
//!
//! ```json
//! {
//!   "metadata": { "edition": "city", "charset": "iso-8859-1" },
//!   "countries": { "codes": ["--", "US"], "codes3": ["--", "USA"], "names": ["N/A", "United States"] },
//!   "regions": [{ "country_code": "US", "region": "NY", "name": "New York" }],
//!   "networks": [
//!     { "network": "24.24.0.0/16", "record": { "city": "Ithaca", "country_code": "US" } },
//!     { "network": "24.24.24.0/24", "record": { "city": "Deer Park", "region": "NY" } }
//!   ]
//! }
//! ```
//!
//! Country editions give each network a `country_id`, single-value editions
//! a `name`. The most specific network containing an address wins.

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use ipnetwork::Ipv4Network;
use log::{debug, trace, warn};
use serde::Deserialize;
use serde_json::Value;

#[cfg(feature = "mmap")]
use memmap2::MmapOptions;
#[cfg(feature = "mmap")]
use std::fs::File;

use crate::codec::Ipv4Address;
use crate::database::{GeoDatabase, LoadMode, OpenOptions};
use crate::error::GeoIpError;
use crate::metadata::Metadata;
use crate::record::{RawRecord, RawText};
use crate::tables::{CountryTable, RegionTable, Tables};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Document<N> {
    metadata: Metadata,
    #[serde(default)]
    countries: CountryTable,
    #[serde(default)]
    regions: RegionTable,
    networks: N,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct Entry {
    network: String,
    #[serde(default)]
    record: Option<RawRecord>,
    #[serde(default)]
    country_id: Option<i32>,
    #[serde(default)]
    name: Option<RawText>,
}

#[derive(Debug)]
enum Storage {
    /// Every entry decoded and held in memory.
    Memory(Vec<(Ipv4Network, Entry)>),
    /// Networks parsed, entry bodies decoded on lookup.
    Index(Vec<(Ipv4Network, Value)>),
    /// Nothing held; tables and networks read on lookup.
    Filesystem(PathBuf),
    Closed,
}

#[derive(Debug)]
struct Loaded {
    tables: Arc<Tables>,
    storage: Storage,
    modified: Option<SystemTime>,
}

/// A network table database, loaded from a JSON document.
///
/// Lookups take `&self`; with [`OpenOptions::check_cache`] the table is
/// reloaded behind a lock when the file changes on disk. Each lookup answers
/// from one version of the file, tables included. When the file cannot be
/// read back, the table already in memory keeps serving.
///
/// ```
/// use geoip::{GeoDatabase, OpenOptions, TableDatabase};
///
/// let db = TableDatabase::open("test-data/GeoIPOrg-Test.json", &OpenOptions::default()).unwrap();
/// let name = db.name_by_addr("24.24.24.24").unwrap().unwrap();
/// assert_eq!(name.as_bytes(), b"Road Runner");
/// ```
#[derive(Debug)]
pub struct TableDatabase {
    path: Option<PathBuf>,
    options: OpenOptions,
    metadata: Metadata,
    state: RwLock<Arc<Loaded>>,
}

impl TableDatabase {
    /// Opens a database from an in-memory document. The whole table is
    /// loaded, whatever the default load mode.
    ///
    /// ```
    /// use geoip::{Edition, GeoDatabase, TableDatabase};
    ///
    /// let doc = br#"{"metadata": {"edition": "country"}, "networks": []}"#;
    /// let db = TableDatabase::from_slice(doc).unwrap();
    /// assert_eq!(db.metadata().edition, Edition::Country);
    /// ```
    pub fn from_slice(buf: &[u8]) -> Result<TableDatabase, GeoIpError> {
        let document: Document<Vec<Entry>> = serde_json::from_slice(buf)?;
        let metadata = document.metadata.clone();
        let loaded = Loaded {
            tables: Arc::new(Tables {
                countries: document.countries,
                regions: document.regions,
            }),
            storage: Storage::Memory(sort_entries(document.networks)?),
            modified: None,
        };
        Ok(TableDatabase {
            path: None,
            options: OpenOptions::default(),
            metadata,
            state: RwLock::new(Arc::new(loaded)),
        })
    }

    /// The load mode the database was opened with.
    #[must_use]
    pub fn load_mode(&self) -> LoadMode {
        self.options.load_mode()
    }

    fn snapshot(&self) -> Result<Arc<Loaded>, GeoIpError> {
        let current = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(&*state)
        };
        let Some(path) = self.path.as_deref().filter(|_| self.options.checks_cache()) else {
            return Ok(current);
        };
        if matches!(current.storage, Storage::Closed) {
            return Ok(current);
        }
        // Filesystem mode has nothing cached to fall back on.
        let keeps_cache = !matches!(current.storage, Storage::Filesystem(_));
        let modified = match modified_time(path) {
            Ok(modified) => modified,
            Err(err) if keeps_cache => {
                warn!("cannot stat {}, keeping loaded table: {err}", path.display());
                return Ok(current);
            }
            Err(err) => return Err(err),
        };
        if current.modified == Some(modified) {
            return Ok(current);
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // Another lookup may have reloaded while we waited for the lock.
        if state.modified == Some(modified) {
            return Ok(Arc::clone(&*state));
        }
        debug!("{} changed on disk, reloading", path.display());
        let (metadata, loaded) = match load(path, self.options.load_mode()) {
            Ok(reloaded) => reloaded,
            Err(err) if keeps_cache => {
                warn!("cannot reload {}, keeping loaded table: {err}", path.display());
                return Ok(Arc::clone(&*state));
            }
            Err(err) => return Err(err),
        };
        if metadata.edition != self.metadata.edition || metadata.charset != self.metadata.charset {
            return Err(GeoIpError::invalid_database(format!(
                "{} changed from a {} ({}) database to a {} ({}) database",
                path.display(),
                self.metadata.edition,
                self.metadata.charset,
                metadata.edition,
                metadata.charset
            )));
        }
        *state = Arc::new(loaded);
        Ok(Arc::clone(&*state))
    }

    fn find<R>(
        &self,
        addr: &str,
        pick: impl Fn(&Entry) -> Option<R>,
        pick_value: impl Fn(&Value) -> Result<Option<R>, GeoIpError>,
    ) -> Result<(Option<R>, Arc<Tables>), GeoIpError> {
        let ip = Ipv4Addr::from(addr.parse::<Ipv4Address>()?);
        let loaded = self.snapshot()?;
        let (found, tables) = match &loaded.storage {
            Storage::Memory(entries) => (
                longest_match(entries, ip).and_then(pick),
                Arc::clone(&loaded.tables),
            ),
            Storage::Index(entries) => {
                let found = match longest_match(entries, ip) {
                    Some(value) => pick_value(value)?,
                    None => None,
                };
                (found, Arc::clone(&loaded.tables))
            }
            Storage::Filesystem(path) => {
                let (tables, entries) = read_document(path)?;
                let entries = sort_entries(entries)?;
                (longest_match(&entries, ip).and_then(pick), Arc::new(tables))
            }
            Storage::Closed => return Err(GeoIpError::invalid_database("database is closed")),
        };
        trace!("{addr}: {}", if found.is_some() { "found" } else { "no data" });
        Ok((found, tables))
    }
}

impl GeoDatabase for TableDatabase {
    fn open<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self, GeoIpError> {
        let path = path.as_ref();
        let (metadata, loaded) = load(path, options.load_mode())?;
        Ok(TableDatabase {
            path: Some(path.to_path_buf()),
            options: *options,
            metadata,
            state: RwLock::new(Arc::new(loaded)),
        })
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn tables(&self) -> Arc<Tables> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&state.tables)
    }

    fn record_by_addr(&self, addr: &str) -> Result<Option<(RawRecord, Arc<Tables>)>, GeoIpError> {
        let (record, tables) = self.find(
            addr,
            |entry| entry.record.clone(),
            |value| Ok(decode_entry(value)?.record),
        )?;
        Ok(record.map(|record| (record, tables)))
    }

    fn country_id_by_addr(&self, addr: &str) -> Result<(i32, Arc<Tables>), GeoIpError> {
        let (id, tables) = self.find(
            addr,
            |entry| entry.country_id,
            |value| Ok(decode_entry(value)?.country_id),
        )?;
        Ok((id.unwrap_or(0), tables))
    }

    fn name_by_addr(&self, addr: &str) -> Result<Option<RawText>, GeoIpError> {
        let (name, _) = self.find(
            addr,
            |entry| entry.name.clone(),
            |value| Ok(decode_entry(value)?.name),
        )?;
        Ok(name)
    }

    fn close(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        *state = Arc::new(Loaded {
            tables: Arc::new(Tables::default()),
            storage: Storage::Closed,
            modified: None,
        });
    }
}

fn modified_time(path: &Path) -> Result<SystemTime, GeoIpError> {
    Ok(fs::metadata(path)?.modified()?)
}

fn load(path: &Path, mode: LoadMode) -> Result<(Metadata, Loaded), GeoIpError> {
    let modified = modified_time(path).ok();
    let buf = fs::read(path)?;
    let (metadata, tables, storage) = match mode {
        LoadMode::FullMemory => {
            let document: Document<Vec<Entry>> = serde_json::from_slice(&buf)?;
            let entries = sort_entries(document.networks)?;
            debug!("loaded {} networks into memory", entries.len());
            (
                document.metadata,
                (document.countries, document.regions),
                Storage::Memory(entries),
            )
        }
        LoadMode::PartialIndex => {
            let document: Document<Vec<Value>> = serde_json::from_slice(&buf)?;
            let mut index = Vec::with_capacity(document.networks.len());
            for value in document.networks {
                let network = decode_entry(&value)?.network.parse::<Ipv4Network>()?;
                index.push((network, value));
            }
            sort_by_prefix(&mut index);
            debug!("indexed {} networks", index.len());
            (
                document.metadata,
                (document.countries, document.regions),
                Storage::Index(index),
            )
        }
        LoadMode::Filesystem => {
            let document: Document<Vec<Entry>> = serde_json::from_slice(&buf)?;
            // Checked now so every mode rejects the same documents.
            sort_entries(document.networks)?;
            debug!("reading networks of {} on each lookup", path.display());
            (
                document.metadata,
                (document.countries, document.regions),
                Storage::Filesystem(path.to_path_buf()),
            )
        }
    };
    let (countries, regions) = tables;
    let loaded = Loaded {
        tables: Arc::new(Tables { countries, regions }),
        storage,
        modified,
    };
    Ok((metadata, loaded))
}

#[cfg(feature = "mmap")]
fn read_document(path: &Path) -> Result<(Tables, Vec<Entry>), GeoIpError> {
    let file = File::open(path)?;
    // SAFETY: the map lives only for this parse. Truncating the file while it
    // is mapped faults, so updated databases are renamed into place.
    let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(GeoIpError::Mmap)?;
    parse_document(&mmap)
}

#[cfg(not(feature = "mmap"))]
fn read_document(path: &Path) -> Result<(Tables, Vec<Entry>), GeoIpError> {
    parse_document(&fs::read(path)?)
}

fn parse_document(buf: &[u8]) -> Result<(Tables, Vec<Entry>), GeoIpError> {
    let document: Document<Vec<Entry>> = serde_json::from_slice(buf)?;
    let tables = Tables {
        countries: document.countries,
        regions: document.regions,
    };
    Ok((tables, document.networks))
}

fn decode_entry(value: &Value) -> Result<Entry, GeoIpError> {
    Ok(Entry::deserialize(value)?)
}

fn sort_entries(entries: Vec<Entry>) -> Result<Vec<(Ipv4Network, Entry)>, GeoIpError> {
    let mut networks = entries
        .into_iter()
        .map(|entry| Ok((entry.network.parse::<Ipv4Network>()?, entry)))
        .collect::<Result<Vec<_>, GeoIpError>>()?;
    sort_by_prefix(&mut networks);
    Ok(networks)
}

/// Most specific networks first, so the first match is the longest prefix.
fn sort_by_prefix<T>(entries: &mut [(Ipv4Network, T)]) {
    entries.sort_by(|(a, _), (b, _)| b.prefix().cmp(&a.prefix()));
}

fn longest_match<T>(entries: &[(Ipv4Network, T)], ip: Ipv4Addr) -> Option<&T> {
    entries
        .iter()
        .find(|(network, _)| network.contains(ip))
        .map(|(_, data)| data)
}
