//! Country and region lookup tables.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

use crate::error::GeoIpError;

/// Country codes, three-letter codes and names indexed by country id.
///
/// Id 0 is the "no country" slot; a Country database reports ids of 1 and
/// above for a match.
///
/// ```
/// use geoip::CountryTable;
///
/// let mut countries = CountryTable::new();
/// let id = countries.push("US", "USA", "United States");
/// assert_eq!(id, 1);
/// assert_eq!(countries.entry(1).unwrap(), Some(("US", "USA", "United States")));
/// assert_eq!(countries.entry(0).unwrap(), None);
/// ```
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CountryTable {
    codes: Vec<String>,
    codes3: Vec<String>,
    names: Vec<String>,
}

impl Default for CountryTable {
    fn default() -> Self {
        CountryTable::new()
    }
}

impl CountryTable {
    /// Creates a table holding only the "no country" slot at id 0.
    #[must_use]
    pub fn new() -> Self {
        CountryTable {
            codes: vec!["--".to_owned()],
            codes3: vec!["--".to_owned()],
            names: vec!["N/A".to_owned()],
        }
    }

    /// Builds a table from three parallel columns. Index 0 must be the
    /// "no country" slot.
    #[must_use]
    pub fn from_columns(codes: Vec<String>, codes3: Vec<String>, names: Vec<String>) -> Self {
        CountryTable {
            codes,
            codes3,
            names,
        }
    }

    /// Appends a country and returns its id.
    pub fn push(
        &mut self,
        code: impl Into<String>,
        code3: impl Into<String>,
        name: impl Into<String>,
    ) -> i32 {
        // Columns may have been loaded with different lengths; align the new
        // row past the longest one.
        let id = self.codes.len().max(self.codes3.len()).max(self.names.len());
        self.codes.resize(id, String::new());
        self.codes3.resize(id, String::new());
        self.names.resize(id, String::new());
        self.codes.push(code.into());
        self.codes3.push(code3.into());
        self.names.push(name.into());
        i32::try_from(id).unwrap_or(i32::MAX)
    }

    /// Number of ids, including the "no country" slot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns true if the table holds no ids at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Returns `(code, code3, name)` for a country id.
    ///
    /// Ids below 1 mean "no match" and yield `Ok(None)`. A positive id with
    /// any column missing or empty is a [`GeoIpError::DataIntegrity`] error.
    pub fn entry(&self, id: i32) -> Result<Option<(&str, &str, &str)>, GeoIpError> {
        let Ok(index) = usize::try_from(id) else {
            return Ok(None);
        };
        if index == 0 {
            return Ok(None);
        }
        Ok(Some((
            column(&self.codes, index, id, "code")?,
            column(&self.codes3, index, id, "code3")?,
            column(&self.names, index, id, "name")?,
        )))
    }
}

fn column<'a>(
    values: &'a [String],
    index: usize,
    id: i32,
    name: &str,
) -> Result<&'a str, GeoIpError> {
    match values.get(index) {
        Some(value) if !value.is_empty() => Ok(value.as_str()),
        _ => Err(GeoIpError::data_integrity(format!(
            "country id {id} has no {name} entry"
        ))),
    }
}

/// Region names keyed by country code and region code.
///
/// ```
/// use geoip::RegionTable;
///
/// let mut regions = RegionTable::new();
/// regions.insert("US", "NY", "New York");
/// assert_eq!(regions.name("US", "NY"), Some("New York"));
/// assert_eq!(regions.name("HK", "00"), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionTable {
    names: HashMap<(String, String), String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegionRow {
    country_code: String,
    region: String,
    name: String,
}

impl<'de> Deserialize<'de> for RegionTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<RegionRow>::deserialize(deserializer)?;
        let mut table = RegionTable::new();
        for row in rows {
            table.insert(row.country_code, row.region, row.name);
        }
        Ok(table)
    }
}

impl RegionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        RegionTable::default()
    }

    /// Adds or replaces a region name. Empty names are not stored.
    pub fn insert(
        &mut self,
        country_code: impl Into<String>,
        region: impl Into<String>,
        name: impl Into<String>,
    ) {
        let name = name.into();
        if name.is_empty() {
            return;
        }
        self.names.insert((country_code.into(), region.into()), name);
    }

    /// Returns the name of a region, if known.
    #[must_use]
    pub fn name(&self, country_code: &str, region: &str) -> Option<&str> {
        self.names
            .get(&(country_code.to_owned(), region.to_owned()))
            .map(String::as_str)
    }

    /// Number of known regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no region is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// The secondary tables a database ships alongside its records.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Tables {
    /// Country id tables.
    pub countries: CountryTable,
    /// Region name table.
    pub regions: RegionTable,
}
