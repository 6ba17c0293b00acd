//! Raw records as produced by a database, and the decoded lookup results.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Undecoded bytes of one text field.
///
/// Deserializes from either a string or an array of byte values, so table
/// documents can carry Latin-1 text that is not valid UTF-8.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RawText(Vec<u8>);

impl RawText {
    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns true if the field holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for RawText {
    fn from(text: &str) -> Self {
        RawText(text.as_bytes().to_vec())
    }
}

impl From<String> for RawText {
    fn from(text: String) -> Self {
        RawText(text.into_bytes())
    }
}

impl From<&[u8]> for RawText {
    fn from(bytes: &[u8]) -> Self {
        RawText(bytes.to_vec())
    }
}

impl From<Vec<u8>> for RawText {
    fn from(bytes: Vec<u8>) -> Self {
        RawText(bytes)
    }
}

struct RawTextVisitor;

impl<'de> Visitor<'de> for RawTextVisitor {
    type Value = RawText;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a string or an array of bytes")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RawText, E> {
        Ok(RawText::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<RawText, E> {
        Ok(RawText::from(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<RawText, E> {
        Ok(RawText::from(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawText, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(b) = seq.next_element::<u8>()? {
            bytes.push(b);
        }
        Ok(RawText(bytes))
    }
}

impl<'de> Deserialize<'de> for RawText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawTextVisitor)
    }
}

/// The field set a City database returns for one address.
///
/// Every field is optional; a missing field is omitted from the decoded
/// result rather than reported as null or zero.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RawRecord {
    /// Two-letter country code.
    pub country_code: Option<RawText>,
    /// Three-letter country code.
    pub country_code3: Option<RawText>,
    /// Country name.
    pub country_name: Option<RawText>,
    /// Region code, e.g. a US state abbreviation or FIPS 10-4 code.
    pub region: Option<RawText>,
    /// Region name, when the database stores it directly.
    pub region_name: Option<RawText>,
    /// City name.
    pub city: Option<RawText>,
    /// Postal code.
    pub postal_code: Option<RawText>,
    /// Latitude in degrees.
    pub latitude: Option<f64>,
    /// Longitude in degrees.
    pub longitude: Option<f64>,
    /// Metro (DMA) code, US only.
    pub dma_code: Option<i32>,
    /// Telephone area code, US only.
    pub area_code: Option<i32>,
}

/// One value in a [`LookupResult`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    /// A text field.
    Text(String),
    /// An integer field such as `dma_code`.
    Integer(i32),
    /// A coordinate.
    Float(f64),
}

impl FieldValue {
    /// Returns the text, if this is a text field.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the float, if this is a coordinate.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the integer, if this is an integer field.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_owned())
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Integer(i)
    }
}

/// A decoded lookup: field name to value.
///
/// Only fields the database knows about are present; there are no null
/// entries.
///
/// ```
/// use geoip::{LookupResult, FieldValue};
///
/// let mut result = LookupResult::new();
/// result.insert("city", "Ithaca");
/// assert_eq!(result.get_str("city"), Some("Ithaca"));
/// assert!(!result.contains_key("region"));
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct LookupResult(BTreeMap<String, FieldValue>);

impl LookupResult {
    /// Creates an empty result.
    #[must_use]
    pub fn new() -> Self {
        LookupResult(BTreeMap::new())
    }

    /// Sets a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Returns a text field.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    /// Returns a float field.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(FieldValue::as_f64)
    }

    /// Returns an integer field.
    #[must_use]
    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(FieldValue::as_i32)
    }

    /// Returns true if the field is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Fields, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for LookupResult {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
