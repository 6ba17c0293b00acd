//! Turns raw database output into [`LookupResult`] maps.

use log::trace;

use crate::charset::{transcode, Charset};
use crate::error::GeoIpError;
use crate::metadata::Edition;
use crate::record::{LookupResult, RawRecord, RawText};
use crate::tables::{CountryTable, RegionTable};

/// Options for record decoding.
///
/// # Example
///
/// ```
/// use geoip::{Charset, DecoderOptions};
///
/// // Latin-1 text, zero-valued fields kept (the default)
/// let opts = DecoderOptions::default();
///
/// // UTF-8 text, zero-valued numeric fields dropped as older bindings did
/// let opts = DecoderOptions::default()
///     .charset(Charset::Utf8)
///     .omit_zero_values();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderOptions {
    charset: Charset,
    omit_zero_values: bool,
}

impl DecoderOptions {
    /// Character set the text fields are stored in.
    #[must_use]
    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Omit latitude, longitude, dma_code and area_code when they are zero.
    ///
    /// Older bindings tested these fields for truthiness, so a record at
    /// latitude 0.0 or with area code 0 lost the field. By default a field is
    /// kept whenever the database provides it.
    #[must_use]
    pub fn omit_zero_values(mut self) -> Self {
        self.omit_zero_values = true;
        self
    }
}

/// Decoder for the records of every database edition.
///
/// The decoder holds only its options, so one instance can be shared freely
/// between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordDecoder {
    options: DecoderOptions,
}

impl RecordDecoder {
    /// Creates a decoder.
    #[must_use]
    pub fn new(options: DecoderOptions) -> Self {
        RecordDecoder { options }
    }

    /// The options this decoder was built with.
    #[must_use]
    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    fn text(&self, raw: &RawText) -> String {
        transcode(raw.as_bytes(), self.options.charset).into_owned()
    }

    /// Decodes a City record.
    ///
    /// Every field present in `raw` appears in the result and every absent
    /// field is left out. `region_name` comes from the record itself or, when
    /// the record lacks it, from `regions` keyed by country code and region.
    ///
    /// ```
    /// use geoip::{RawRecord, RecordDecoder, RegionTable};
    ///
    /// let raw = RawRecord {
    ///     city: Some("Ithaca".into()),
    ///     latitude: Some(42.4278),
    ///     country_code: Some("US".into()),
    ///     ..RawRecord::default()
    /// };
    /// let result = RecordDecoder::default().decode_city(&raw, &RegionTable::new());
    /// assert_eq!(result.keys().collect::<Vec<_>>(), ["city", "country_code", "latitude"]);
    /// ```
    pub fn decode_city(&self, raw: &RawRecord, regions: &RegionTable) -> LookupResult {
        let mut result = LookupResult::new();

        let text_fields = [
            ("country_code", &raw.country_code),
            ("country_code3", &raw.country_code3),
            ("country_name", &raw.country_name),
            ("region", &raw.region),
            ("city", &raw.city),
            ("postal_code", &raw.postal_code),
        ];
        for (key, value) in text_fields {
            if let Some(value) = value {
                result.insert(key, self.text(value));
            }
        }

        let region_name = match &raw.region_name {
            Some(name) => Some(self.text(name)),
            None => self.derive_region_name(&result, regions),
        };
        if let Some(name) = region_name.filter(|name| !name.is_empty()) {
            result.insert("region_name", name);
        }

        let omit_zero = self.options.omit_zero_values;
        for (key, value) in [("latitude", raw.latitude), ("longitude", raw.longitude)] {
            if let Some(value) = value.filter(|v| !(omit_zero && *v == 0.0)) {
                result.insert(key, value);
            }
        }
        for (key, value) in [("dma_code", raw.dma_code), ("area_code", raw.area_code)] {
            if let Some(value) = value.filter(|v| !(omit_zero && *v == 0)) {
                result.insert(key, value);
            }
        }

        trace!("decoded city record with {} fields", result.len());
        result
    }

    fn derive_region_name(&self, decoded: &LookupResult, regions: &RegionTable) -> Option<String> {
        let country_code = decoded.get_str("country_code")?;
        let region = decoded.get_str("region")?;
        regions.name(country_code, region).map(str::to_owned)
    }

    /// Decodes a Country lookup.
    ///
    /// Ids below 1 are "no match". For any other id all three columns of
    /// `countries` must have an entry; a gap is a
    /// [`GeoIpError::DataIntegrity`] error.
    ///
    /// ```
    /// use geoip::{CountryTable, RecordDecoder};
    ///
    /// let mut countries = CountryTable::new();
    /// countries.push("US", "USA", "United States");
    ///
    /// let decoder = RecordDecoder::default();
    /// assert!(decoder.decode_country(0, &countries).unwrap().is_none());
    /// let result = decoder.decode_country(1, &countries).unwrap().unwrap();
    /// assert_eq!(result.get_str("country_code3"), Some("USA"));
    /// ```
    pub fn decode_country(
        &self,
        country_id: i32,
        countries: &CountryTable,
    ) -> Result<Option<LookupResult>, GeoIpError> {
        let Some((code, code3, name)) = countries.entry(country_id)? else {
            return Ok(None);
        };
        let mut result = LookupResult::new();
        result.insert("country_code", code);
        result.insert("country_code3", code3);
        result.insert("country_name", name);
        Ok(Some(result))
    }

    /// Decodes the single string an Organization, ISP, Domain or NetSpeed
    /// database returns, keyed by [`Edition::value_key`].
    ///
    /// An absent or empty value is "no match". City and Country editions
    /// have no single-value form and also yield `None`.
    ///
    /// ```
    /// use geoip::{Edition, RawText, RecordDecoder};
    ///
    /// let decoder = RecordDecoder::default();
    /// let raw = RawText::from("Road Runner");
    /// let result = decoder.decode_single_value(Edition::Organization, Some(&raw)).unwrap();
    /// assert_eq!(result.get_str("name"), Some("Road Runner"));
    /// assert!(decoder.decode_single_value(Edition::Isp, None).is_none());
    /// ```
    pub fn decode_single_value(
        &self,
        edition: Edition,
        raw: Option<&RawText>,
    ) -> Option<LookupResult> {
        let key = edition.value_key()?;
        self.decode_value(key, raw)
    }

    /// Like [`decode_single_value`](Self::decode_single_value), with an
    /// explicit result key.
    pub fn decode_value(&self, key: &str, raw: Option<&RawText>) -> Option<LookupResult> {
        let raw = raw.filter(|raw| !raw.is_empty())?;
        let mut result = LookupResult::new();
        result.insert(key, self.text(raw));
        Some(result)
    }
}
