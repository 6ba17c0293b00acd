use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, SystemTime};

use rayon::prelude::*;
use serde_json::json;

use crate::{
    Database, DecoderOptions, Edition, GeoDatabase, GeoIpError, LoadMode, OpenOptions,
    TableDatabase,
};

const CITY_DB: &str = "test-data/GeoLiteCity-Test.json";
const COUNTRY_DB: &str = "test-data/GeoIP-Test.json";
const ORG_DB: &str = "test-data/GeoIPOrg-Test.json";

const MODES: [LoadMode; 3] = [
    LoadMode::FullMemory,
    LoadMode::Filesystem,
    LoadMode::PartialIndex,
];

fn open(file: &str, options: OpenOptions) -> Database<TableDatabase> {
    Database::open(file, &options).unwrap_or_else(|e| panic!("error opening {file}: {e}"))
}

#[test]
fn test_missing_database() {
    let _ = env_logger::try_init();

    let r = Database::<TableDatabase>::open("/supposed-to-fail", &OpenOptions::default());
    match r {
        Ok(_) => panic!("Received Database when opening non-existent file"),
        Err(e) => assert!(
            matches!(&e, GeoIpError::Io(io) if io.kind() == std::io::ErrorKind::NotFound),
            "Expected NotFound, but got: {e:?}"
        ),
    }
}

#[test]
fn test_non_database() {
    let _ = env_logger::try_init();

    let r = Database::<TableDatabase>::open("Cargo.toml", &OpenOptions::default());
    match r {
        Ok(_) => panic!("Received Database when opening a non-JSON file"),
        Err(e) => assert!(
            matches!(e, GeoIpError::InvalidDatabase { .. }),
            "Expected InvalidDatabase error, but got: {e:?}"
        ),
    }
}

#[test]
fn test_unsupported_mode() {
    let _ = env_logger::try_init();

    let err = "standard".parse::<LoadMode>().unwrap_err();
    assert!(matches!(err, GeoIpError::UnsupportedMode(_)));
}

#[test]
fn test_metadata() {
    let _ = env_logger::try_init();

    let db = open(CITY_DB, OpenOptions::default());
    let metadata = db.metadata();
    assert_eq!(metadata.edition, Edition::City);
    assert_eq!(metadata.build_epoch, 1_243_814_400);
    assert_eq!(metadata.description, "GEO-533LITE test build");
    assert_eq!(
        metadata.build_time(),
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_243_814_400)
    );
}

#[allow(clippy::float_cmp)]
#[test]
fn test_lookup_city() {
    let _ = env_logger::try_init();

    for mode in MODES {
        let db = open(CITY_DB, OpenOptions::default().mode(mode));
        let city = db.look_up("24.24.24.24").unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&city).unwrap(),
            json!({
                "country_code": "US",
                "country_code3": "USA",
                "country_name": "United States",
                "region": "NY",
                "region_name": "New York",
                "city": "Deer Park",
                "postal_code": "11729",
                "latitude": 40.7627,
                "longitude": -73.3227,
                "dma_code": 501,
                "area_code": 631
            }),
            "{mode} mode"
        );
    }
}

#[test]
fn test_lookup_city_partial_record() {
    let _ = env_logger::try_init();

    let db = open(CITY_DB, OpenOptions::default());
    let result = db.look_up("24.24.1.1").unwrap().unwrap();
    let mut keys: Vec<_> = result.keys().collect();
    keys.sort_unstable();
    assert_eq!(keys, ["country_code", "country_code3", "country_name"]);
}

#[test]
fn test_lookup_city_not_found() {
    let _ = env_logger::try_init();

    for mode in MODES {
        let db = open(CITY_DB, OpenOptions::default().mode(mode));
        assert!(db.look_up("127.0.0.1").unwrap().is_none(), "{mode} mode");
        // Network present without a record.
        assert!(db.look_up("10.20.30.40").unwrap().is_none(), "{mode} mode");
    }
}

#[test]
fn test_lookup_invalid_address() {
    let _ = env_logger::try_init();

    let db = open(CITY_DB, OpenOptions::default());
    for addr in ["", "24.24.24", "24.24.24.256", "localhost"] {
        assert!(
            matches!(db.look_up(addr), Err(GeoIpError::InvalidFormat { .. })),
            "{addr:?} should be rejected"
        );
    }
}

#[test]
fn test_character_encoding_converted_to_utf8() {
    let _ = env_logger::try_init();

    for mode in MODES {
        let db = open(CITY_DB, OpenOptions::default().mode(mode).check_cache());
        let result = db.look_up("201.85.50.148").unwrap().unwrap();
        assert_eq!(result.get_str("city"), Some("Jundiaí"), "{mode} mode");
        assert_eq!(result.get_str("region_name"), Some("Sao Paulo"), "{mode} mode");
    }

    let db = open(ORG_DB, OpenOptions::default());
    let result = db.look_up("80.58.1.1").unwrap().unwrap();
    assert_eq!(result.get_str("name"), Some("Telefónica de España"));
}

#[test]
fn test_stored_region_name() {
    let _ = env_logger::try_init();

    let db = open(CITY_DB, OpenOptions::default());
    let result = db.look_up("89.160.20.130").unwrap().unwrap();
    assert_eq!(result.get_str("city"), Some("München"));
    assert_eq!(result.get_str("region_name"), Some("Freistaat Bayern"));
}

#[test]
fn test_empty_region_name_does_not_crash() {
    let _ = env_logger::try_init();

    let db = open(CITY_DB, OpenOptions::default().mode(LoadMode::Filesystem).check_cache());
    let result = db.look_up("119.236.232.169").unwrap().unwrap();
    assert_eq!(result.get_str("region"), Some("00"));
    assert!(!result.contains_key("region_name"));
}

#[test]
fn test_zero_values() {
    let _ = env_logger::try_init();

    let db = open(CITY_DB, OpenOptions::default());
    let result = db.look_up("41.0.0.1").unwrap().unwrap();
    assert_eq!(result.get_f64("latitude"), Some(0.0));
    assert_eq!(result.get_i32("area_code"), Some(0));
    assert_eq!(result.len(), 5);

    let db = db.with_decoder_options(DecoderOptions::default().omit_zero_values());
    let result = db.look_up("41.0.0.1").unwrap().unwrap();
    assert_eq!(result.keys().collect::<Vec<_>>(), ["country_name"]);
}

#[test]
fn test_lookup_country() {
    let _ = env_logger::try_init();

    for mode in MODES {
        let db = open(COUNTRY_DB, OpenOptions::default().mode(mode));
        let result = db.look_up("24.24.24.24").unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "country_code": "US",
                "country_code3": "USA",
                "country_name": "United States"
            }),
            "{mode} mode"
        );

        let result = db.look_up("202.1.2.3").unwrap().unwrap();
        assert_eq!(result.get_str("country_name"), Some("Asia/Pacific Region"));

        assert!(db.look_up("10.0.0.1").unwrap().is_none(), "{mode} mode");
        assert!(db.look_up("127.0.0.1").unwrap().is_none(), "{mode} mode");
    }
}

#[test]
fn test_lookup_country_with_unknown_id() {
    let _ = env_logger::try_init();

    let db = open(COUNTRY_DB, OpenOptions::default());
    assert!(matches!(
        db.look_up("192.0.2.1"),
        Err(GeoIpError::DataIntegrity { .. })
    ));
}

#[test]
fn test_lookup_org() {
    let _ = env_logger::try_init();

    for mode in MODES {
        for check_cache in [false, true] {
            let mut options = OpenOptions::default().mode(mode);
            if check_cache {
                options = options.check_cache();
            }
            let db = open(ORG_DB, options);
            let result = db.look_up("24.24.24.24").unwrap().unwrap();
            assert_eq!(result.len(), 1);
            assert_eq!(result.get_str("name"), Some("Road Runner"));
            // Empty names are no match.
            assert!(db.look_up("10.0.0.1").unwrap().is_none());
        }
    }
}

#[test]
fn test_table_database_keeps_load_mode() {
    let _ = env_logger::try_init();

    for mode in MODES {
        let db = TableDatabase::open(ORG_DB, &OpenOptions::default().mode(mode)).unwrap();
        assert_eq!(db.load_mode(), mode);
    }
}

fn write_db(path: &Path, doc: &serde_json::Value, modified: SystemTime) {
    write_bytes(path, &serde_json::to_vec(doc).unwrap(), modified);
}

fn write_bytes(path: &Path, buf: &[u8], modified: SystemTime) {
    fs::write(path, buf).unwrap();
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
}

fn write_org_db(path: &Path, name: &str, modified: SystemTime) {
    let doc = json!({
        "metadata": { "edition": "organization" },
        "networks": [{ "network": "24.24.0.0/16", "name": name }]
    });
    write_db(path, &doc, modified);
}

#[test]
fn test_check_cache_reloads_changed_file() {
    let _ = env_logger::try_init();

    let start = SystemTime::now() - Duration::from_secs(3600);
    for mode in MODES {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_org_db(file.path(), "Road Runner", start);

        let fresh = open(
            file.path().to_str().unwrap(),
            OpenOptions::default().mode(mode).check_cache(),
        );
        let cached = open(file.path().to_str().unwrap(), OpenOptions::default().mode(mode));
        assert_eq!(
            fresh.look_up("24.24.24.24").unwrap().unwrap().get_str("name"),
            Some("Road Runner")
        );

        write_org_db(file.path(), "Time Warner", start + Duration::from_secs(60));

        assert_eq!(
            fresh.look_up("24.24.24.24").unwrap().unwrap().get_str("name"),
            Some("Time Warner"),
            "{mode} mode"
        );
        let expected = match mode {
            // Filesystem mode reads the networks from disk on every lookup.
            LoadMode::Filesystem => "Time Warner",
            LoadMode::FullMemory | LoadMode::PartialIndex => "Road Runner",
        };
        assert_eq!(
            cached.look_up("24.24.24.24").unwrap().unwrap().get_str("name"),
            Some(expected),
            "{mode} mode"
        );
    }
}

#[test]
fn test_check_cache_rejects_edition_change() {
    let _ = env_logger::try_init();

    let start = SystemTime::now() - Duration::from_secs(3600);
    let file = tempfile::NamedTempFile::new().unwrap();
    write_org_db(file.path(), "Road Runner", start);
    let db = open(file.path().to_str().unwrap(), OpenOptions::default().check_cache());

    let doc = json!({
        "metadata": { "edition": "country" },
        "networks": [{ "network": "24.24.0.0/16", "country_id": 1 }]
    });
    write_db(file.path(), &doc, start + Duration::from_secs(60));

    assert!(matches!(
        db.look_up("24.24.24.24"),
        Err(GeoIpError::InvalidDatabase { .. })
    ));
}

#[test]
fn test_check_cache_keeps_table_when_file_breaks() {
    let _ = env_logger::try_init();

    let start = SystemTime::now() - Duration::from_secs(3600);
    for mode in [LoadMode::FullMemory, LoadMode::PartialIndex] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GeoIPOrg.json");
        write_org_db(&path, "Road Runner", start);
        let db = open(path.to_str().unwrap(), OpenOptions::default().mode(mode).check_cache());
        let name = |db: &Database<TableDatabase>| {
            db.look_up("24.24.24.24")
                .unwrap_or_else(|e| panic!("{mode} mode: {e}"))
                .and_then(|r| r.get_str("name").map(str::to_owned))
        };
        assert_eq!(name(&db).as_deref(), Some("Road Runner"));

        // Caught half written.
        let doc = br#"{"metadata": {"edition": "organization"}, "networks": ["#;
        write_bytes(&path, doc, start + Duration::from_secs(60));
        assert_eq!(name(&db).as_deref(), Some("Road Runner"), "{mode} mode");

        fs::remove_file(&path).unwrap();
        assert_eq!(name(&db).as_deref(), Some("Road Runner"), "{mode} mode");

        // Picked up once the file is whole again.
        write_org_db(&path, "Time Warner", start + Duration::from_secs(120));
        assert_eq!(name(&db).as_deref(), Some("Time Warner"), "{mode} mode");
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("GeoIPOrg.json");
    write_org_db(&path, "Road Runner", start);
    let opts = OpenOptions::default().mode(LoadMode::Filesystem).check_cache();
    let db = open(path.to_str().unwrap(), opts);
    fs::remove_file(&path).unwrap();
    assert!(matches!(
        db.look_up("24.24.24.24"),
        Err(GeoIpError::Io(io)) if io.kind() == std::io::ErrorKind::NotFound
    ));
}

fn country_doc(version: u64) -> serde_json::Value {
    // Even versions put 24.0.0.0/8 at id 6, odd ones at id 1 of a table
    // too short to hold id 6.
    if version % 2 == 0 {
        json!({
            "metadata": { "edition": "country" },
            "countries": {
                "codes": ["--", "AP", "EU", "BR", "DE", "HK", "US"],
                "codes3": ["--", "AP", "EU", "BRA", "DEU", "HKG", "USA"],
                "names": ["N/A", "Asia/Pacific Region", "Europe", "Brazil", "Germany",
                          "Hong Kong", "United States"]
            },
            "networks": [{ "network": "24.0.0.0/8", "country_id": 6 }]
        })
    } else {
        json!({
            "metadata": { "edition": "country" },
            "countries": {
                "codes": ["--", "AP"],
                "codes3": ["--", "AP"],
                "names": ["N/A", "Asia/Pacific Region"]
            },
            "networks": [{ "network": "24.0.0.0/8", "country_id": 1 }]
        })
    }
}

#[test]
fn test_reload_during_concurrent_lookups() {
    let _ = env_logger::try_init();

    let start = SystemTime::now() - Duration::from_secs(3600);
    for mode in MODES {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GeoIP.json");
        let next = dir.path().join("GeoIP.json.new");
        write_db(&path, &country_doc(0), start);
        let db = open(path.to_str().unwrap(), OpenOptions::default().mode(mode).check_cache());
        let db = &db;
        let done = &AtomicBool::new(false);

        thread::scope(|s| {
            let readers: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(move || {
                        let mut lookups = 0;
                        while lookups == 0 || !done.load(Ordering::Acquire) {
                            let result = db
                                .look_up("24.24.24.24")
                                .unwrap_or_else(|e| panic!("{mode} mode: {e}"))
                                .unwrap_or_else(|| panic!("{mode} mode: no data"));
                            let name = result.get_str("country_name");
                            assert!(
                                matches!(name, Some("United States" | "Asia/Pacific Region")),
                                "{mode} mode: {name:?}"
                            );
                            lookups += 1;
                        }
                        lookups
                    })
                })
                .collect();

            for version in 1..=40 {
                write_db(&next, &country_doc(version), start + Duration::from_secs(version));
                fs::rename(&next, &path).unwrap();
            }
            done.store(true, Ordering::Release);

            for reader in readers {
                assert!(reader.join().unwrap() > 0);
            }
        });
    }
}

#[test]
fn test_every_mode_rejects_malformed_entries() {
    let _ = env_logger::try_init();

    let start = SystemTime::now() - Duration::from_secs(3600);
    let unknown_field = json!({
        "metadata": { "edition": "organization" },
        "networks": [{ "network": "24.24.0.0/16", "name": "Road Runner", "isp": "RR" }]
    });
    let bad_network = json!({
        "metadata": { "edition": "organization" },
        "networks": [{ "network": "24.24.0.0/40", "name": "Road Runner" }]
    });
    for mode in MODES {
        let file = tempfile::NamedTempFile::new().unwrap();
        let opts = OpenOptions::default().mode(mode);

        write_db(file.path(), &unknown_field, start);
        let err = TableDatabase::open(file.path(), &opts).unwrap_err();
        assert!(matches!(err, GeoIpError::InvalidDatabase { .. }), "{mode} mode: {err:?}");

        write_db(file.path(), &bad_network, start);
        let err = TableDatabase::open(file.path(), &opts).unwrap_err();
        assert!(matches!(err, GeoIpError::InvalidNetwork(_)), "{mode} mode: {err:?}");
    }
}

#[test]
fn test_concurrent_lookups() {
    let _ = env_logger::try_init();

    for mode in MODES {
        let db = open(CITY_DB, OpenOptions::default().mode(mode).check_cache());
        let addrs = ["24.24.24.24", "201.85.50.148", "119.236.232.169", "127.0.0.1"];
        let cities: Vec<Option<String>> = (0..64)
            .into_par_iter()
            .map(|i| {
                db.look_up(addrs[i % addrs.len()])
                    .unwrap()
                    .and_then(|r| r.get_str("city").map(str::to_owned))
            })
            .collect();
        for (i, city) in cities.iter().enumerate() {
            let expected = match i % addrs.len() {
                0 => Some("Deer Park"),
                1 => Some("Jundiaí"),
                _ => None,
            };
            assert_eq!(city.as_deref(), expected, "{mode} mode, lookup {i}");
        }
    }
}

#[test]
fn test_numeric_round_trip_through_lookup() {
    let _ = env_logger::try_init();

    let db = open(CITY_DB, OpenOptions::default());
    let num = crate::addr_to_num("24.24.24.24").unwrap();
    assert_eq!(num, 404_232_216);
    let addr = crate::num_to_addr(u64::from(num)).unwrap();
    let result = db.look_up(&addr).unwrap().unwrap();
    assert_eq!(result.get_str("city"), Some("Deer Park"));
}
