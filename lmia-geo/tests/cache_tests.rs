//! Integration tests for the persisted location cache table

use lmia_geo::cache::{DELIMITER, HEADER};
use lmia_geo::{LocationCache, PostalCode};
use tempfile::TempDir;

const LUNENBURG_ROW: &str =
    "B0J2C0;44.3698843;-64.2836766;PO Box219, Lunenburg, NS B0J2C0;Cilantro, The Cooks Shop Inc";

fn code(raw: &str) -> PostalCode {
    PostalCode::parse(raw).unwrap()
}

fn read_rows(path: &std::path::Path) -> Vec<csv::StringRecord> {
    csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .from_path(path)
        .unwrap()
        .records()
        .map(|r| r.unwrap())
        .collect()
}

#[test]
fn test_persisted_row_parses_to_five_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postal_cache.csv");
    std::fs::write(&path, format!("{}\n{}\n", HEADER.join(";"), LUNENBURG_ROW)).unwrap();

    let cache = LocationCache::open(&path).unwrap();
    let entry = cache.lookup(&code("B0J2C0")).unwrap();
    assert_eq!(entry.latitude, "44.3698843");
    assert_eq!(entry.longitude, "-64.2836766");
    assert_eq!(entry.address, "PO Box219, Lunenburg, NS B0J2C0");
    assert_eq!(entry.employer, "Cilantro, The Cooks Shop Inc");
}

#[test]
fn test_inserted_row_has_no_quote_artifacts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postal_cache.csv");
    let cache = LocationCache::open(&path).unwrap();

    cache
        .insert(
            &code("B0J2C0"),
            "44.3698843",
            "-64.2836766",
            "PO Box219, Lunenburg, NS B0J2C0",
            "Cilantro, The Cooks Shop Inc",
        )
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().nth(1), Some(LUNENBURG_ROW));
    assert!(!text.contains('"'));

    let rows = read_rows(&path);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), 5);
}

#[test]
fn test_first_write_wins_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postal_cache.csv");

    {
        let cache = LocationCache::open(&path).unwrap();
        assert!(cache.insert(&code("K1A0A6"), "45.4215", "-75.6972", "Ottawa", "Gov").unwrap());
        assert!(!cache.insert(&code("K1A0A6"), "1.0", "2.0", "Elsewhere", "Other").unwrap());
    }

    let cache = LocationCache::open(&path).unwrap();
    let entry = cache.lookup(&code("K1A 0A6")).unwrap();
    assert_eq!((entry.latitude.as_str(), entry.longitude.as_str()), ("45.4215", "-75.6972"));
    assert!(!cache.insert(&code("K1A0A6"), "1.0", "2.0", "Elsewhere", "Other").unwrap());
    assert_eq!(read_rows(&path).len(), 1);
}

#[test]
fn test_sample_fields_never_self_duplicated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postal_cache.csv");
    let cache = LocationCache::open(&path).unwrap();

    cache
        .insert(
            &code("A1C6C9"),
            "47.5615",
            "-52.7126",
            "215 Water Street215 Water Street",
            "Acme LtdAcme Ltd",
        )
        .unwrap();
    cache
        .insert(&code("V0K1A0"), "46.0646", "-118.343", "Walla Walla", "AA")
        .unwrap();

    let reopened = LocationCache::open(&path).unwrap();
    let entry = reopened.lookup(&code("A1C6C9")).unwrap();
    assert_eq!(entry.address, "215 Water Street");
    assert_eq!(entry.employer, "Acme Ltd");

    let entry = reopened.lookup(&code("V0K1A0")).unwrap();
    assert_eq!(entry.address, "Walla Walla");
    assert_eq!(entry.employer, "AA");
}

#[test]
fn test_delimiter_in_field_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("postal_cache.csv");
    let cache = LocationCache::open(&path).unwrap();

    cache
        .insert(&code("M5V3L9"), "43.6426", "-79.3871", "290 Bremner Blvd; Toronto", "CN Tower")
        .unwrap();

    let rows = read_rows(&path);
    assert_eq!(rows[0].len(), 5);
    assert_eq!(&rows[0][3], "290 Bremner Blvd; Toronto");

    let reopened = LocationCache::open(&path).unwrap();
    assert_eq!(
        reopened.lookup(&code("M5V3L9")).unwrap().address,
        "290 Bremner Blvd; Toronto"
    );
}
