//! Tests for hive-rdbc dialect loading

use hive_rdbc::dialect::HIVE_ARP_FILENAME;
use hive_rdbc::prelude::*;
use std::sync::Arc;

#[test]
fn test_shared_dialect_is_same_instance() {
    let a = hive_dialect().unwrap();
    let b = hive_dialect().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_concurrent_first_access_loads_once() {
    let cell = DialectCell::new(HIVE_ARP_FILENAME);

    let loaded: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| cell.get().unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(cell.load_attempts(), 1);
    assert!(loaded.iter().all(|d| Arc::ptr_eq(d, &loaded[0])));
}

#[test]
fn test_cached_failure_is_uniform() {
    let cell = DialectCell::new("arp/implementation/missing-arp.yaml");
    assert!(!cell.is_initialized());

    let first = cell.get().unwrap_err();
    let second = cell.get().unwrap_err();

    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.category(), ErrorCategory::Dialect);
    assert!(first.rejects_activation());
    assert!(cell.is_initialized());
    assert_eq!(cell.load_attempts(), 1);
}

#[test]
fn test_get_with_custom_loader() {
    let cell = DialectCell::new("custom.yaml");
    let yaml = r#"
metadata:
  name: CUSTOM
  apiname: custom
  spec_version: '1'
syntax:
  identifier_quote: '"'
data_types:
  mappings:
    - source:
        name: "INT"
      dremio:
        name: "integer"
"#;
    let d = cell
        .get_with(|path| DialectDescriptor::from_yaml(path, yaml))
        .unwrap();

    assert_eq!(d.name(), "CUSTOM");
    assert_eq!(d.map_source_type("int"), Some("integer"));
    assert_eq!(d.quote_identifier("t"), "\"t\"");

    // The first loader wins forever
    let again = cell.get().unwrap();
    assert!(Arc::ptr_eq(&d, &again));
}

#[test]
fn test_malformed_definition() {
    let err = DialectDescriptor::from_yaml("bad.yaml", "metadata: [").unwrap_err();
    assert!(matches!(err, Error::Dialect { ref path, .. } if path == "bad.yaml"));
}

#[test]
fn test_hive_capabilities() {
    let d = load_dialect(HIVE_ARP_FILENAME).unwrap();

    assert_eq!(d.name(), "HIVEJDBC");
    assert!(d.supports_schemas());
    assert!(!d.supports_catalogs());
    assert_eq!(d.quote_identifier("events"), "`events`");
    assert_eq!(d.limit_offset_sql(Some(25), None).as_deref(), Some("LIMIT 25"));
    assert!(d.supports_aggregate("sum", &["bigint"]));
    assert!(!d.supports_aggregate("median", &["bigint"]));
}
