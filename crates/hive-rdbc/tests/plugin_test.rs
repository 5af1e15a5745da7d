//! Tests for hive-rdbc plugin configuration assembly

mod common;

use common::{registry_with, MockDriver};
use hive_rdbc::prelude::*;
use std::sync::Arc;

const CS: &str = "jdbc:hive2://host:10000/default";

fn conf() -> HiveJdbcConf {
    HiveJdbcConf::new(CS, "alice", "prefix:base64,c2VjcmV0")
}

#[test]
fn test_assembled_config() {
    let plugin = assemble(&conf(), hive_dialect().unwrap()).unwrap();

    assert_eq!(plugin.fetch_size(), 200);
    assert!(plugin.hidden_schemas().is_empty());
    assert!(Arc::ptr_eq(plugin.dialect(), &hive_dialect().unwrap()));
}

#[test]
fn test_fetch_size_passes_through() {
    let plugin = assemble(&conf().with_fetch_size(1000), hive_dialect().unwrap()).unwrap();
    assert_eq!(plugin.fetch_size(), 1000);
}

#[test]
fn test_invalid_config_produces_no_plugin() {
    let conf = HiveJdbcConf {
        username: None,
        ..conf()
    };
    let err = conf
        .build_plugin_config(&NoCredentials, &NoOptions)
        .unwrap_err();
    assert!(matches!(err, Error::MissingField(RequiredField::Username)));
    assert!(err.rejects_activation());

    let conf = HiveJdbcConf::new(CS, "alice", "no-marker");
    assert!(conf.build_plugin_config(&NoCredentials, &NoOptions).is_err());
}

#[test]
fn test_blank_connection_string_produces_no_plugin() {
    let conf = HiveJdbcConf::new("   ", "alice", "base64,c2VjcmV0");

    let err = conf
        .build_plugin_config(&NoCredentials, &NoOptions)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(err.rejects_activation());

    let (registry, _state) = registry_with(HIVE_DRIVER);
    assert!(assemble_with_registry(&conf, hive_dialect().unwrap(), registry).is_err());
}

#[test]
fn test_sources_share_one_dialect() {
    let a = conf().build_plugin_config(&NoCredentials, &NoOptions).unwrap();
    let b = HiveJdbcConf::new("jdbc:hive2://other:10000", "bob", "base64,")
        .build_plugin_config(&NoCredentials, &NoOptions)
        .unwrap();
    assert!(Arc::ptr_eq(a.dialect(), b.dialect()));
}

#[tokio::test]
async fn test_factory_is_lazy_and_independent() {
    let (registry, state) = registry_with(HIVE_DRIVER);
    let plugin = assemble_with_registry(&conf(), hive_dialect().unwrap(), registry).unwrap();
    assert_eq!(state.connects(), 0);

    let ds1 = plugin.new_data_source();
    let ds2 = plugin.new_data_source();
    assert!(!Arc::ptr_eq(&ds1, &ds2));
    assert_eq!(state.connects(), 0);

    let conn = ds1.get().await.unwrap();
    conn.release().await;
    assert_eq!(state.connects(), 1);
    assert_eq!(
        state.urls(),
        vec!["jdbc:hive2://host:10000/default;user=alice;password=secret;".to_string()]
    );
    assert_eq!(ds2.size(), 0);

    ds1.close().await.unwrap();
    ds2.close().await.unwrap();
    assert_eq!(state.closes(), 1);
}

#[tokio::test]
async fn test_factory_uses_pool_settings() {
    let (registry, state) = registry_with(HIVE_DRIVER);
    let conf = conf().with_max_idle_connections(0);
    let plugin = assemble_with_registry(&conf, hive_dialect().unwrap(), registry).unwrap();

    let ds = plugin.new_data_source();
    let conn = ds.get().await.unwrap();
    conn.release().await;

    assert_eq!(ds.idle(), 0);
    assert_eq!(state.closes(), 1);
}

#[tokio::test]
async fn test_global_registry_factory() {
    let driver = MockDriver::new(HIVE_DRIVER);
    let state = Arc::clone(&driver.state);
    DriverRegistry::global().register(Arc::new(driver));

    let plugin = conf().build_plugin_config(&NoCredentials, &NoOptions).unwrap();
    let factory = plugin.datasource_factory();
    let ds = factory();

    let conn = ds.get().await.unwrap();
    conn.release().await;
    ds.close().await.unwrap();

    assert_eq!(state.connects(), 1);
    assert_eq!(state.closes(), 1);
}
