use std::sync::Arc;

use series_catalog::{
    catalog::{Catalog, ConfigError, ConnectorRegistry, ConnectorSettings},
    storage::MemoryEngine,
    Error,
};

use crate::common::{rrd_settings, static_settings, test_registry, StaticConnector, PATTERN};

fn catalog() -> Catalog {
    Catalog::new(test_registry(Arc::new(MemoryEngine::default())))
}

#[test]
fn test_registry_types() {
    let registry = test_registry(Arc::new(MemoryEngine::default()));
    assert_eq!(registry.types(), vec!["rrd", StaticConnector::TYPE]);
    assert!(registry.contains("rrd"));
    assert!(!registry.contains("graphite"));
    assert!(ConnectorRegistry::new().is_empty());
}

#[test]
fn test_add_origin_unknown_type() {
    let catalog = catalog();
    let settings = ConnectorSettings::new().with("type", "graphite");

    let err = catalog.add_origin("remote", &settings).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::UnknownBackendType(ref name)) if name == "graphite"
    ));
    assert!(catalog.origin_names().is_empty());
}

#[test]
fn test_add_origin_missing_type() {
    let catalog = catalog();
    let settings = ConnectorSettings::new().with("path", "/tmp");

    let err = catalog.add_origin("remote", &settings).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::MissingBackendType)));
    assert!(catalog.origin("remote").is_none());
}

#[test]
fn test_add_origin_missing_setting() {
    let catalog = catalog();
    let settings = ConnectorSettings::new()
        .with("type", "rrd")
        .with("pattern", PATTERN);

    let err = catalog.add_origin("local", &settings).unwrap_err();
    assert!(err.is_config());
    assert_eq!(
        err.to_string(),
        "Configuration error: missing `path` mandatory connector setting"
    );
    assert!(catalog.origin_names().is_empty());
}

#[test]
fn test_add_origin_rejects_duplicates() {
    let catalog = catalog();
    let first = catalog
        .add_origin("local", &static_settings("host1:load", false))
        .unwrap();
    first.register(series_catalog::Discovered::new("host1", "load"));

    let err = catalog
        .add_origin("local", &rrd_settings(std::path::Path::new("/tmp"), PATTERN))
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::DuplicateOrigin(ref name)) if name == "local"));

    // the first origin and its tree are untouched
    assert!(Arc::ptr_eq(&catalog.origin("local").unwrap(), &first));
    assert!(catalog.metric_exists("local", "host1", "load"));
}

#[test]
fn test_from_config() {
    let config = series_catalog::CatalogConfig::from_json(r#"{
        "origins": {
            "a": {"type": "static", "metrics": "h:m"},
            "b": {"type": "static"}
        }
    }"#).unwrap();

    let catalog = Catalog::from_config(
        test_registry(Arc::new(MemoryEngine::default())),
        &config,
    )
    .unwrap();
    assert_eq!(catalog.origin_names(), vec!["a".to_string(), "b".to_string()]);

    let config = series_catalog::CatalogConfig::from_json(r#"{
        "origins": {"a": {"type": "nope"}}
    }"#).unwrap();
    let err = Catalog::from_config(test_registry(Arc::new(MemoryEngine::default())), &config).unwrap_err();
    assert!(err.is_config());
}
