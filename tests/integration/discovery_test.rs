use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

use series_catalog::{
    catalog::{Catalog, ConfigError},
    connector::{discovery_channel, Connector, Discovered, DiscoveryError, RrdConnector},
    storage::{DataSource, MemoryEngine, StorageEngine},
    Error,
};

use crate::common::{rrd_settings, test_registry, touch, PATTERN};

#[tokio::test]
async fn test_discovery_populates_catalog() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MemoryEngine::default());

    let cpu = touch(dir.path(), "host1/cpu.rrd");
    engine.add_dataset(&cpu, "user");
    engine.add_dataset(&cpu, "system");
    let load = touch(dir.path(), "host1/load.rrd");
    engine.add_dataset(&load, "shortterm");
    let disk = touch(dir.path(), "host2/sub/disk.rrd");
    engine.add_dataset(&disk, "read");
    touch(dir.path(), "README.txt");

    let catalog = Catalog::new(test_registry(Arc::clone(&engine)));
    let origin = catalog
        .add_origin("local", &rrd_settings(dir.path(), PATTERN))
        .unwrap();
    assert!(catalog.updated().is_none());

    catalog.update().await.unwrap();

    assert!(catalog.updated().is_some());
    assert_eq!(origin.source_names(), vec!["host1".to_string(), "host2".to_string()]);
    assert_eq!(
        origin.metric_names("host1"),
        vec!["cpu/system".to_string(), "cpu/user".to_string(), "load/shortterm".to_string()]
    );
    assert_eq!(origin.metric_names("host2"), vec!["sub/disk/read".to_string()]);
    assert!(catalog.metric_exists("local", "host2", "sub/disk/read"));
    assert_eq!(origin.metric_count(), 4);
}

#[tokio::test]
async fn test_discovery_channel_protocol() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MemoryEngine::default());

    let path = touch(dir.path(), "web01/memory.rrd");
    engine.add_dataset(&path, "free");
    engine.add_dataset(&path, "used");

    let connector = RrdConnector::new("local", dir.path(), PATTERN, engine as Arc<dyn StorageEngine>);
    let (tx, mut rx) = discovery_channel();

    connector.update(tx).await.unwrap();

    // the connector closed the channel: draining terminates
    let mut received = Vec::new();
    while let Some(item) = rx.recv().await {
        received.push(item);
    }

    assert_eq!(received, vec![
        Discovered::new("web01", "memory/free"),
        Discovered::new("web01", "memory/used"),
    ]);
    assert_eq!(
        connector.data_source("web01", "memory/used"),
        Some(DataSource::new(&path, "used"))
    );
    assert_eq!(connector.metric_count(), 2);
}

#[tokio::test]
async fn test_pattern_group_order() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MemoryEngine::default());

    let path = touch(dir.path(), "cpu/host7.rrd");
    engine.add_dataset(&path, "idle");

    let catalog = Catalog::new(test_registry(engine));
    catalog
        .add_origin("local", &rrd_settings(dir.path(), r"(?P<metric>[^/]+)/(?P<source>[^/]+)\.rrd$"))
        .unwrap();
    catalog.update().await.unwrap();

    assert!(catalog.metric_exists("local", "host7", "cpu/idle"));
}

#[tokio::test]
async fn test_missing_pattern_keyword() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MemoryEngine::default());
    let path = touch(dir.path(), "host1/cpu.rrd");
    engine.add_dataset(&path, "user");

    let catalog = Catalog::new(test_registry(engine));
    let origin = catalog
        .add_origin("local", &rrd_settings(dir.path(), r"(?P<source>[^/]+)/.+\.rrd$"))
        .unwrap();

    let err = catalog.update().await.unwrap_err();
    match err {
        Error::Config(ConfigError::MissingPatternKeyword(keyword)) => assert_eq!(keyword, "metric"),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(origin.metric_count(), 0);
    assert!(catalog.updated().is_none());
}

#[tokio::test]
async fn test_metadata_failure_keeps_partial_discovery() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MemoryEngine::default());

    let known = touch(dir.path(), "host1/a.rrd");
    engine.add_dataset(&known, "value");
    // matches the pattern but the engine has no metadata for it
    touch(dir.path(), "host1/b.rrd");
    let after = touch(dir.path(), "host1/c.rrd");
    engine.add_dataset(&after, "value");

    let catalog = Catalog::new(test_registry(engine));
    let origin = catalog
        .add_origin("local", &rrd_settings(dir.path(), PATTERN))
        .unwrap();

    let err = catalog.update().await.unwrap_err();
    assert!(matches!(err, Error::Discovery(DiscoveryError::Metadata { .. })));

    assert!(catalog.metric_exists("local", "host1", "a/value"));
    assert!(!catalog.metric_exists("local", "host1", "c/value"));
    assert_eq!(origin.metric_count(), 1);
    assert!(catalog.updated().is_none());
}

#[tokio::test]
async fn test_walk_failure() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist");

    let catalog = Catalog::new(test_registry(Arc::new(MemoryEngine::default())));
    catalog
        .add_origin("local", &rrd_settings(&missing, PATTERN))
        .unwrap();

    let err = catalog.update().await.unwrap_err();
    assert!(matches!(err, Error::Discovery(DiscoveryError::Walk { ref path, .. }) if *path == missing));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_non_matching_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(MemoryEngine::default());
    touch(dir.path(), "notes.txt");
    touch(dir.path(), "host1/readme");

    let catalog = Catalog::new(test_registry(engine));
    let origin = catalog
        .add_origin("local", &rrd_settings(dir.path(), PATTERN))
        .unwrap();

    catalog.update().await.unwrap();
    assert_eq!(origin.metric_count(), 0);
    assert!(catalog.updated().is_some());
}
