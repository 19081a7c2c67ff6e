use proptest::prelude::*;
use std::sync::Arc;

use series_catalog::{
    catalog::{Catalog, Metric},
    storage::MemoryEngine,
    Discovered,
};

use crate::common::{static_settings, test_registry};

fn populated() -> Catalog {
    let catalog = Catalog::new(test_registry(Arc::new(MemoryEngine::default())));
    let origin = catalog.add_origin("o1", &static_settings("", false)).unwrap();

    origin.register(Discovered::new("host1", "cpu/user"));
    origin.register(Discovered::new("host1", "cpu/system"));
    origin.register(Discovered::new("host2", "load/shortterm"));

    catalog
}

#[test]
fn test_get_metric() {
    let catalog = populated();

    assert_eq!(
        catalog.get_metric("o1", "host1", "cpu/user"),
        Some(Metric::new("o1", "host1", "cpu/user"))
    );
    assert!(catalog.metric_exists("o1", "host2", "load/shortterm"));
}

#[test]
fn test_missing_levels() {
    let catalog = populated();

    // unknown origin, source and metric
    for (origin, source, metric) in [
        ("o2", "host1", "cpu/user"),
        ("o1", "host3", "cpu/user"),
        ("o1", "host1", "cpu/idle"),
        ("o1", "host2", "cpu/user"),
    ] {
        assert!(!catalog.metric_exists(origin, source, metric));
        assert!(catalog.get_metric(origin, source, metric).is_none());
    }
}

#[test]
fn test_register_is_idempotent() {
    let catalog = populated();
    let origin = catalog.origin("o1").unwrap();

    assert!(!origin.register(Discovered::new("host1", "cpu/user")));
    assert!(origin.register(Discovered::new("host3", "mem/free")));

    assert_eq!(origin.metric_count(), 4);
    assert_eq!(
        origin.source_names(),
        vec!["host1".to_string(), "host2".to_string(), "host3".to_string()]
    );
    assert_eq!(
        origin.metric_names("host1"),
        vec!["cpu/system".to_string(), "cpu/user".to_string()]
    );
    assert!(origin.metric_names("host9").is_empty());
}

proptest! {
    #[test]
    fn test_exists_matches_lookup(
        origin in prop::sample::select(vec!["o1", "o2"]),
        source in prop::sample::select(vec!["host1", "host2", "host3"]),
        metric in prop::sample::select(vec!["cpu/user", "cpu/system", "load/shortterm", "mem/free"]),
    ) {
        let catalog = populated();
        prop_assert_eq!(
            catalog.metric_exists(origin, source, metric),
            catalog.get_metric(origin, source, metric).is_some()
        );
    }

    #[test]
    fn test_registered_metrics_are_found(
        source in "[a-z][a-z0-9-]{0,15}",
        metric in "[a-z]{1,8}/[a-z]{1,8}",
    ) {
        let catalog = populated();
        let origin = catalog.origin("o1").unwrap();
        origin.register(Discovered::new(source.clone(), metric.clone()));

        let found = catalog.get_metric("o1", &source, &metric);
        prop_assert_eq!(found, Some(Metric::new("o1", source.clone(), metric.clone())));
        prop_assert!(!catalog.metric_exists("o2", &source, &metric));
    }
}

#[test]
fn test_static_origin_update() {
    let catalog = Catalog::new(test_registry(Arc::new(MemoryEngine::default())));
    catalog
        .add_origin("o1", &static_settings("host1:cpu/user,host1:cpu/idle,host3:mem/used", false))
        .unwrap();

    tokio_test::block_on(catalog.update()).unwrap();

    let origin = catalog.origin("o1").unwrap();
    assert_eq!(origin.source_names(), vec!["host1".to_string(), "host3".to_string()]);
    assert_eq!(origin.metric_names("host1"), vec!["cpu/idle".to_string(), "cpu/user".to_string()]);
    assert!(catalog.updated().is_some());
}
