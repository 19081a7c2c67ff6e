use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use series_catalog::{
    catalog::Catalog,
    connector::DiscoveryError,
    storage::MemoryEngine,
    Error,
};

use crate::common::{static_settings, test_registry};

fn catalog() -> Catalog {
    Catalog::new(test_registry(Arc::new(MemoryEngine::default())))
}

#[tokio::test]
async fn test_update_advances_timestamp() {
    let catalog = catalog();
    catalog
        .add_origin("a", &static_settings("host1:cpu,host2:cpu", false))
        .unwrap();

    catalog.update().await.unwrap();
    let first = catalog.updated().unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    catalog.update().await.unwrap();
    let second = catalog.updated().unwrap();

    assert!(second > first);
    assert_eq!(catalog.origin("a").unwrap().metric_count(), 2);
}

#[tokio::test]
async fn test_failing_origin_poisons_timestamp() {
    let catalog = catalog();
    catalog
        .add_origin("good", &static_settings("host1:cpu/user,host1:load/shortterm", false))
        .unwrap();

    catalog.update().await.unwrap();
    let before = catalog.updated();
    assert!(before.is_some());

    catalog
        .add_origin("bad", &static_settings("host9:mem/free", true))
        .unwrap();

    let err = catalog.update().await.unwrap_err();
    assert!(matches!(err, Error::Discovery(DiscoveryError::Walk { .. })));

    // every origin was attempted and partial discoveries stay
    assert_eq!(catalog.updated(), before);
    assert!(catalog.metric_exists("good", "host1", "cpu/user"));
    assert!(catalog.metric_exists("good", "host1", "load/shortterm"));
    assert!(catalog.metric_exists("bad", "host9", "mem/free"));
}

#[tokio::test]
async fn test_first_update_failure_leaves_timestamp_unset() {
    let catalog = catalog();
    catalog.add_origin("good", &static_settings("h:m", false)).unwrap();
    catalog.add_origin("bad", &static_settings("", true)).unwrap();

    assert!(catalog.update().await.is_err());
    assert!(catalog.updated().is_none());
    assert!(catalog.metric_exists("good", "h", "m"));
}

#[tokio::test]
async fn test_update_reports_last_failure() {
    let catalog = catalog();
    catalog.add_origin("alpha", &static_settings("h1:m", false)).unwrap();
    catalog.update().await.unwrap();
    let before = catalog.updated();

    catalog.add_origin("zulu", &static_settings("h3:m", true)).unwrap();
    catalog.add_origin("mike", &static_settings("h2:m", true)).unwrap();

    // origins are refreshed in name order, the last failure wins
    let err = catalog.update().await.unwrap_err();
    match err {
        Error::Discovery(DiscoveryError::Walk { path, .. }) => {
            assert_eq!(path, Path::new("/static/zulu"));
        }
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(catalog.updated(), before);
    assert!(catalog.metric_exists("mike", "h2", "m"));
    assert!(catalog.metric_exists("zulu", "h3", "m"));
}

#[tokio::test]
async fn test_origin_update_counts_received() {
    let catalog = catalog();
    let origin = catalog
        .add_origin("a", &static_settings("h1:m1,h1:m2,h2:m1", false))
        .unwrap();

    assert_eq!(origin.update().await.unwrap(), 3);
    // repeated discoveries are received again but not duplicated
    assert_eq!(origin.update().await.unwrap(), 3);
    assert_eq!(origin.metric_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reads_during_update() {
    let metrics: Vec<String> = (0..5000).map(|i| format!("host{}:metric{}", i % 10, i)).collect();

    let catalog = Arc::new(catalog());
    catalog
        .add_origin("big", &static_settings(&metrics.join(","), false))
        .unwrap();

    let reader = {
        let catalog = Arc::clone(&catalog);
        tokio::spawn(async move {
            let mut seen = 0;
            for _ in 0..100 {
                let origin = catalog.origin("big").unwrap();
                let count = origin.metric_count();
                assert!(count >= seen);
                seen = count;
                tokio::task::yield_now().await;
            }
        })
    };

    catalog.update().await.unwrap();
    reader.await.unwrap();

    assert_eq!(catalog.origin("big").unwrap().metric_count(), 5000);
}
