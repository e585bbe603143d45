mod support;

use std::sync::Arc;
use std::time::Duration;

use confreader::application::repos::{DurableError, NoopDistributedCache};
use confreader::cache::{CacheConfig, Lookup, ReaderState, RefreshError, TieredCache};
use confreader::domain::entities::{ConfigEntry, ConfigValueType};
use confreader::domain::error::ReadError;
use support::{APP, FakeDistributedCache, InMemoryStore, entry, typed_entry};

async fn load(store: &Arc<InMemoryStore>, distributed: &Arc<FakeDistributedCache>) -> TieredCache {
    TieredCache::load(
        APP.to_string(),
        CacheConfig::default(),
        store.clone(),
        distributed.clone(),
    )
    .await
    .expect("initial load")
}

fn service_a_entries() -> Vec<ConfigEntry> {
    vec![
        typed_entry("MaxItemCount", "50", ConfigValueType::Int),
        typed_entry("Flag", "True", ConfigValueType::Bool),
        typed_entry("Count", "notanumber", ConfigValueType::Int),
        entry("SiteName", "soty.io"),
    ]
}

#[tokio::test]
async fn seeded_integer_is_returned() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let cache = load(&store, &FakeDistributedCache::new()).await;

    assert_eq!(cache.get_value::<i32>("MaxItemCount").await, Ok(50));
    assert_eq!(cache.get_value::<i64>("MaxItemCount").await, Ok(50));
    assert_eq!(cache.state(), ReaderState::Ready);
}

#[tokio::test]
async fn missing_key_yields_default_or_not_found() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let cache = load(&store, &FakeDistributedCache::new()).await;

    assert_eq!(
        cache
            .get_value_or("Missing", "fallback".to_string())
            .await,
        Ok("fallback".to_string())
    );
    assert_eq!(
        cache.get_value::<String>("Missing").await,
        Err(ReadError::not_found(APP, "Missing"))
    );
    assert_eq!(cache.try_get_value::<String>("Missing").await, None);
}

#[tokio::test]
async fn booleans_ignore_case() {
    let store = InMemoryStore::with_entries(vec![
        entry("Flag", "True"),
        entry("Upper", "TRUE"),
        entry("Lower", "true"),
        entry("Off", "FALSE"),
    ]);
    let cache = load(&store, &FakeDistributedCache::new()).await;

    for key in ["Flag", "Upper", "Lower"] {
        assert_eq!(cache.get_value::<bool>(key).await, Ok(true), "{key}");
    }
    assert_eq!(cache.get_value::<bool>("Off").await, Ok(false));
}

#[tokio::test]
async fn conversion_failure_is_never_defaulted() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let cache = load(&store, &FakeDistributedCache::new()).await;

    let err = cache
        .get_value::<i32>("Count")
        .await
        .expect_err("not a number");
    match err {
        ReadError::Conversion(conversion) => {
            assert_eq!(conversion.key.as_deref(), Some("Count"));
            assert_eq!(conversion.value, "notanumber");
        }
        other => panic!("expected conversion error, got {other:?}"),
    }

    let err = cache
        .get_value_or::<i32>("Count", 10)
        .await
        .expect_err("default does not mask corrupt data");
    assert!(matches!(err, ReadError::Conversion(_)));

    assert_eq!(cache.try_get_value::<i32>("Count").await, None);
    assert!(matches!(
        cache.lookup::<i32>("Count").await,
        Lookup::ConversionFailed(_)
    ));
}

#[tokio::test]
async fn refreshed_strings_round_trip_byte_identical() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let cache = load(&store, &FakeDistributedCache::new()).await;

    let tricky = "  leading and trailing  \tçà ✓ \"quoted\" = x;y ";
    store.upsert(entry("Banner", tricky)).await;
    cache.refresh().await.expect("refresh");

    assert_eq!(cache.get_value::<String>("Banner").await, Ok(tricky.to_string()));
    assert_eq!(cache.get_all_snapshot().get("Banner"), Some(tricky));
}

#[tokio::test]
async fn refresh_twice_without_changes_is_idempotent() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let cache = load(&store, &FakeDistributedCache::new()).await;

    let first = cache.refresh().await.expect("first refresh");
    let before = cache.get_all_snapshot();
    let second = cache.refresh().await.expect("second refresh");
    let after = cache.get_all_snapshot();

    assert!(before.same_entries(&after));
    assert!(!second.changed);
    assert_eq!(second.removed, 0);
    assert_eq!(first.generation + 1, second.generation);
    assert_eq!(after.generation(), 3);
}

#[tokio::test]
async fn refresh_failure_keeps_last_good_snapshot() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let cache = load(&store, &FakeDistributedCache::new()).await;

    store.set_failing(true);
    let err = cache.refresh().await.expect_err("store is down");
    assert!(matches!(err, RefreshError::Durable(DurableError::Unavailable(_))));

    assert_eq!(cache.get_all_snapshot().generation(), 1);
    assert_eq!(cache.get_value::<i32>("MaxItemCount").await, Ok(50));
    assert_eq!(cache.state(), ReaderState::Ready);

    store.set_failing(false);
    let report = cache.refresh().await.expect("store is back");
    assert_eq!(report.generation, 2);
}

#[tokio::test]
async fn empty_initial_load_fails_construction() {
    let store = InMemoryStore::with_entries(Vec::new());
    let result = TieredCache::load(
        APP.to_string(),
        CacheConfig::default(),
        store,
        Arc::new(NoopDistributedCache),
    )
    .await;

    assert!(matches!(
        result,
        Err(DurableError::EmptyDataset { ref application_name }) if application_name == APP
    ));
}

#[tokio::test]
async fn unreachable_store_fails_construction() {
    let store = InMemoryStore::with_entries(service_a_entries());
    store.set_failing(true);

    let result = TieredCache::load(
        APP.to_string(),
        CacheConfig::default(),
        store,
        Arc::new(NoopDistributedCache),
    )
    .await;

    assert!(matches!(result, Err(DurableError::Unavailable(_))));
}

#[tokio::test]
async fn deactivating_every_entry_empties_the_cache() {
    let store = InMemoryStore::with_entries(vec![typed_entry("Flag", "True", ConfigValueType::Bool)]);
    let distributed = FakeDistributedCache::new();
    let cache = load(&store, &distributed).await;
    assert_eq!(cache.get_value::<bool>("Flag").await, Ok(true));

    store.deactivate("Flag").await;
    let report = cache.refresh().await.expect("empty refresh is applied");

    assert_eq!(report.entries, 0);
    assert_eq!(report.removed, 1);
    assert!(report.changed);
    assert!(cache.get_all_snapshot().is_empty());
    assert_eq!(distributed.value("config:SERVICE-A:Flag").await, None);
    assert!(
        cache
            .get_value::<bool>("Flag")
            .await
            .expect_err("deactivated")
            .is_not_found()
    );
}

#[tokio::test]
async fn inactive_and_foreign_entries_are_invisible() {
    let store = InMemoryStore::with_entries(vec![
        entry("SiteName", "soty.io"),
        entry("Legacy", "old").deactivated(),
        ConfigEntry::new("SERVICE-B", "Secret", "b-only", ConfigValueType::String),
    ]);
    let cache = load(&store, &FakeDistributedCache::new()).await;

    let snapshot = cache.get_all_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(cache.get_value::<String>("Legacy").await.is_err());
    assert!(cache.get_value::<String>("Secret").await.is_err());
}

#[tokio::test]
async fn keys_match_regardless_of_case() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let cache = load(&store, &FakeDistributedCache::new()).await;

    assert_eq!(cache.get_value::<i32>("maxitemcount").await, Ok(50));
    assert_eq!(cache.get_value::<i32>("MAXITEMCOUNT").await, Ok(50));
    assert_eq!(cache.get_cached::<String>("sitename"), Lookup::Found("soty.io".to_string()));
    assert_eq!(store.fetch_one_calls(), 0);
}

#[tokio::test]
async fn durable_fallback_matches_regardless_of_case() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let cache = load(&store, &FakeDistributedCache::new()).await;

    store.upsert(entry("LateKey", "late")).await;

    assert_eq!(
        cache.get_value::<String>("latekey").await,
        Ok("late".to_string())
    );
    assert_eq!(store.fetch_one_calls(), 1);
}

#[tokio::test]
async fn blank_keys_are_absent_without_tier_io() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let distributed = FakeDistributedCache::new();
    let cache = load(&store, &distributed).await;
    let calls_after_load = distributed.calls();

    for key in ["", "   ", "\t"] {
        assert!(
            cache
                .get_value::<String>(key)
                .await
                .expect_err("blank key")
                .is_not_found(),
            "{key:?}"
        );
        assert_eq!(cache.get_value_or(key, 7).await, Ok(7));
        assert_eq!(cache.get_cached::<String>(key), Lookup::NotFound);
    }

    assert_eq!(distributed.calls(), calls_after_load);
    assert_eq!(store.fetch_one_calls(), 0);
}

#[tokio::test]
async fn distributed_tier_answers_snapshot_misses() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let distributed = FakeDistributedCache::new();
    let cache = load(&store, &distributed).await;

    distributed.insert("config:SERVICE-A:Extra", "17").await;

    assert_eq!(cache.get_value::<i32>("Extra").await, Ok(17));
    assert_eq!(store.fetch_one_calls(), 0);
}

#[tokio::test]
async fn durable_hit_writes_through_with_ttl() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let distributed = FakeDistributedCache::new();
    let cache = load(&store, &distributed).await;

    store.upsert(entry("LateKey", "late")).await;

    assert_eq!(cache.get_value::<String>("LateKey").await, Ok("late".to_string()));
    assert_eq!(store.fetch_one_calls(), 1);
    assert_eq!(
        distributed.value("config:SERVICE-A:LateKey").await,
        Some("late".to_string())
    );
    assert_eq!(
        distributed.ttl("config:SERVICE-A:LateKey").await,
        Some(Duration::from_secs(300))
    );

    // The second read is served by the distributed tier.
    assert_eq!(cache.get_value::<String>("LateKey").await, Ok("late".to_string()));
    assert_eq!(store.fetch_one_calls(), 1);
}

#[tokio::test]
async fn distributed_outage_never_fails_reads() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let distributed = FakeDistributedCache::failing();
    let cache = load(&store, &distributed).await;

    assert_eq!(cache.get_value::<i32>("MaxItemCount").await, Ok(50));

    store.upsert(entry("LateKey", "late")).await;
    assert_eq!(cache.get_value::<String>("LateKey").await, Ok("late".to_string()));

    let err = cache
        .get_value::<String>("Missing")
        .await
        .expect_err("absent everywhere");
    assert!(err.is_not_found());

    cache.refresh().await.expect("refresh ignores distributed failures");
    assert!(distributed.calls() > 0);
}

#[tokio::test]
async fn durable_failure_on_read_path_is_reported_as_absence() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let cache = load(&store, &FakeDistributedCache::new()).await;

    store.set_failing(true);
    assert!(
        cache
            .get_value::<String>("NotCached")
            .await
            .expect_err("store is down")
            .is_not_found()
    );
    assert_eq!(cache.get_value::<i32>("MaxItemCount").await, Ok(50));
}

#[tokio::test]
async fn load_and_refresh_publish_to_distributed_tier() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let distributed = FakeDistributedCache::new();
    let cache = load(&store, &distributed).await;

    assert_eq!(distributed.len().await, 4);
    assert_eq!(
        distributed.value("config:SERVICE-A:SiteName").await,
        Some("soty.io".to_string())
    );

    store.deactivate("SiteName").await;
    let report = cache.refresh().await.expect("refresh");

    assert_eq!(report.removed, 1);
    assert!(report.changed);
    assert_eq!(distributed.value("config:SERVICE-A:SiteName").await, None);
    assert!(
        cache
            .get_value::<String>("SiteName")
            .await
            .expect_err("deactivated")
            .is_not_found()
    );
}

#[tokio::test]
async fn purge_removes_only_this_application() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let distributed = FakeDistributedCache::new();
    let cache = load(&store, &distributed).await;
    distributed.insert("config:SERVICE-B:Other", "x").await;

    let removed = cache.purge_distributed().await.expect("purge");

    assert_eq!(removed, 4);
    assert_eq!(
        distributed.value("config:SERVICE-B:Other").await,
        Some("x".to_string())
    );
}

#[tokio::test]
async fn concurrent_refreshes_are_serialized() {
    let store = InMemoryStore::with_entries(service_a_entries());
    store.set_fetch_delay(Duration::from_millis(5));
    let cache = Arc::new(load(&store, &FakeDistributedCache::new()).await);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.refresh().await })
        })
        .collect();

    let mut generations = Vec::new();
    for handle in handles {
        let report = handle.await.expect("join").expect("refresh");
        generations.push(report.generation);
    }
    generations.sort_unstable();

    assert_eq!(generations, (2..=9).collect::<Vec<u64>>());
    assert_eq!(cache.get_all_snapshot().generation(), 9);
    assert_eq!(store.fetch_active_calls(), 9);
}

#[tokio::test]
async fn disposed_cache_serves_reads_but_refuses_refresh() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let cache = load(&store, &FakeDistributedCache::new()).await;

    cache.mark_disposed();

    assert_eq!(cache.state(), ReaderState::Disposed);
    assert!(matches!(cache.refresh().await, Err(RefreshError::Disposed)));
    assert_eq!(cache.get_value::<i32>("MaxItemCount").await, Ok(50));
}

#[tokio::test]
async fn disposal_releases_the_distributed_tier() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let distributed = FakeDistributedCache::new();
    let cache = load(&store, &distributed).await;
    assert_eq!(Arc::strong_count(&distributed), 2);
    assert_eq!(cache.distributed_backend(), "fake");

    cache.mark_disposed();

    assert_eq!(Arc::strong_count(&distributed), 1);
    assert_eq!(cache.distributed_backend(), "noop");
    let calls_after_dispose = distributed.calls();
    assert!(cache.get_value::<String>("Missing").await.is_err());
    assert_eq!(distributed.calls(), calls_after_dispose);
}

#[tokio::test]
async fn cached_lookup_stays_in_process() {
    let store = InMemoryStore::with_entries(service_a_entries());
    let distributed = FakeDistributedCache::new();
    let cache = load(&store, &distributed).await;
    let calls_after_load = distributed.calls();

    assert_eq!(cache.get_cached::<i32>("MaxItemCount"), Lookup::Found(50));
    assert_eq!(cache.get_cached::<i32>("Missing"), Lookup::NotFound);
    assert_eq!(distributed.calls(), calls_after_load);
    assert_eq!(store.fetch_one_calls(), 0);
}
