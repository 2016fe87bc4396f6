//! Integration tests for the read-through shop cache over the local store.
//!
//! These exercise the lookup protocol end to end: negative caching,
//! single-flight rebuilds, lock contention, lock-holder crashes and
//! invalidation after writes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use shopcache_db_memory::{InMemoryShopStorage, StorageOptions};
use shopcache_server::cache::codec;
use shopcache_server::{
    AppConfig, CacheError, CachePolicy, Outcome, ReadStrategy, SharedStore, ShopCacheReader,
    ShopService,
};
use shopcache_storage::{DynShopStorage, Shop, ShopStorage, StorageError};

fn test_policy() -> CachePolicy {
    CachePolicy {
        shop_ttl: Duration::from_secs(60),
        null_ttl: Duration::from_secs(30),
        lock_ttl: Duration::from_secs(10),
        retry_delay: Duration::from_millis(20),
        lock_wait: Duration::from_secs(3),
        max_lock_attempts: 1000,
        rebuild_timeout: Duration::from_secs(2),
        ..CachePolicy::default()
    }
}

fn memory_storage(options: StorageOptions) -> Arc<InMemoryShopStorage> {
    Arc::new(InMemoryShopStorage::with_options(options))
}

fn reader_with(
    store: &SharedStore,
    storage: &Arc<InMemoryShopStorage>,
    policy: CachePolicy,
) -> ShopCacheReader {
    ShopCacheReader::new(store.clone(), storage.clone() as DynShopStorage, policy)
}

/// Backing store that is always unreachable.
struct UnavailableStorage;

#[async_trait]
impl ShopStorage for UnavailableStorage {
    async fn read(&self, _id: i64) -> Result<Option<Shop>, StorageError> {
        Err(StorageError::connection_error("database is down"))
    }

    async fn update(&self, _shop: &Shop) -> Result<(), StorageError> {
        Err(StorageError::connection_error("database is down"))
    }

    fn backend_name(&self) -> &'static str {
        "unavailable"
    }
}

#[tokio::test]
async fn missing_shop_is_negatively_cached() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    let reader = reader_with(&store, &storage, test_policy());

    assert_eq!(reader.lookup(7).await.unwrap(), None);
    assert_eq!(
        store.get("cache:shop:7").await.unwrap().as_deref(),
        Some(codec::EMPTY_MARKER)
    );

    // Second lookup is answered by the empty marker.
    assert_eq!(reader.lookup(7).await.unwrap(), None);
    assert_eq!(storage.stats().reads, 1);

    let stats = reader.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.negative_hits, 1);
    assert_eq!(stats.rebuilds, 1);
}

#[tokio::test]
async fn cold_lookup_populates_entry() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    storage.insert(Shop::new(7, "X"));
    let reader = reader_with(&store, &storage, test_policy());

    let shop = reader.lookup(7).await.unwrap().expect("shop 7");
    assert_eq!(shop, Shop::new(7, "X"));
    assert_eq!(storage.stats().reads, 1);

    let raw = store.get("cache:shop:7").await.unwrap().expect("entry");
    assert_eq!(codec::decode(&raw).unwrap(), shop);
    assert_eq!(store.get("lock:shop:7").await.unwrap(), None);

    // Warm lookups never reach the backing store.
    for _ in 0..5 {
        assert_eq!(reader.lookup(7).await.unwrap(), Some(shop.clone()));
    }
    assert_eq!(storage.stats().reads, 1);
    assert_eq!(reader.stats().hits, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_lookups_rebuild_once() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions {
        read_latency: Some(Duration::from_millis(150)),
        ..StorageOptions::default()
    });
    storage.insert(Shop::new(7, "X"));
    let reader = Arc::new(reader_with(&store, &storage, test_policy()));

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let reader = Arc::clone(&reader);
            tokio::spawn(async move { reader.lookup(7).await })
        })
        .collect();

    for handle in handles {
        let shop = handle.await.expect("task").expect("lookup");
        assert_eq!(shop, Some(Shop::new(7, "X")));
    }

    assert_eq!(storage.stats().reads, 1);
    assert_eq!(reader.stats().rebuilds, 1);
    assert!(reader.stats().lock_contentions > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn short_lock_ttl_config_keeps_single_flight() {
    // A rebuild allowed to run past the lock TTL is refused up front.
    let mut cfg = AppConfig::default();
    cfg.cache.lock_ttl_secs = 1;
    cfg.cache.rebuild_timeout_ms = 5000;
    assert!(cfg.validate().is_err());

    cfg.cache.rebuild_timeout_ms = 500;
    cfg.validate().expect("rebuild fits inside the lock TTL");

    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions {
        read_latency: Some(Duration::from_millis(300)),
        ..StorageOptions::default()
    });
    storage.insert(Shop::new(7, "X"));
    let reader = Arc::new(reader_with(&store, &storage, CachePolicy::from(&cfg.cache)));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let reader = Arc::clone(&reader);
            tokio::spawn(async move { reader.lookup(7).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(
            handle.await.expect("task").expect("lookup"),
            Some(Shop::new(7, "X"))
        );
    }
    assert_eq!(storage.stats().reads, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_lookups_of_missing_shop_query_once() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions {
        read_latency: Some(Duration::from_millis(100)),
        ..StorageOptions::default()
    });
    let reader = Arc::new(reader_with(&store, &storage, test_policy()));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let reader = Arc::clone(&reader);
            tokio::spawn(async move { reader.lookup(404).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), None);
    }

    assert_eq!(storage.stats().reads, 1);
}

#[tokio::test]
async fn update_then_lookup_returns_new_value() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    storage.insert(Shop::new(7, "X"));
    let service = ShopService::new(
        store.clone(),
        storage.clone() as DynShopStorage,
        test_policy(),
        ReadStrategy::Mutex,
    );

    assert_eq!(
        service.query_by_id(7).await,
        Outcome::Ok {
            data: Shop::new(7, "X")
        }
    );

    assert!(service.update(&Shop::new(7, "Y")).await.is_ok());
    assert_eq!(store.get("cache:shop:7").await.unwrap(), None);

    assert_eq!(
        service.query_by_id(7).await.data(),
        Some(Shop::new(7, "Y"))
    );
    assert_eq!(storage.stats().reads, 2);
    assert_eq!(storage.stats().writes, 1);
}

#[tokio::test]
async fn update_clears_negative_entry() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    let service = ShopService::new(
        store.clone(),
        storage.clone() as DynShopStorage,
        test_policy(),
        ReadStrategy::Mutex,
    );

    assert!(matches!(
        service.query_by_id(9).await,
        Outcome::NotFound { .. }
    ));
    assert!(service.update(&Shop::new(9, "new")).await.is_ok());
    assert_eq!(
        service.query_by_id(9).await.data(),
        Some(Shop::new(9, "new"))
    );
}

#[tokio::test]
async fn update_without_id_is_rejected_before_any_store_access() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    let service = ShopService::new(
        store.clone(),
        storage.clone() as DynShopStorage,
        test_policy(),
        ReadStrategy::Mutex,
    );

    let outcome = service.update(&Shop::default()).await;
    assert_eq!(
        outcome,
        Outcome::Error {
            message: "invalid input: shop id must not be empty".into(),
            retryable: false,
        }
    );
    assert_eq!(storage.stats().writes, 0);
}

#[tokio::test]
async fn failed_update_leaves_cache_untouched() {
    let store = SharedStore::new_local();
    let service = ShopService::new(
        store.clone(),
        Arc::new(UnavailableStorage),
        test_policy(),
        ReadStrategy::Mutex,
    );
    let cached = codec::encode(&Shop::new(7, "X")).unwrap();
    store
        .set_ex("cache:shop:7", &cached, Duration::from_secs(60))
        .await
        .unwrap();

    let outcome = service.update(&Shop::new(7, "Y")).await;
    assert!(matches!(outcome, Outcome::Error { retryable: true, .. }));
    assert_eq!(
        store.get("cache:shop:7").await.unwrap().as_deref(),
        Some(cached.as_str())
    );
}

#[tokio::test]
async fn backing_store_failure_is_an_error_not_a_miss() {
    let store = SharedStore::new_local();
    let reader = ShopCacheReader::new(store.clone(), Arc::new(UnavailableStorage), test_policy());

    let err = reader.lookup(7).await.unwrap_err();
    assert!(matches!(err, CacheError::BackingStore(_)));
    assert!(err.is_retryable());

    // Lock released, nothing cached: the next caller tries again.
    assert_eq!(store.get("lock:shop:7").await.unwrap(), None);
    assert_eq!(store.get("cache:shop:7").await.unwrap(), None);
    assert!(reader.lookup(7).await.is_err());
    assert_eq!(reader.stats().rebuild_failures, 2);
}

#[tokio::test]
async fn service_reports_backing_failure_as_error_outcome() {
    let service = ShopService::new(
        SharedStore::new_local(),
        Arc::new(UnavailableStorage),
        test_policy(),
        ReadStrategy::Mutex,
    );
    match service.query_by_id(7).await {
        Outcome::Error { message, retryable } => {
            assert!(message.contains("database is down"));
            assert!(retryable);
        }
        other => panic!("expected error outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_backing_store_times_out_and_releases_lock() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions {
        read_latency: Some(Duration::from_millis(300)),
        ..StorageOptions::default()
    });
    storage.insert(Shop::new(7, "X"));
    let policy = CachePolicy {
        rebuild_timeout: Duration::from_millis(50),
        ..test_policy()
    };
    let reader = reader_with(&store, &storage, policy);

    let err = reader.lookup(7).await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::BackingStore(StorageError::Timeout { .. })
    ));
    assert_eq!(store.get("lock:shop:7").await.unwrap(), None);
    assert_eq!(store.get("cache:shop:7").await.unwrap(), None);
}

#[tokio::test]
async fn lock_wait_deadline_is_enforced() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    storage.insert(Shop::new(7, "X"));
    store
        .set_ex("lock:shop:7", "1", Duration::from_secs(10))
        .await
        .unwrap();
    let policy = CachePolicy {
        lock_wait: Duration::from_millis(200),
        ..test_policy()
    };
    let reader = reader_with(&store, &storage, policy);

    let start = Instant::now();
    let err = reader.lookup(7).await.unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(matches!(err, CacheError::LockContention { .. }));
    assert!(err.is_retryable());
    assert_eq!(storage.stats().reads, 0);
}

#[tokio::test]
async fn lock_attempts_are_capped() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    store
        .set_ex("lock:shop:7", "1", Duration::from_secs(10))
        .await
        .unwrap();
    let policy = CachePolicy {
        max_lock_attempts: 3,
        ..test_policy()
    };
    let reader = reader_with(&store, &storage, policy);

    match reader.lookup(7).await {
        Err(CacheError::LockContention { key, attempts }) => {
            assert_eq!(key, "lock:shop:7");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected lock contention, got {other:?}"),
    }
    assert_eq!(reader.stats().lock_contentions, 3);
}

#[tokio::test]
async fn crashed_lock_holder_is_recovered_by_lock_ttl() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    storage.insert(Shop::new(7, "X"));
    // A holder that died mid-rebuild: its lock is never deleted.
    store
        .set_ex("lock:shop:7", "1", Duration::from_millis(100))
        .await
        .unwrap();
    let reader = reader_with(&store, &storage, test_policy());

    let start = Instant::now();
    let shop = reader.lookup(7).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(80));
    assert_eq!(shop, Some(Shop::new(7, "X")));
    assert_eq!(storage.stats().reads, 1);
}

#[tokio::test]
async fn waiter_picks_up_entry_written_by_lock_holder() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    store
        .set_ex("lock:shop:7", "1", Duration::from_secs(10))
        .await
        .unwrap();
    let reader = reader_with(&store, &storage, test_policy());

    let holder = {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            let raw = codec::encode(&Shop::new(7, "from holder")).unwrap();
            store
                .set_ex("cache:shop:7", &raw, Duration::from_secs(60))
                .await
                .unwrap();
            store.delete("lock:shop:7").await.unwrap();
        })
    };

    let shop = reader.lookup(7).await.unwrap();
    holder.await.unwrap();
    assert_eq!(shop, Some(Shop::new(7, "from holder")));
    assert_eq!(storage.stats().reads, 0);
}

#[tokio::test]
async fn corrupt_entry_is_dropped_and_rebuilt() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    storage.insert(Shop::new(7, "X"));
    store
        .set_ex("cache:shop:7", "{not json", Duration::from_secs(60))
        .await
        .unwrap();
    let reader = reader_with(&store, &storage, test_policy());

    assert_eq!(reader.lookup(7).await.unwrap(), Some(Shop::new(7, "X")));
    let raw = store.get("cache:shop:7").await.unwrap().unwrap();
    assert_eq!(codec::decode(&raw).unwrap().name, "X");
}

#[tokio::test]
async fn negative_entry_expires_after_null_ttl() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    let policy = CachePolicy {
        null_ttl: Duration::from_millis(50),
        ..test_policy()
    };
    let reader = reader_with(&store, &storage, policy);

    assert_eq!(reader.lookup(7).await.unwrap(), None);
    storage.insert(Shop::new(7, "late"));
    // Still inside the negative window.
    assert_eq!(reader.lookup(7).await.unwrap(), None);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(reader.lookup(7).await.unwrap(), Some(Shop::new(7, "late")));
    assert_eq!(storage.stats().reads, 2);
}

#[tokio::test]
async fn positive_entry_expires_after_shop_ttl() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    storage.insert(Shop::new(7, "X"));
    let policy = CachePolicy {
        shop_ttl: Duration::from_millis(50),
        null_ttl: Duration::from_millis(20),
        ..test_policy()
    };
    let reader = reader_with(&store, &storage, policy);

    reader.lookup(7).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(store.get("cache:shop:7").await.unwrap(), None);
    reader.lookup(7).await.unwrap();
    assert_eq!(storage.stats().reads, 2);
}

#[tokio::test]
async fn pass_through_caches_absence() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    let service = ShopService::new(
        store.clone(),
        storage.clone() as DynShopStorage,
        test_policy(),
        ReadStrategy::PassThrough,
    );

    for _ in 0..3 {
        assert!(matches!(
            service.query_by_id(7).await,
            Outcome::NotFound { .. }
        ));
    }
    assert_eq!(storage.stats().reads, 1);
    assert_eq!(store.get("lock:shop:7").await.unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pass_through_is_not_single_flight() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions {
        read_latency: Some(Duration::from_millis(100)),
        ..StorageOptions::default()
    });
    storage.insert(Shop::new(7, "X"));
    let reader = Arc::new(reader_with(&store, &storage, test_policy()));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let reader = Arc::clone(&reader);
            tokio::spawn(async move { reader.lookup_pass_through(7).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Some(Shop::new(7, "X")));
    }

    assert!(storage.stats().reads > 1);
}

#[tokio::test]
async fn service_from_config_uses_configured_prefixes() {
    let store = SharedStore::new_local();
    let storage = memory_storage(StorageOptions::default());
    storage.insert(Shop::new(1, "first"));
    let cfg = shopcache_server::CacheConfig {
        shop_key_prefix: "shop:v2:".into(),
        ..Default::default()
    };
    let service = ShopService::from_config(store.clone(), storage.clone() as DynShopStorage, &cfg);

    assert!(service.query_by_id(1).await.is_ok());
    assert!(store.get("shop:v2:1").await.unwrap().is_some());
    assert_eq!(service.strategy(), ReadStrategy::Mutex);
    assert_eq!(service.stats().misses, 1);
}
