use std::sync::{Arc, Mutex};
use std::thread;

use meshport::assets::cache::{AssetCache, AssetHandle, CacheStats};

fn handle(size: usize) -> AssetHandle {
    AssetHandle::new(vec![7; size])
}

#[test_log::test]
fn eviction_follows_insertion_order() -> Result<(), anyhow::Error> {
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = evicted.clone();
    let cache = AssetCache::new(1000).on_evict(move |key, _| {
        if let Ok(mut evicted) = sink.lock() {
            evicted.push(key.to_string());
        }
    });

    for i in 0..20 {
        let size = 100 + (i * 37) % 250;
        cache.put(&format!("asset-{}", i), handle(size), size);

        let stats = cache.stats();
        assert!(stats.total_bytes <= stats.budget_bytes);
        cache.verify()?;
    }

    let evicted = evicted.lock().map(|evicted| evicted.clone()).unwrap_or_default();
    let indices: Vec<usize> = evicted
        .iter()
        .filter_map(|key| key.strip_prefix("asset-")?.parse().ok())
        .collect();
    assert!(!indices.is_empty());
    assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
    // the newest entry always survives
    assert!(cache.contains("asset-19"));
    Ok(())
}

#[test_log::test]
fn clear_resets_the_stats() -> Result<(), anyhow::Error> {
    let cache = AssetCache::new(64);
    cache.put("a", handle(16), 16);
    cache.put("b", handle(16), 16);
    cache.clear();

    assert_eq!(
        cache.stats(),
        CacheStats {
            entries: 0,
            total_bytes: 0,
            budget_bytes: 64
        }
    );
    assert!(cache.get("a").is_none());
    cache.verify()?;
    Ok(())
}

#[test_log::test]
fn single_entry_above_budget_is_kept() -> Result<(), anyhow::Error> {
    let cache = AssetCache::new(64);
    cache.put("a", handle(16), 16);
    cache.put("big", handle(128), 128);

    assert!(!cache.contains("a"));
    assert_eq!(cache.get("big").map(|handle| handle.len()), Some(128));
    assert_eq!(cache.stats().total_bytes, 128);
    cache.verify()?;
    Ok(())
}

#[test_log::test]
fn concurrent_puts_keep_the_books_balanced() -> Result<(), anyhow::Error> {
    let cache = Arc::new(AssetCache::new(4096));

    thread::scope(|scope| {
        for worker in 0..8 {
            let cache = cache.clone();
            scope.spawn(move || {
                for i in 0..200 {
                    let key = format!("asset-{}", (worker * 31 + i) % 50);
                    let size = 16 + (i % 7) * 64;
                    cache.put(&key, handle(size), size);
                    let _ = cache.get(&key);
                    if i % 13 == 0 {
                        cache.remove(&key);
                    }
                }
            });
        }
    });

    let stats = cache.stats();
    assert!(stats.total_bytes <= stats.budget_bytes);
    cache.verify()?;
    Ok(())
}
