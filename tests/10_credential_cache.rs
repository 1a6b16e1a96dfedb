use anyhow::Result;
use std::time::Duration;

use schema_portal::cache::CredentialCache;

#[tokio::test]
async fn session_lifecycle_store_rotate_remove() -> Result<()> {
    let cache = CredentialCache::new();

    cache.store("refresh-a", "access-a", 3600).await;
    assert_eq!(cache.lookup("refresh-a").await.as_deref(), Some("access-a"));

    cache.rotate("refresh-a", "refresh-b", "access-b", 3600).await;
    assert_eq!(cache.lookup("refresh-a").await, None);
    assert_eq!(cache.lookup("refresh-b").await.as_deref(), Some("access-b"));

    cache.remove("refresh-b").await;
    assert_eq!(cache.lookup("refresh-b").await, None);
    assert_eq!(cache.stats().await.size, 0);

    Ok(())
}

#[tokio::test]
async fn expired_sessions_vanish_on_access() -> Result<()> {
    let cache = CredentialCache::new();

    cache.store("keeper", "access-live", 3600).await;
    cache.store("goner", "access-dead", 0).await;

    assert_eq!(cache.lookup("goner").await, None);
    assert_eq!(cache.lookup("keeper").await.as_deref(), Some("access-live"));
    assert_eq!(cache.stats().await.size, 1);

    Ok(())
}

#[tokio::test]
async fn cache_is_shared_across_concurrent_tasks() -> Result<()> {
    let cache = CredentialCache::new();
    cache.store("shared-refresh", "shared-access", 3600).await;

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            cache.lookup("shared-refresh").await
        }));
    }
    for task in tasks {
        assert_eq!(task.await?.as_deref(), Some("shared-access"));
    }

    Ok(())
}

#[tokio::test]
async fn background_sweeper_runs_and_stops_with_its_guard() -> Result<()> {
    let cache = CredentialCache::new();
    cache.store("refresh-a", "access-a", 3600).await;

    {
        let _guard = cache.spawn_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Live entries survive repeated sweeps.
        assert_eq!(cache.stats().await.size, 1);
    }

    // Guard dropped; cache keeps working after the task is aborted.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.lookup("refresh-a").await.as_deref(), Some("access-a"));

    Ok(())
}
