// Server-side credential cache: rotating refresh token -> short-lived access token.
//
// Process-local by design. A restart drops all sessions; the upstream reissues
// credentials through the normal login/refresh flow.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
struct CredentialEntry {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CredentialEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Diagnostic snapshot of the cache. Key previews are truncated so the
/// snapshot never exposes a usable secret.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub entries: Vec<CacheEntryStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheEntryStats {
    pub key_preview: String,
    pub expires_at: DateTime<Utc>,
    pub ttl_remaining_secs: i64,
}

/// Shared, process-wide store mapping refresh tokens to cached access tokens.
///
/// Cloning is cheap (shared state); construct one instance at startup and
/// inject it into every gateway rather than reaching for a global.
#[derive(Debug, Clone, Default)]
pub struct CredentialCache {
    inner: Arc<RwLock<HashMap<String, CredentialEntry>>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or replace the entry for `refresh_token`, valid for `ttl_secs`.
    /// Empty secrets degrade to a warned no-op, never an error.
    pub async fn store(&self, refresh_token: &str, access_token: &str, ttl_secs: i64) {
        if refresh_token.is_empty() || access_token.is_empty() {
            tracing::warn!("credential cache store rejected: empty refresh or access token");
            return;
        }

        let mut map = self.inner.write().await;
        map.insert(
            refresh_token.to_string(),
            CredentialEntry {
                access_token: access_token.to_string(),
                expires_at: Utc::now() + Duration::seconds(ttl_secs),
            },
        );
        Self::sweep_locked(&mut map);
    }

    /// Return the cached access token for `refresh_token`, or None if no
    /// entry exists or the entry has expired (expired entries are removed
    /// as a side effect).
    ///
    /// On an exact-key miss a bounded recovery pass compares the requested
    /// key against stored keys after trimming whitespace and after
    /// percent-decoding both sides. Cookies occasionally reach us with the
    /// token re-encoded or padded by an intermediary; this shim tolerates
    /// that without reissuing credentials. A recovered entry is re-indexed
    /// under the requested key so subsequent lookups hit directly. The pass
    /// is O(n) and runs only on miss.
    pub async fn lookup(&self, refresh_token: &str) -> Option<String> {
        let mut map = self.inner.write().await;
        Self::sweep_locked(&mut map);

        if let Some(entry) = map.get(refresh_token) {
            return Some(entry.access_token.clone());
        }

        // Recovery match. Snapshot keys first: the map must not be mutated
        // while it is being iterated.
        let requested_trimmed = refresh_token.trim();
        let requested_decoded = percent_decode(refresh_token);
        let matched_key = map
            .keys()
            .find(|stored| {
                let stored = stored.as_str();
                stored.trim() == requested_trimmed || percent_decode(stored) == requested_decoded
            })?
            .clone();

        let entry = map.remove(&matched_key)?;
        let token = entry.access_token.clone();
        map.insert(refresh_token.to_string(), entry);
        tracing::debug!("credential cache recovered a mangled refresh token key");
        Some(token)
    }

    /// Delete the entry for `refresh_token` if present.
    pub async fn remove(&self, refresh_token: &str) {
        let mut map = self.inner.write().await;
        map.remove(refresh_token);
    }

    /// Replace the session's rotating key: the old entry is dropped and the
    /// reissued access token is stored under the new key, atomically with
    /// respect to concurrent cache operations.
    pub async fn rotate(
        &self,
        old_refresh_token: &str,
        new_refresh_token: &str,
        access_token: &str,
        ttl_secs: i64,
    ) {
        let mut map = self.inner.write().await;
        map.remove(old_refresh_token);

        if new_refresh_token.is_empty() || access_token.is_empty() {
            tracing::warn!("credential cache rotate rejected: empty refresh or access token");
        } else {
            map.insert(
                new_refresh_token.to_string(),
                CredentialEntry {
                    access_token: access_token.to_string(),
                    expires_at: Utc::now() + Duration::seconds(ttl_secs),
                },
            );
        }
        Self::sweep_locked(&mut map);
    }

    /// Delete every expired entry. Idempotent; safe to run arbitrarily often.
    pub async fn sweep(&self) -> usize {
        let mut map = self.inner.write().await;
        Self::sweep_locked(&mut map)
    }

    fn sweep_locked(map: &mut HashMap<String, CredentialEntry>) -> usize {
        let now = Utc::now();
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired(now));
        before - map.len()
    }

    /// Snapshot for diagnostics. Sweeps first so `size` is accurate.
    pub async fn stats(&self) -> CacheStats {
        let mut map = self.inner.write().await;
        Self::sweep_locked(&mut map);

        let now = Utc::now();
        let entries = map
            .iter()
            .map(|(key, entry)| CacheEntryStats {
                key_preview: preview_key(key),
                expires_at: entry.expires_at,
                ttl_remaining_secs: (entry.expires_at - now).num_seconds(),
            })
            .collect();

        CacheStats {
            size: map.len(),
            entries,
        }
    }

    /// Start the periodic background sweep (the on-access sweeps keep hot
    /// paths clean; this catches abandoned sessions). The task is aborted
    /// when the returned guard drops, so it never outlives its owner.
    pub fn spawn_sweeper(&self, every: std::time::Duration) -> SweeperGuard {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let removed = cache.sweep().await;
                if removed > 0 {
                    tracing::debug!(removed, "credential cache sweep removed expired entries");
                }
            }
        });
        SweeperGuard { handle }
    }
}

/// Owns the background sweep task; dropping the guard cancels it.
#[derive(Debug)]
pub struct SweeperGuard {
    handle: JoinHandle<()>,
}

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Truncated, non-reversible view of a cache key for diagnostics.
fn preview_key(key: &str) -> String {
    if key.chars().count() <= 8 {
        return "********".to_string();
    }
    let head: String = key.chars().take(6).collect();
    format!("{}...", head)
}

/// Minimal %XX decoder for the lookup recovery shim. Invalid escapes pass
/// through unchanged so a literal '%' in a token cannot break matching.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).copied().and_then(hex_val),
                bytes.get(i + 2).copied().and_then(hex_val),
            ) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_returns_token_before_expiry() {
        let cache = CredentialCache::new();
        cache.store("refresh-1", "access-1", 3600).await;
        assert_eq!(cache.lookup("refresh-1").await.as_deref(), Some("access-1"));
    }

    #[tokio::test]
    async fn lookup_misses_and_removes_expired_entry() {
        let cache = CredentialCache::new();
        cache.store("refresh-1", "access-1", 3600).await;

        // Force expiry without waiting: rewrite the entry with a zero TTL.
        cache.store("refresh-1", "access-1", 0).await;

        assert_eq!(cache.lookup("refresh-1").await, None);
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn store_replaces_existing_entry() {
        let cache = CredentialCache::new();
        cache.store("refresh-1", "access-old", 3600).await;
        cache.store("refresh-1", "access-new", 3600).await;

        assert_eq!(cache.stats().await.size, 1);
        assert_eq!(cache.lookup("refresh-1").await.as_deref(), Some("access-new"));
    }

    #[tokio::test]
    async fn store_rejects_empty_secrets() {
        let cache = CredentialCache::new();
        cache.store("", "access", 3600).await;
        cache.store("refresh", "", 3600).await;
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn rotate_moves_entry_to_new_key() {
        let cache = CredentialCache::new();
        cache.store("old-refresh", "access-old", 3600).await;
        cache.rotate("old-refresh", "new-refresh", "access-new", 3600).await;

        assert_eq!(cache.lookup("old-refresh").await, None);
        assert_eq!(cache.lookup("new-refresh").await.as_deref(), Some("access-new"));
        assert_eq!(cache.stats().await.size, 1);
    }

    #[tokio::test]
    async fn sweep_is_idempotent_with_live_entries() {
        let cache = CredentialCache::new();
        cache.store("refresh-1", "access-1", 3600).await;
        cache.store("refresh-2", "access-2", 3600).await;

        for _ in 0..5 {
            assert_eq!(cache.sweep().await, 0);
        }
        assert_eq!(cache.stats().await.size, 2);
    }

    #[tokio::test]
    async fn lookup_recovers_whitespace_mangled_key() {
        let cache = CredentialCache::new();
        cache.store("refresh-abcdef", "access-1", 3600).await;

        assert_eq!(
            cache.lookup("  refresh-abcdef  ").await.as_deref(),
            Some("access-1")
        );

        // Re-indexed under the requested key; exactly one entry remains.
        let stats = cache.stats().await;
        assert_eq!(stats.size, 1);
        assert_eq!(cache.lookup("  refresh-abcdef  ").await.as_deref(), Some("access-1"));
    }

    #[tokio::test]
    async fn lookup_recovers_percent_encoded_key() {
        let cache = CredentialCache::new();
        cache.store("refresh/with/slashes", "access-1", 3600).await;

        assert_eq!(
            cache.lookup("refresh%2Fwith%2Fslashes").await.as_deref(),
            Some("access-1")
        );
        // Direct hit after re-indexing.
        assert_eq!(
            cache.lookup("refresh%2Fwith%2Fslashes").await.as_deref(),
            Some("access-1")
        );
    }

    #[tokio::test]
    async fn recovery_does_not_match_unrelated_keys() {
        let cache = CredentialCache::new();
        cache.store("refresh-one", "access-1", 3600).await;
        assert_eq!(cache.lookup("refresh-two").await, None);
        assert_eq!(cache.stats().await.size, 1);
    }

    #[tokio::test]
    async fn stats_previews_never_contain_full_secret() {
        let cache = CredentialCache::new();
        let secret = "very-long-refresh-token-secret";
        cache.store(secret, "access-1", 3600).await;

        let stats = cache.stats().await;
        assert_eq!(stats.size, 1);
        let preview = &stats.entries[0].key_preview;
        assert_ne!(preview, secret);
        assert!(!preview.contains(secret));
        assert!(stats.entries[0].ttl_remaining_secs > 0);
    }

    #[tokio::test]
    async fn short_keys_are_fully_masked_in_stats() {
        let cache = CredentialCache::new();
        cache.store("tiny", "access-1", 3600).await;
        let stats = cache.stats().await;
        assert_eq!(stats.entries[0].key_preview, "********");
    }

    #[tokio::test]
    async fn concurrent_stores_do_not_lose_entries() {
        let cache = CredentialCache::new();
        let mut tasks = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache
                    .store(&format!("refresh-{i}"), &format!("access-{i}"), 3600)
                    .await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(cache.stats().await.size, 32);
    }

    #[test]
    fn percent_decode_handles_invalid_escapes() {
        assert_eq!(percent_decode("a%2Fb"), "a/b");
        assert_eq!(percent_decode("a%ZZb"), "a%ZZb");
        assert_eq!(percent_decode("trailing%"), "trailing%");
    }
}
