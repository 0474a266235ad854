//! インメモリのレスポンスキャッシュ

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::RwLock;

use crate::common::{Handler, Invocation};
use crate::error::Error;
use crate::handler::DispatchResult;
use crate::registry::Dependencies;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: DispatchResult,
    expires_at: DateTime<Utc>,
}

/// 有効期限付きのキャッシュ（クローンは同じ中身を共有する）
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 期限内の値を取得（期限切れのエントリはその場で削除）
    pub fn get(&self, key: &str) -> Option<DispatchResult> {
        self.get_at(key, Utc::now())
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<DispatchResult> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.result.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write();
        if entries.get(key).map_or(false, |entry| entry.expires_at <= now) {
            debug!("Evicting expired cache entry {}", key);
            entries.remove(key);
        }
        None
    }

    /// TTLを指定して値を保存
    pub fn set(&self, key: impl Into<String>, result: DispatchResult, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| {
            warn!("Cache TTL {:?} out of range, clamping", ttl);
            chrono::Duration::days(365)
        });
        let now = Utc::now();
        let mut entries = self.entries.write();
        // 書き込みのついでに期限切れを掃除する
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.into(),
            CacheEntry {
                result,
                expires_at: now + ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// 成功した結果をメソッド・パス・クエリごとにキャッシュするハンドラーデコレーター
pub struct Cached<H> {
    inner: H,
    cache: MemoryCache,
    ttl: Duration,
}

impl<H: Handler> Cached<H> {
    pub fn new(inner: H, cache: MemoryCache, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }
}

/// キャッシュキーを作成（`METHOD path?k=v&...`、クエリはキー順）
pub fn cache_key(call: &Invocation) -> String {
    let req = &call.request;
    if req.query_params.is_empty() {
        return format!("{} {}", req.method, req.path);
    }

    let mut params: Vec<(&String, &String)> = req.query_params.iter().collect();
    params.sort();
    let query: Vec<String> = params
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!("{} {}?{}", req.method, req.path, query.join("&"))
}

#[async_trait]
impl<H: Handler> Handler for Cached<H> {
    async fn handle(&self, call: Invocation) -> Result<DispatchResult, Error> {
        let key = cache_key(&call);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Cache hit for {}", key);
            return Ok(hit);
        }

        let result = self.inner.handle(call).await?;
        // 型付きエラーは保存しない
        if !matches!(result, DispatchResult::Error(_)) {
            self.cache.set(key, result.clone(), self.ttl);
        }
        Ok(result)
    }

    fn dependencies(&self) -> Dependencies {
        self.inner.dependencies()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Method, Request};
    use crate::error::HttpError;
    use crate::handler::{handler_fn, HandlerExt};
    use crate::worker::WorkerPool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn call(path: &str) -> Invocation {
        Invocation::new(Request::new(Method::GET, path), WorkerPool::new(1))
    }

    #[test]
    fn test_expired_entries_are_ignored() {
        let cache = MemoryCache::new();
        cache.set("GET /", DispatchResult::Text("hi".into()), Duration::from_secs(60));

        assert_eq!(cache.get("GET /"), Some(DispatchResult::Text("hi".into())));
        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(cache.get_at("GET /", later), None);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_get() {
        let cache = MemoryCache::new();
        cache.set("GET /", DispatchResult::Text("stale".into()), Duration::ZERO);
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.get("GET /"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_sweeps_expired_entries() {
        let cache = MemoryCache::new();
        cache.set("GET /users/1", DispatchResult::Text("a".into()), Duration::ZERO);
        cache.set("GET /users/2", DispatchResult::Text("b".into()), Duration::ZERO);
        cache.set("GET /users/3", DispatchResult::Text("c".into()), Duration::from_secs(60));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("GET /users/3"), Some(DispatchResult::Text("c".into())));
    }

    #[test]
    fn test_cache_key_includes_sorted_query() {
        let plain = call("/search");
        assert_eq!(cache_key(&plain), "GET /search");

        let with_query = Invocation::new(
            Request::from_target(Method::GET, "/search?q=apple&page=2"),
            WorkerPool::new(1),
        );
        assert_eq!(cache_key(&with_query), "GET /search?page=2&q=apple");
    }

    #[tokio::test]
    async fn test_query_variants_are_cached_separately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handler = handler_fn(move |req: Request, _ctx, _services| {
            seen.fetch_add(1, Ordering::SeqCst);
            let q = req.query_params.get("q").cloned().unwrap_or_default();
            async move { Ok::<_, Error>(format!("results for {}", q)) }
        })
        .cached(MemoryCache::new(), Duration::from_secs(60));

        let search = |target: &str| {
            Invocation::new(Request::from_target(Method::GET, target), WorkerPool::new(1))
        };
        let apple = handler.handle(search("/search?q=apple")).await.unwrap();
        let banana = handler.handle(search("/search?q=banana")).await.unwrap();
        let again = handler.handle(search("/search?q=apple")).await.unwrap();

        assert_eq!(apple, DispatchResult::Text("results for apple".into()));
        assert_eq!(banana, DispatchResult::Text("results for banana".into()));
        assert_eq!(again, apple);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_handler_runs_once_per_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let cache = MemoryCache::new();
        let handler = handler_fn(move |req: Request, _ctx, _services| {
            let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, Error>(format!("{} #{}", req.path, n)) }
        })
        .cached(cache.clone(), Duration::from_secs(60));

        let first = handler.handle(call("/report")).await.unwrap();
        let second = handler.handle(call("/report")).await.unwrap();
        let other = handler.handle(call("/other")).await.unwrap();

        assert_eq!(first, DispatchResult::Text("/report #1".into()));
        assert_eq!(second, first);
        assert_eq!(other, DispatchResult::Text("/other #2".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = MemoryCache::new();
        let handler = handler_fn(|_req, _ctx, _services| async {
            Ok::<_, Error>(DispatchResult::Error(HttpError::new(409, "conflict")))
        })
        .cached(cache.clone(), Duration::from_secs(60));

        let result = handler.handle(call("/x")).await.unwrap();
        assert_eq!(result.status(), 409);
        assert!(cache.is_empty());
    }
}
