//! Reference data service for shops and categories
//!
//! Both registries change rarely, so they are cached for `registry_ttl_secs`
//! per session. When a refresh fails the last good copy keeps being served.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use shared::{Category, Shop};

use crate::error::{AppError, AppResult};
use crate::external::StockApiClient;
use crate::services::SessionScope;

/// Sessions kept in the registry cache before the least recently used is dropped
const MAX_CACHED_SESSIONS: usize = 256;

struct Cached<T> {
    value: Arc<T>,
    fetched_at: Instant,
}

impl<T> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

struct SessionRegistry {
    shops: Option<Cached<Vec<Shop>>>,
    categories: Option<Cached<Vec<Category>>>,
    touched_at: Instant,
}

impl SessionRegistry {
    fn new() -> Self {
        Self {
            shops: None,
            categories: None,
            touched_at: Instant::now(),
        }
    }
}

#[derive(Default)]
struct RegistryCacheInner {
    sessions: HashMap<SessionScope, SessionRegistry>,
}

impl RegistryCacheInner {
    fn session_mut(&mut self, scope: SessionScope) -> &mut SessionRegistry {
        if !self.sessions.contains_key(&scope) && self.sessions.len() >= MAX_CACHED_SESSIONS {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|(_, session)| session.touched_at)
                .map(|(scope, _)| *scope);
            if let Some(oldest) = oldest {
                self.sessions.remove(&oldest);
            }
        }

        let session = self.sessions.entry(scope).or_insert_with(SessionRegistry::new);
        session.touched_at = Instant::now();
        session
    }
}

/// In-memory registry cache, partitioned by session
#[derive(Clone)]
pub struct RegistryCache {
    inner: Arc<RwLock<RegistryCacheInner>>,
    ttl: Duration,
}

impl RegistryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryCacheInner::default())),
            ttl,
        }
    }

    /// Cached shops for the session, if still fresh
    pub async fn fresh_shops(&self, scope: &SessionScope) -> Option<Arc<Vec<Shop>>> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(scope)
            .and_then(|session| session.shops.as_ref())
            .filter(|cached| cached.is_fresh(self.ttl))
            .map(|cached| cached.value.clone())
    }

    /// Last cached shops for the session regardless of age
    pub async fn last_shops(&self, scope: &SessionScope) -> Option<Arc<Vec<Shop>>> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(scope)
            .and_then(|session| session.shops.as_ref())
            .map(|cached| cached.value.clone())
    }

    pub async fn store_shops(&self, scope: SessionScope, shops: Vec<Shop>) -> Arc<Vec<Shop>> {
        let cached = Cached::new(shops);
        let value = cached.value.clone();
        self.inner.write().await.session_mut(scope).shops = Some(cached);
        value
    }

    /// Cached categories for the session, if still fresh
    pub async fn fresh_categories(&self, scope: &SessionScope) -> Option<Arc<Vec<Category>>> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(scope)
            .and_then(|session| session.categories.as_ref())
            .filter(|cached| cached.is_fresh(self.ttl))
            .map(|cached| cached.value.clone())
    }

    /// Last cached categories for the session regardless of age
    pub async fn last_categories(&self, scope: &SessionScope) -> Option<Arc<Vec<Category>>> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(scope)
            .and_then(|session| session.categories.as_ref())
            .map(|cached| cached.value.clone())
    }

    pub async fn store_categories(
        &self,
        scope: SessionScope,
        categories: Vec<Category>,
    ) -> Arc<Vec<Category>> {
        let cached = Cached::new(categories);
        let value = cached.value.clone();
        self.inner.write().await.session_mut(scope).categories = Some(cached);
        value
    }
}

/// Registry service
#[derive(Clone)]
pub struct RegistryService {
    client: StockApiClient,
    cache: RegistryCache,
}

impl RegistryService {
    pub fn new(client: StockApiClient, cache: RegistryCache) -> Self {
        Self { client, cache }
    }

    /// Shop registry, from cache or upstream
    pub async fn shops(&self, token: &str) -> AppResult<Arc<Vec<Shop>>> {
        let scope = SessionScope::of(token);
        if let Some(shops) = self.cache.fresh_shops(&scope).await {
            return Ok(shops);
        }

        match self.client.fetch_shops(token).await {
            Ok(shops) => {
                tracing::info!(count = shops.len(), "Shop registry refreshed");
                Ok(self.cache.store_shops(scope, shops).await)
            }
            Err(err) => fall_back(err, self.cache.last_shops(&scope).await, "shops"),
        }
    }

    /// Category registry with packaging sizes, from cache or upstream
    pub async fn categories(&self, token: &str) -> AppResult<Arc<Vec<Category>>> {
        let scope = SessionScope::of(token);
        if let Some(categories) = self.cache.fresh_categories(&scope).await {
            return Ok(categories);
        }

        match self.client.fetch_categories(token).await {
            Ok(categories) => {
                tracing::info!(count = categories.len(), "Category registry refreshed");
                Ok(self.cache.store_categories(scope, categories).await)
            }
            Err(err) => fall_back(err, self.cache.last_categories(&scope).await, "categories"),
        }
    }
}

/// Serve the last good copy after a failed refresh; auth failures always propagate
fn fall_back<T>(err: AppError, last: Option<Arc<T>>, what: &str) -> AppResult<Arc<T>> {
    match (err, last) {
        (err @ (AppError::Unauthorized(_) | AppError::TokenExpired), _) => Err(err),
        (err, Some(last)) => {
            tracing::warn!("Refreshing {} failed, serving cached copy: {}", what, err);
            Ok(last)
        }
        (err, None) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::DataSource;

    fn shop(id: i64) -> Shop {
        Shop {
            id,
            name: format!("Shop {}", id),
            license_code: String::new(),
            address: String::new(),
            contact_no: None,
        }
    }

    #[test]
    fn test_cache_freshness() {
        tokio_test::block_on(async {
            let scope = SessionScope::of("session-a");
            let cache = RegistryCache::new(Duration::from_secs(60));
            assert!(cache.fresh_shops(&scope).await.is_none());

            cache.store_shops(scope, vec![shop(1), shop(6)]).await;
            assert_eq!(cache.fresh_shops(&scope).await.map(|s| s.len()), Some(2));

            let expired = RegistryCache::new(Duration::ZERO);
            expired.store_categories(scope, Vec::new()).await;
            assert!(expired.fresh_categories(&scope).await.is_none());
            assert!(expired.last_categories(&scope).await.is_some());
        });
    }

    #[test]
    fn test_cache_is_partitioned_by_session() {
        tokio_test::block_on(async {
            let owner = SessionScope::of("session-a");
            let other = SessionScope::of("session-b");
            let cache = RegistryCache::new(Duration::from_secs(60));

            cache.store_shops(owner, vec![shop(1)]).await;
            cache.store_categories(owner, Vec::new()).await;

            assert!(cache.fresh_shops(&other).await.is_none());
            assert!(cache.last_shops(&other).await.is_none());
            assert!(cache.last_categories(&other).await.is_none());
        });
    }

    #[test]
    fn test_session_count_is_bounded() {
        tokio_test::block_on(async {
            let cache = RegistryCache::new(Duration::from_secs(60));
            for i in 0..MAX_CACHED_SESSIONS + 10 {
                cache
                    .store_shops(SessionScope::of(&format!("session-{}", i)), vec![shop(1)])
                    .await;
            }

            assert_eq!(cache.inner.read().await.sessions.len(), MAX_CACHED_SESSIONS);
            let newest = SessionScope::of(&format!("session-{}", MAX_CACHED_SESSIONS + 9));
            assert!(cache.fresh_shops(&newest).await.is_some());
        });
    }

    #[test]
    fn test_fall_back_prefers_last_good_copy() {
        let last = Some(Arc::new(vec![shop(1)]));
        let served = fall_back(AppError::upstream(DataSource::Shops, "timeout"), last, "shops");
        assert_eq!(served.unwrap().len(), 1);

        let none: Option<Arc<Vec<Shop>>> = None;
        assert!(fall_back(AppError::upstream(DataSource::Shops, "timeout"), none, "shops").is_err());

        let last = Some(Arc::new(vec![shop(1)]));
        assert!(matches!(
            fall_back(AppError::TokenExpired, last, "shops"),
            Err(AppError::TokenExpired)
        ));
    }
}
