//! Closing stock service
//!
//! Resolves a dashboard selection into a normalized snapshot and renders the
//! filtered, paginated view. Registries are loaded concurrently; the stock
//! fetch only starts once the category (and so its packaging sizes) is known.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use shared::{
    build_page, category_label, filter, find_category, Banner, DataSource, FetchSequencer,
    FetchTicket, Pagination, ProductStockRow, Shop, ShopSelection, StockKey, StockSnapshot,
    StockView,
};

use crate::config::DashboardConfig;
use crate::error::{AppError, AppResult};
use crate::external::StockApiClient;
use crate::services::registry::RegistryService;
use crate::services::SessionScope;

/// Snapshots kept in memory before the oldest is evicted
const MAX_CACHED_SNAPSHOTS: usize = 256;

/// In-flight fetches tracked before the oldest is forgotten
const MAX_PENDING_FETCHES: usize = 256;

/// Snapshots belong to the session whose token fetched them
type ScopedKey = (SessionScope, StockKey);

struct SnapshotEntry {
    snapshot: Arc<StockSnapshot>,
    stored_at: Instant,
}

#[derive(Default)]
struct SnapshotCacheInner {
    entries: HashMap<ScopedKey, SnapshotEntry>,
    /// Sequence of the newest fetch still in flight per key
    pending: HashMap<ScopedKey, u64>,
    sequencer: FetchSequencer,
}

/// Last good snapshot per session and (shop, category, date).
///
/// Fetches are sequenced per key: only the most recently started fetch may
/// replace the cached snapshot, so a slow response cannot overwrite a newer one.
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Arc<RwLock<SnapshotCacheInner>>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SnapshotCacheInner::default())),
            ttl,
        }
    }

    pub async fn begin(&self, scope: SessionScope, key: &StockKey) -> FetchTicket {
        let mut inner = self.inner.write().await;
        let seq = inner.sequencer.issue();
        inner.pending.insert((scope, key.clone()), seq);

        if inner.pending.len() > MAX_PENDING_FETCHES {
            let oldest = inner
                .pending
                .iter()
                .min_by_key(|(_, seq)| **seq)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                inner.pending.remove(&oldest);
            }
        }

        FetchTicket {
            key: key.clone(),
            seq,
        }
    }

    /// Store a fetched snapshot. Returns `false` if a newer fetch for the same
    /// key has started since `ticket` was issued.
    pub async fn commit(
        &self,
        scope: SessionScope,
        ticket: &FetchTicket,
        snapshot: Arc<StockSnapshot>,
    ) -> bool {
        let mut inner = self.inner.write().await;
        let scoped = (scope, ticket.key.clone());
        if inner.pending.get(&scoped) != Some(&ticket.seq) {
            return false;
        }
        inner.pending.remove(&scoped);

        inner.entries.insert(
            scoped,
            SnapshotEntry {
                snapshot,
                stored_at: Instant::now(),
            },
        );

        if inner.entries.len() > MAX_CACHED_SNAPSHOTS {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
            }
        }
        true
    }

    /// Forget a fetch that failed, unless a newer one has taken its place
    pub async fn abandon(&self, scope: SessionScope, ticket: &FetchTicket) {
        let mut inner = self.inner.write().await;
        let scoped = (scope, ticket.key.clone());
        if inner.pending.get(&scoped) == Some(&ticket.seq) {
            inner.pending.remove(&scoped);
        }
    }

    /// Cached snapshot younger than the TTL
    pub async fn fresh(&self, scope: SessionScope, key: &StockKey) -> Option<Arc<StockSnapshot>> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(&(scope, key.clone()))
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.snapshot.clone())
    }

    /// Last good snapshot regardless of age
    pub async fn last(&self, scope: SessionScope, key: &StockKey) -> Option<Arc<StockSnapshot>> {
        let inner = self.inner.read().await;
        inner
            .entries
            .get(&(scope, key.clone()))
            .map(|entry| entry.snapshot.clone())
    }
}

/// A stock view request after validation
#[derive(Debug, Clone)]
pub struct StockRequest {
    pub shop: Option<ShopSelection>,
    pub category_id: Option<String>,
    pub date: NaiveDate,
    pub query: String,
    pub pagination: Pagination,
}

/// Selection resolved against the registries and the stock source
pub struct ResolvedStock {
    pub shop_label: String,
    pub category_label: String,
    pub snapshot: Option<Arc<StockSnapshot>>,
    pub stale: bool,
    pub banners: Vec<Banner>,
}

impl ResolvedStock {
    /// Filtered rows of the snapshot, in snapshot order
    pub fn filtered_rows<'a>(&'a self, query: &str) -> Vec<&'a ProductStockRow> {
        match &self.snapshot {
            Some(snapshot) => filter(&snapshot.rows, query),
            None => Vec::new(),
        }
    }

    pub fn sizes(&self) -> &[shared::PackagingSize] {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.sizes.as_slice())
            .unwrap_or(&[])
    }
}

/// Stock service
#[derive(Clone)]
pub struct StockService {
    client: StockApiClient,
    registry: RegistryService,
    snapshots: SnapshotCache,
    settings: DashboardConfig,
}

impl StockService {
    pub fn new(
        client: StockApiClient,
        registry: RegistryService,
        snapshots: SnapshotCache,
        settings: DashboardConfig,
    ) -> Self {
        Self {
            client,
            registry,
            snapshots,
            settings,
        }
    }

    /// Build the table view for a selection, query and page
    pub async fn load_view(&self, token: &str, request: &StockRequest) -> AppResult<StockView> {
        let resolved = self.resolve(token, request).await?;
        let (sizes, rows) = match &resolved.snapshot {
            Some(snapshot) => (snapshot.sizes.as_slice(), snapshot.rows.as_slice()),
            None => (&[][..], &[][..]),
        };
        let page = build_page(
            rows,
            sizes,
            &request.query,
            request.pagination,
            self.settings.low_stock_threshold,
        );

        Ok(StockView {
            shop_label: resolved.shop_label.clone(),
            category_label: resolved.category_label.clone(),
            date: request.date,
            query: request.query.clone(),
            sizes: sizes.to_vec(),
            rows: page.rows,
            totals: page.totals,
            pagination: page.pagination,
            summary: page.summary,
            banners: resolved.banners.clone(),
            stale: resolved.stale,
        })
    }

    /// Resolve labels and the snapshot for a selection.
    ///
    /// An incomplete selection resolves to no snapshot. A failed shop fetch
    /// only degrades the shop label; a failed category fetch blocks the view.
    pub async fn resolve(&self, token: &str, request: &StockRequest) -> AppResult<ResolvedStock> {
        let (shops, categories) =
            tokio::join!(self.registry.shops(token), self.registry.categories(token));

        let mut banners = Vec::new();
        let shops: Arc<Vec<Shop>> = match shops {
            Ok(shops) => shops,
            Err(err @ (AppError::Unauthorized(_) | AppError::TokenExpired)) => return Err(err),
            Err(err) => {
                tracing::warn!("Shop registry unavailable: {}", err);
                banners.push(Banner::new(
                    DataSource::Shops,
                    "Could not load shops. Shop names may be missing.",
                ));
                Arc::new(Vec::new())
            }
        };

        let shop_label = request
            .shop
            .map(|shop| shop.label(&shops))
            .unwrap_or_default();

        let key = match (request.shop, &request.category_id) {
            (Some(shop), Some(category_id)) => StockKey {
                shop,
                category_id: category_id.clone(),
                date: request.date,
            },
            _ => {
                let category_label = match (&request.category_id, &categories) {
                    (Some(id), Ok(categories)) => category_label(categories, id),
                    _ => String::new(),
                };
                return Ok(ResolvedStock {
                    shop_label,
                    category_label,
                    snapshot: None,
                    stale: false,
                    banners,
                });
            }
        };

        let categories = match categories {
            Ok(categories) => categories,
            Err(err @ (AppError::Unauthorized(_) | AppError::TokenExpired)) => return Err(err),
            Err(err) => return Err(AppError::CategoryUnavailable(err.to_string())),
        };
        let category = find_category(&categories, &key.category_id)
            .ok_or_else(|| AppError::NotFound(format!("Category {}", key.category_id)))?;

        let scope = SessionScope::of(token);
        let (snapshot, stale) = match self.snapshots.fresh(scope, &key).await {
            Some(snapshot) => (snapshot, false),
            None => match self.fetch_snapshot(token, &key, category).await {
                Ok(snapshot) => (snapshot, false),
                Err(err @ (AppError::Unauthorized(_) | AppError::TokenExpired)) => return Err(err),
                Err(err) => match self.snapshots.last(scope, &key).await {
                    Some(previous) => {
                        tracing::warn!(%key, "Stock refresh failed, serving previous snapshot: {}", err);
                        banners.push(Banner::new(
                            DataSource::Stock,
                            format!(
                                "Could not refresh stock. Showing data loaded at {}.",
                                previous.fetched_at.format("%H:%M:%S UTC")
                            ),
                        ));
                        (previous, true)
                    }
                    None => return Err(err),
                },
            },
        };

        Ok(ResolvedStock {
            shop_label,
            category_label: category.name.clone(),
            snapshot: Some(snapshot),
            stale,
            banners,
        })
    }

    async fn fetch_snapshot(
        &self,
        token: &str,
        key: &StockKey,
        category: &shared::Category,
    ) -> AppResult<Arc<StockSnapshot>> {
        let scope = SessionScope::of(token);
        let ticket = self.snapshots.begin(scope, key).await;
        let raw_rows = match self.client.fetch_closing_stock(token, key).await {
            Ok(raw_rows) => raw_rows,
            Err(err) => {
                self.snapshots.abandon(scope, &ticket).await;
                return Err(err);
            }
        };
        let snapshot = Arc::new(StockSnapshot::build(key.clone(), category, &raw_rows, Utc::now()));

        if self.snapshots.commit(scope, &ticket, snapshot.clone()).await {
            tracing::info!(%key, rows = snapshot.len(), "Stock snapshot refreshed");
        } else {
            tracing::debug!(%key, "Newer fetch in flight, snapshot not cached");
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RegistryCache;
    use shared::{Category, PackagingSize, RawStockRow};

    const OWNER_TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJlbXBsb3llZV9pZCI6MTR9.c2lnbmVk";
    const FORGED_TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJlbXBsb3llZV9pZCI6OTk5fQ.Zm9yZ2Vk";

    fn key(date: &str) -> StockKey {
        StockKey {
            shop: ShopSelection::All,
            category_id: "1".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        }
    }

    fn whisky() -> Category {
        Category {
            id: "1".to_string(),
            name: "Whisky".to_string(),
            sizes: vec![PackagingSize {
                id: 101,
                label: "750ml".to_string(),
                title: "Full".to_string(),
                category_id: 1,
            }],
        }
    }

    fn snapshot(key: &StockKey) -> Arc<StockSnapshot> {
        let raw_rows: Vec<RawStockRow> = vec![serde_json::from_value(serde_json::json!({
            "product_id": 1,
            "product_name": "Royal Stag",
            "101": 42
        }))
        .unwrap()];
        Arc::new(StockSnapshot::build(key.clone(), &whisky(), &raw_rows, Utc::now()))
    }

    fn owner() -> SessionScope {
        SessionScope::of(OWNER_TOKEN)
    }

    /// Service whose upstream refuses every connection
    fn offline_service(registry: RegistryCache, snapshots: SnapshotCache) -> StockService {
        let client = StockApiClient::new(
            "http://127.0.0.1:1".to_string(),
            Duration::from_secs(1),
            shared::DEFAULT_ALL_SHOPS_ID,
        )
        .unwrap();
        StockService::new(
            client.clone(),
            RegistryService::new(client, registry),
            snapshots,
            DashboardConfig::default(),
        )
    }

    fn request(date: &str) -> StockRequest {
        StockRequest {
            shop: Some(ShopSelection::All),
            category_id: Some("1".to_string()),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            query: String::new(),
            pagination: Pagination {
                page: 1,
                per_page: 25,
            },
        }
    }

    #[tokio::test]
    async fn test_superseded_commit_is_discarded() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let key = key("2026-10-19");

        let slow = cache.begin(owner(), &key).await;
        let fast = cache.begin(owner(), &key).await;

        let newer = snapshot(&key);
        assert!(cache.commit(owner(), &fast, newer.clone()).await);
        assert!(!cache.commit(owner(), &slow, snapshot(&key)).await);

        let cached = cache.fresh(owner(), &key).await.unwrap();
        assert!(Arc::ptr_eq(&cached, &newer));
    }

    #[tokio::test]
    async fn test_keys_are_sequenced_independently() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let monday = key("2026-10-19");
        let tuesday = key("2026-10-20");

        let first = cache.begin(owner(), &monday).await;
        let second = cache.begin(owner(), &tuesday).await;

        assert!(cache.commit(owner(), &first, snapshot(&monday)).await);
        assert!(cache.commit(owner(), &second, snapshot(&tuesday)).await);
        assert!(cache.last(owner(), &monday).await.is_some());
        assert!(cache.last(owner(), &tuesday).await.is_some());
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_still_available_as_fallback() {
        let cache = SnapshotCache::new(Duration::ZERO);
        let key = key("2026-10-19");
        let ticket = cache.begin(owner(), &key).await;
        cache.commit(owner(), &ticket, snapshot(&key)).await;

        assert!(cache.fresh(owner(), &key).await.is_none());
        assert!(cache.last(owner(), &key).await.is_some());
    }

    #[tokio::test]
    async fn test_snapshots_are_not_shared_between_sessions() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let key = key("2026-10-19");
        let ticket = cache.begin(owner(), &key).await;
        assert!(cache.commit(owner(), &ticket, snapshot(&key)).await);

        let other = SessionScope::of(FORGED_TOKEN);
        assert!(cache.fresh(other, &key).await.is_none());
        assert!(cache.last(other, &key).await.is_none());
    }

    #[tokio::test]
    async fn test_pending_fetches_stay_bounded() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();

        for day in 0..(MAX_PENDING_FETCHES as i64 * 4) {
            let key = StockKey {
                shop: ShopSelection::Specific(day),
                category_id: "1".to_string(),
                date: start + chrono::Duration::days(day),
            };
            cache.begin(owner(), &key).await;
        }

        let inner = cache.inner.read().await;
        assert!(inner.pending.len() <= MAX_PENDING_FETCHES);
        assert!(inner.entries.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_fetch_is_forgotten() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let key = key("2026-10-19");

        let failed = cache.begin(owner(), &key).await;
        cache.abandon(owner(), &failed).await;
        assert!(cache.inner.read().await.pending.is_empty());

        let older = cache.begin(owner(), &key).await;
        let newer = cache.begin(owner(), &key).await;
        cache.abandon(owner(), &older).await;
        assert!(cache.commit(owner(), &newer, snapshot(&key)).await);
        assert!(cache.inner.read().await.pending.is_empty());
    }

    #[tokio::test]
    async fn test_failed_upstream_fetch_leaves_nothing_pending() {
        let registry = RegistryCache::new(Duration::from_secs(60));
        registry.store_categories(owner(), vec![whisky()]).await;
        let snapshots = SnapshotCache::new(Duration::from_secs(60));
        let service = offline_service(registry, snapshots.clone());

        assert!(service.load_view(OWNER_TOKEN, &request("2026-10-19")).await.is_err());
        assert!(snapshots.inner.read().await.pending.is_empty());
    }

    #[tokio::test]
    async fn test_cached_stock_is_served_only_to_its_session() {
        let registry = RegistryCache::new(Duration::from_secs(60));
        registry.store_categories(owner(), vec![whisky()]).await;
        registry.store_shops(owner(), Vec::new()).await;

        let snapshots = SnapshotCache::new(Duration::from_secs(60));
        let key = key("2026-10-19");
        let ticket = snapshots.begin(owner(), &key).await;
        assert!(snapshots.commit(owner(), &ticket, snapshot(&key)).await);

        let service = offline_service(registry.clone(), snapshots);

        let view = service.load_view(OWNER_TOKEN, &request("2026-10-19")).await.unwrap();
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.totals.get(&101), Some(&42));

        // Upstream is unreachable, so an unknown token gets nothing
        assert!(service.load_view(FORGED_TOKEN, &request("2026-10-19")).await.is_err());

        // Even with its own registries cached, it never sees another session's stock
        registry.store_categories(SessionScope::of(FORGED_TOKEN), vec![whisky()]).await;
        assert!(matches!(
            service.load_view(FORGED_TOKEN, &request("2026-10-19")).await,
            Err(AppError::Upstream { .. })
        ));
    }
}
