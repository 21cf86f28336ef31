//! Dashboard view state
//!
//! Owns the user's selection (shop, category, date), search query and paging
//! position together with the latest stock snapshot. All derived data is
//! recomputed from the snapshot on demand; nothing is mutated in place.
//!
//! Stock fetches are sequenced: every fetch gets a [`FetchTicket`] and only the
//! most recently issued ticket may apply its result. A response for a
//! selection the user has already moved away from is dropped.

use chrono::NaiveDate;

use crate::models::{
    category_label, find_category, Category, Shop, ShopSelection, StockKey, StockSnapshot,
};
use crate::pipeline::{build_page, LOW_STOCK_THRESHOLD};
use crate::types::{Banner, DataSource, Pagination, StockView, PAGE_SIZE_OPTIONS};

/// Hands out monotonically increasing fetch sequence numbers
#[derive(Debug, Clone, Default)]
pub struct FetchSequencer {
    issued: u64,
}

impl FetchSequencer {
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub fn is_latest(&self, seq: u64) -> bool {
        seq == self.issued
    }
}

/// Proof that a fetch was started for a particular key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub key: StockKey,
    pub seq: u64,
}

/// Current shop/category/date choice; shop and category may be unset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub shop: Option<ShopSelection>,
    pub category_id: Option<String>,
    pub date: NaiveDate,
}

impl Selection {
    pub fn key(&self) -> Option<StockKey> {
        Some(StockKey {
            shop: self.shop?,
            category_id: self.category_id.clone()?,
            date: self.date,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DashboardState {
    selection: Selection,
    query: String,
    page: u32,
    page_size: u32,
    low_stock_threshold: u64,
    shops: Vec<Shop>,
    categories: Vec<Category>,
    snapshot: Option<StockSnapshot>,
    stale: bool,
    sequencer: FetchSequencer,
    banners: Vec<Banner>,
}

impl DashboardState {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            selection: Selection {
                shop: None,
                category_id: None,
                date,
            },
            query: String::new(),
            page: 1,
            page_size: Pagination::default().per_page,
            low_stock_threshold: LOW_STOCK_THRESHOLD,
            shops: Vec::new(),
            categories: Vec::new(),
            snapshot: None,
            stale: false,
            sequencer: FetchSequencer::default(),
            banners: Vec::new(),
        }
    }

    pub fn with_low_stock_threshold(mut self, threshold: u64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn banners(&self) -> &[Banner] {
        &self.banners
    }

    pub fn snapshot(&self) -> Option<&StockSnapshot> {
        self.snapshot.as_ref()
    }

    // ------------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------------

    pub fn set_shops(&mut self, shops: Vec<Shop>) {
        self.shops = shops;
        self.clear_banner(DataSource::Shops);
    }

    pub fn set_categories(&mut self, categories: Vec<Category>) {
        self.categories = categories;
        self.clear_banner(DataSource::Categories);
    }

    pub fn shops(&self) -> &[Shop] {
        &self.shops
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// The selected category, once the registry has it
    pub fn active_category(&self) -> Option<&Category> {
        let id = self.selection.category_id.as_deref()?;
        find_category(&self.categories, id)
    }

    // ------------------------------------------------------------------------
    // Selection changes (each one returns to the first page)
    // ------------------------------------------------------------------------

    pub fn select_shop(&mut self, shop: ShopSelection) {
        self.selection.shop = Some(shop);
        self.page = 1;
    }

    pub fn select_category(&mut self, category_id: impl Into<String>) {
        self.selection.category_id = Some(category_id.into());
        self.page = 1;
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.selection.date = date;
        self.page = 1;
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    /// Move to a page; out-of-range pages render empty
    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn page_size_options(&self) -> &'static [u32] {
        &PAGE_SIZE_OPTIONS
    }

    // ------------------------------------------------------------------------
    // Fetch lifecycle
    // ------------------------------------------------------------------------

    /// Start a stock fetch for the current selection.
    ///
    /// Returns `None` while the selection is incomplete or the category
    /// registry has not resolved the selected category, since rows cannot be
    /// normalized without its packaging sizes.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        let key = self.selection.key()?;
        self.active_category()?;

        Some(FetchTicket {
            key,
            seq: self.sequencer.issue(),
        })
    }

    /// Apply a completed fetch. Returns `false` if the ticket was superseded
    /// by a newer fetch or does not match the snapshot, in which case the
    /// current snapshot is left untouched.
    pub fn apply_snapshot(&mut self, ticket: &FetchTicket, snapshot: StockSnapshot) -> bool {
        if !self.sequencer.is_latest(ticket.seq) || snapshot.key != ticket.key {
            return false;
        }

        self.snapshot = Some(snapshot);
        self.stale = false;
        self.clear_banner(DataSource::Stock);
        true
    }

    /// Record a failed fetch. The prior snapshot stays in place.
    /// Returns `false` for a superseded ticket, which is ignored.
    pub fn fail_fetch(&mut self, ticket: &FetchTicket, message: impl Into<String>) -> bool {
        if !self.sequencer.is_latest(ticket.seq) {
            return false;
        }

        self.stale = self.snapshot.is_some();
        self.push_banner(Banner::new(DataSource::Stock, message));
        true
    }

    /// Record a registry or export failure
    pub fn report_error(&mut self, source: DataSource, message: impl Into<String>) {
        self.push_banner(Banner::new(source, message));
    }

    pub fn dismiss_banners(&mut self) {
        self.banners.clear();
    }

    fn push_banner(&mut self, banner: Banner) {
        self.clear_banner(banner.source);
        self.banners.push(banner);
    }

    fn clear_banner(&mut self, source: DataSource) {
        self.banners.retain(|banner| banner.source != source);
    }

    // ------------------------------------------------------------------------
    // Derived view
    // ------------------------------------------------------------------------

    fn current_snapshot(&self) -> Option<&StockSnapshot> {
        let key = self.selection.key()?;
        self.snapshot.as_ref().filter(|snapshot| snapshot.key == key)
    }

    pub fn shop_label(&self) -> String {
        self.selection
            .shop
            .map(|shop| shop.label(&self.shops))
            .unwrap_or_default()
    }

    pub fn category_label(&self) -> String {
        self.selection
            .category_id
            .as_deref()
            .map(|id| category_label(&self.categories, id))
            .unwrap_or_default()
    }

    /// Filter, total and paginate the snapshot for the current selection.
    /// An incomplete selection or a missing snapshot yields an empty grid.
    pub fn view(&self) -> StockView {
        let pagination = Pagination {
            page: self.page,
            per_page: self.page_size,
        };
        let (sizes, rows) = match self.current_snapshot() {
            Some(snapshot) => (snapshot.sizes.as_slice(), snapshot.rows.as_slice()),
            None => (&[][..], &[][..]),
        };
        let page = build_page(rows, sizes, &self.query, pagination, self.low_stock_threshold);

        StockView {
            shop_label: self.shop_label(),
            category_label: self.category_label(),
            date: self.selection.date,
            query: self.query.clone(),
            sizes: sizes.to_vec(),
            rows: page.rows,
            totals: page.totals,
            pagination: page.pagination,
            summary: page.summary,
            banners: self.banners.clone(),
            stale: self.stale && self.current_snapshot().is_some(),
        }
    }

    /// The filtered rows (all pages) of the current snapshot
    pub fn filtered_rows(&self) -> Vec<&crate::models::ProductStockRow> {
        match self.current_snapshot() {
            Some(snapshot) => crate::pipeline::filter(&snapshot.rows, &self.query),
            None => Vec::new(),
        }
    }
}
