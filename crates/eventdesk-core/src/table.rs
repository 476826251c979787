//! Paginated events table.
//!
//! `EventsTable` owns the current page number, the page data it is showing and
//! the row selection. It never talks to the network itself: callers read pages
//! through the shared `QueryCache` (see `fetch_page` / `prefetch_page`) and hand
//! results back with `apply`. While a new page loads the previous page's rows
//! stay visible, flagged as placeholder.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::api::EventsApi;
use crate::cache::{QueryCache, QueryKey};
use crate::models::{Event, EventsResponse};

// ============================================================================
// Constants
// ============================================================================

/// Events per page
pub const PER_PAGE: u32 = 5;

/// Title, Description, Date, Actions
pub const COLUMNS: usize = 4;

pub const NO_EVENTS_FOUND: &str = "No events found";

// ============================================================================
// Configuration
// ============================================================================

/// How the table decides whether a next page exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pagination {
    /// A full page implies there may be more
    #[default]
    ShortPage,
    /// Use the server's total `count` when it sends one
    TotalCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    pub page_size: u32,
    pub columns: usize,
    pub prefetch: bool,
    pub show_registration: bool,
    pub pagination: Pagination,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: PER_PAGE,
            columns: COLUMNS,
            prefetch: true,
            show_registration: true,
            pagination: Pagination::ShortPage,
        }
    }
}

/// A page number paired with the page size, convertible to `skip`/`limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
}

impl PageWindow {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size,
        }
    }

    pub fn skip(&self) -> u32 {
        (self.page - 1) * self.page_size
    }

    pub fn limit(&self) -> u32 {
        self.page_size
    }

    pub fn next(&self) -> Self {
        Self::new(self.page + 1, self.page_size)
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::events_page(self.page)
    }
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Register,
    Withdraw,
    Edit,
    Delete,
}

impl RowAction {
    pub fn label(&self) -> &'static str {
        match self {
            RowAction::Register => "Register",
            RowAction::Withdraw => "Withdraw Registration",
            RowAction::Edit => "Edit",
            RowAction::Delete => "Delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub event: Event,
    pub is_registered: bool,
    pub actions: Vec<RowAction>,
}

/// What the table body should display
#[derive(Debug, Clone, PartialEq)]
pub enum TableBody {
    /// Nothing to show yet: one skeleton row of `columns` cells
    Loading { columns: usize },
    Rows(Vec<EventRow>),
    /// A single row spanning every column
    Empty { colspan: usize, message: &'static str },
}

// ============================================================================
// Table state
// ============================================================================

#[derive(Debug, Clone)]
pub struct EventsTable {
    config: TableConfig,
    page: u32,
    data: Option<EventsResponse>,
    /// Page the current `data` belongs to
    data_page: u32,
    /// `data` came from an invalidated or expired cache entry
    stale: bool,
    selected: usize,
}

impl Default for EventsTable {
    fn default() -> Self {
        Self::new(TableConfig::default())
    }
}

impl EventsTable {
    pub fn new(config: TableConfig) -> Self {
        Self {
            config,
            page: 1,
            data: None,
            data_page: 1,
            stale: false,
            selected: 0,
        }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.page, self.config.page_size)
    }

    /// No data at all yet
    pub fn is_pending(&self) -> bool {
        self.data.is_none()
    }

    /// Showing another page's rows, or outdated rows of this page, while
    /// the current page loads
    pub fn is_placeholder(&self) -> bool {
        self.data.is_some() && (self.data_page != self.page || self.stale)
    }

    pub fn data(&self) -> Option<&EventsResponse> {
        self.data.as_ref()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        if self.is_placeholder() {
            return false;
        }
        let Some(response) = &self.data else {
            return false;
        };
        if response.invalid {
            return false;
        }

        let full_page = response.data.len() >= self.config.page_size as usize;
        match (self.config.pagination, response.count) {
            (Pagination::TotalCount, Some(count)) => {
                u64::from(self.page) * u64::from(self.config.page_size) < count
            }
            _ => full_page,
        }
    }

    /// Move forward one page. Returns false when there is no next page.
    pub fn next_page(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.go_to(self.page + 1);
        true
    }

    pub fn previous_page(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.go_to(self.page - 1);
        true
    }

    fn go_to(&mut self, page: u32) {
        debug!(from = self.page, to = page, "Changing page");
        self.page = page.max(1);
        self.selected = 0;
    }

    /// Accept a fetched page. Results for a page the table has moved away from
    /// are ignored (they still live in the cache).
    pub fn apply(&mut self, page: u32, response: EventsResponse) -> bool {
        if page != self.page {
            debug!(page, current = self.page, "Ignoring result for stale page");
            return false;
        }
        self.data = Some(response);
        self.data_page = page;
        self.stale = false;
        self.clamp_selection();
        true
    }

    /// Adopt whatever the cache holds for the current page.
    /// Returns true when the entry is missing or stale and a fetch is needed.
    pub async fn sync_from_cache(&mut self, cache: &QueryCache<EventsResponse>) -> bool {
        match cache.get(self.window().key()).await {
            Some(state) => {
                self.apply(self.page, state.data);
                self.stale = !state.is_fresh;
                self.stale
            }
            None => true,
        }
    }

    /// Next page window to warm up, when prefetching applies
    pub fn prefetch_window(&self) -> Option<PageWindow> {
        if self.config.prefetch && self.has_next() {
            Some(self.window().next())
        } else {
            None
        }
    }

    // ===== Rows =====

    fn events(&self) -> &[Event] {
        self.data.as_ref().map(|d| d.data.as_slice()).unwrap_or(&[])
    }

    pub fn actions_for(
        &self,
        event: &Event,
        registered: &HashSet<Uuid>,
        user_id: Option<Uuid>,
    ) -> Vec<RowAction> {
        let mut actions = Vec::new();
        if self.config.show_registration {
            if registered.contains(&event.id) {
                actions.push(RowAction::Withdraw);
            } else {
                actions.push(RowAction::Register);
            }
        }
        if event.is_organized_by(user_id) {
            actions.push(RowAction::Edit);
            actions.push(RowAction::Delete);
        }
        actions
    }

    pub fn rows(&self, registered: &HashSet<Uuid>, user_id: Option<Uuid>) -> TableBody {
        let Some(response) = &self.data else {
            return TableBody::Loading {
                columns: self.config.columns,
            };
        };

        if response.invalid || response.data.is_empty() {
            return TableBody::Empty {
                colspan: self.config.columns,
                message: NO_EVENTS_FOUND,
            };
        }

        TableBody::Rows(
            response
                .data
                .iter()
                .map(|event| EventRow {
                    event: event.clone(),
                    is_registered: registered.contains(&event.id),
                    actions: self.actions_for(event, registered, user_id),
                })
                .collect(),
        )
    }

    // ===== Selection =====

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_event(&self) -> Option<&Event> {
        self.events().get(self.selected)
    }

    pub fn select_next(&mut self) {
        let len = self.events().len();
        if len > 0 && self.selected + 1 < len {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let len = self.events().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}

// ============================================================================
// Fetching through the cache
// ============================================================================

/// Read a page through the cache, fetching it when missing or stale
pub async fn fetch_page(
    cache: &QueryCache<EventsResponse>,
    api: Arc<dyn EventsApi>,
    window: PageWindow,
) -> Result<EventsResponse> {
    cache
        .fetch(window.key(), || async move {
            api.list_events(window.skip(), window.limit()).await
        })
        .await
}

/// Warm the cache for a page without waiting for it
pub fn prefetch_page(
    cache: &QueryCache<EventsResponse>,
    api: Arc<dyn EventsApi>,
    window: PageWindow,
) -> JoinHandle<bool> {
    cache.prefetch(window.key(), move || async move {
        api.list_events(window.skip(), window.limit()).await
    })
}
