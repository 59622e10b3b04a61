//! Cached collection plus request bookkeeping for one entity type

use std::collections::{BTreeMap, BTreeSet};

use super::{Entity, RequestId, RequestKind};
use crate::page::{Pagination, SortDirection};

/// Page size used when a store is created without one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Client-side mirror of one paginated server collection.
///
/// Only the reducer mutates it. `selected` may reference an entity that is
/// not part of `items` (for instance one just created on another page).
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState<T: Entity> {
    /// Current page, in server order.
    pub items: Vec<T>,
    pub selected_id: Option<String>,
    pub selected: Option<T>,
    pub pagination: Pagination,
    /// Requests started but not yet settled.
    pub in_flight: BTreeSet<RequestId>,
    /// Last failure message, cleared by the next intent.
    pub error: Option<String>,
    /// Set by `Search`, cleared by `List`; decides what `Reload` replays.
    pub search_term: Option<String>,
    pub filters: BTreeMap<String, String>,
    pub sort: Option<String>,
    pub direction: Option<SortDirection>,
    /// Highest sequence applied per ordering key.
    pub last_applied: BTreeMap<RequestKind, u64>,
    /// Last sequence handed out. Survives `Reset`.
    pub next_seq: u64,
    /// Outcomes at or below this sequence predate the last `Reset`.
    pub reset_watermark: u64,
    /// `(page_index, page_size)` of the page actually held in `items`.
    pub displayed_page: (usize, usize),
    default_page_size: usize,
}

impl<T: Entity> Default for EntityState<T> {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl<T: Entity> EntityState<T> {
    /// Empty state whose first `Reload` loads pages of `page_size`.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            selected_id: None,
            selected: None,
            pagination: Pagination::with_page_size(page_size),
            in_flight: BTreeSet::new(),
            error: None,
            search_term: None,
            filters: BTreeMap::new(),
            sort: None,
            direction: None,
            last_applied: BTreeMap::new(),
            next_seq: 0,
            reset_watermark: 0,
            displayed_page: (0, page_size),
            default_page_size: page_size,
        }
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_loading_kind(&self, kind: RequestKind) -> bool {
        self.in_flight.iter().any(|request| request.kind == kind)
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// Allocate the id of a new request and mark it in flight.
    pub(crate) fn begin(&mut self, kind: RequestKind) -> RequestId {
        self.next_seq += 1;
        let request = RequestId::new(kind, self.next_seq);
        self.in_flight.insert(request);
        self.error = None;
        request
    }

    /// Whether an outcome for `request` may still touch the cache.
    pub fn accepts(&self, request: RequestId) -> bool {
        if request.seq <= self.reset_watermark {
            return false;
        }
        match request.kind.ordering_key() {
            Some(key) => request.seq > self.last_applied.get(&key).copied().unwrap_or(0),
            None => true,
        }
    }

    pub(crate) fn mark_applied(&mut self, request: RequestId) {
        if let Some(key) = request.kind.ordering_key() {
            self.last_applied.insert(key, request.seq);
        }
    }

    /// Undo the optimistic page bookkeeping of a failed list or search.
    pub(crate) fn restore_displayed_page(&mut self) {
        let (page_index, page_size) = self.displayed_page;
        self.pagination.page_index = page_index;
        self.pagination.page_size = page_size;
    }

    /// Point the selection at `id`, resolving it against the current page.
    pub(crate) fn select(&mut self, id: Option<String>) {
        self.selected = id
            .as_deref()
            .and_then(|id| self.items.iter().find(|item| item.id() == id))
            .cloned();
        self.selected_id = id;
    }

    pub(crate) fn select_entity(&mut self, entity: T) {
        self.selected_id = Some(entity.id().to_string());
        self.selected = Some(entity);
    }

    pub(crate) fn clear_selection_if(&mut self, id: &str) {
        if self.selected_id.as_deref() == Some(id) {
            self.selected_id = None;
            self.selected = None;
        }
    }

    /// Back to the initial state, keeping the sequence counter monotonic.
    pub(crate) fn reset(&mut self) {
        let next_seq = self.next_seq;
        *self = Self::with_page_size(self.default_page_size);
        self.next_seq = next_seq;
        self.reset_watermark = next_seq;
    }
}
