//! Pure projections over [`EntityState`]
//!
//! Plain functions work directly with
//! [`StoreRoot::select`](crate::StoreRoot::select); the factories return
//! closures for parameterized reads.
//!
//! ```ignore
//! let rows = root.select(select_all::<Patient>)?;
//! let one = root.select(select_by_id::<Patient>("p-42"))?;
//! let active = root.select(select_by_status(|p: &Pregnancy| p.status.as_str(), "ACTIVE"))?;
//! ```

use super::{Entity, EntityState, RequestKind};
use crate::page::Pagination;

pub fn select_all<T: Entity>(state: &EntityState<T>) -> Vec<T> {
    state.items.clone()
}

/// Scan the current page for `id`.
pub fn select_by_id<T: Entity>(id: impl Into<String>) -> impl Fn(&EntityState<T>) -> Option<T> {
    let id = id.into();
    move |state| state.items.iter().find(|item| item.id() == id).cloned()
}

pub fn select_selected<T: Entity>(state: &EntityState<T>) -> Option<T> {
    state.selected.clone()
}

pub fn select_selected_id<T: Entity>(state: &EntityState<T>) -> Option<String> {
    state.selected_id.clone()
}

pub fn select_loading<T: Entity>(state: &EntityState<T>) -> bool {
    state.is_loading()
}

pub fn select_loading_kind<T: Entity>(kind: RequestKind) -> impl Fn(&EntityState<T>) -> bool {
    move |state| state.is_loading_kind(kind)
}

pub fn select_error<T: Entity>(state: &EntityState<T>) -> Option<String> {
    state.error.clone()
}

pub fn select_pagination<T: Entity>(state: &EntityState<T>) -> Pagination {
    state.pagination
}

pub fn select_search_term<T: Entity>(state: &EntityState<T>) -> Option<String> {
    state.search_term.clone()
}

pub fn select_has_next_page<T: Entity>(state: &EntityState<T>) -> bool {
    state.pagination.has_next_page()
}

pub fn select_has_previous_page<T: Entity>(state: &EntityState<T>) -> bool {
    state.pagination.has_previous_page()
}

pub fn select_is_empty<T: Entity>(state: &EntityState<T>) -> bool {
    state.items.is_empty() && !state.is_loading()
}

/// Items of the current page matching `predicate`, in page order.
pub fn select_where<T, P>(predicate: P) -> impl Fn(&EntityState<T>) -> Vec<T>
where
    T: Entity,
    P: Fn(&T) -> bool,
{
    move |state| {
        state
            .items
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }
}

/// Items whose status (read through `status_of`) equals `status`.
pub fn select_by_status<T, F>(
    status_of: F,
    status: impl Into<String>,
) -> impl Fn(&EntityState<T>) -> Vec<T>
where
    T: Entity,
    F: Fn(&T) -> &str,
{
    let status = status.into();
    select_where(move |item: &T| status_of(item) == status)
}

/// Items whose date (read through `date_of`) lies in `from..=to`.
///
/// Works with any ordered date representation, including ISO-8601
/// strings. Items without a date are excluded.
pub fn select_by_date_range<T, D, F>(
    date_of: F,
    from: D,
    to: D,
) -> impl Fn(&EntityState<T>) -> Vec<T>
where
    T: Entity,
    D: PartialOrd,
    F: Fn(&T) -> Option<D>,
{
    select_where(move |item: &T| {
        date_of(item)
            .map(|date| date >= from && date <= to)
            .unwrap_or(false)
    })
}
