//! Reducer shared by every entity store
//!
//! Pure: no I/O, no panics. Intents update bookkeeping and declare an
//! [`ApiRequest`]; outcomes merge into the cache. Failures never blank the
//! cache, the previous page stays visible next to the error.

use super::{ApiOp, ApiRequest, Entity, EntityAction, EntityState, RequestId};
use crate::effect::DispatchResult;
use crate::page::{ListQuery, Page, SearchQuery};

type Outcome<T> = DispatchResult<ApiRequest<T>>;

/// Compute the next state of an entity store.
///
/// Returns whether the state changed and the gateway requests to run.
pub fn reduce<T: Entity>(state: &mut EntityState<T>, action: EntityAction<T>) -> Outcome<T> {
    match action {
        // ===== Intents =====
        EntityAction::List(query) => {
            state.pagination.page_index = query.page_index;
            state.pagination.page_size = query.page_size;
            state.search_term = None;
            state.filters = query.filters.clone();
            state.sort = query.sort.clone();
            state.direction = query.direction;
            issue(state, ApiOp::List(query))
        }

        EntityAction::Search(query) => {
            state.pagination.page_index = query.page_index;
            state.pagination.page_size = query.page_size;
            state.search_term = Some(query.term.clone());
            issue(state, ApiOp::Search(query))
        }

        EntityAction::Fetch(id) => issue(state, ApiOp::Get { id }),
        EntityAction::Create(input) => issue(state, ApiOp::Create(input)),
        EntityAction::Update { id, input } => issue(state, ApiOp::Update { id, input }),
        EntityAction::Remove(id) => issue(state, ApiOp::Remove { id }),

        EntityAction::Reload => {
            let page_size = match state.pagination.page_size {
                0 => state.default_page_size(),
                size => size,
            };
            let page_index = state.pagination.page_index;
            let replay = match state.search_term.clone() {
                Some(term) => EntityAction::Search(SearchQuery::new(term, page_index, page_size)),
                None => EntityAction::List(ListQuery {
                    page_index,
                    page_size,
                    sort: state.sort.clone(),
                    direction: state.direction,
                    filters: state.filters.clone(),
                }),
            };
            reduce(state, replay)
        }

        EntityAction::Select(id) => {
            if state.selected_id == id {
                return DispatchResult::unchanged();
            }
            state.select(id);
            DispatchResult::changed()
        }

        EntityAction::Reset => {
            state.reset();
            DispatchResult::changed()
        }

        // ===== Outcomes =====
        EntityAction::ListDidLoad { request, page }
        | EntityAction::SearchDidLoad { request, page } => {
            settle(state, request, |state| replace_page(state, page))
        }

        EntityAction::FetchDidLoad { request, entity } => settle(state, request, |state| {
            state.error = None;
            let id = entity.id().to_string();
            if let Some(slot) = state.items.iter_mut().find(|item| item.id() == id) {
                *slot = entity.clone();
            }
            state.select_entity(entity);
        }),

        EntityAction::CreateDidSucceed { request, entity } => settle(state, request, |state| {
            state.error = None;
            // Keep the page within its size; the server order of the new
            // record is unknown until the next list.
            if state.items.len() < state.pagination.page_size {
                state.items.push(entity.clone());
            }
            state.pagination.total_elements += 1;
            state.pagination.recompute();
            state.select_entity(entity);
        }),

        EntityAction::UpdateDidSucceed { request, entity } => settle(state, request, |state| {
            state.error = None;
            let id = entity.id();
            for item in state.items.iter_mut().filter(|item| item.id() == id) {
                *item = entity.clone();
            }
            if state.selected_id.as_deref() == Some(id) {
                state.selected = Some(entity.clone());
            }
        }),

        EntityAction::RemoveDidSucceed { request, id } => settle(state, request, |state| {
            state.error = None;
            state.items.retain(|item| item.id() != id);
            state.pagination.total_elements = state.pagination.total_elements.saturating_sub(1);
            state.pagination.recompute();
            state.clear_selection_if(&id);
        }),

        EntityAction::ListDidError { request, error }
        | EntityAction::SearchDidError { request, error } => settle(state, request, |state| {
            state.restore_displayed_page();
            state.error = Some(error);
        }),

        EntityAction::FetchDidError { request, error }
        | EntityAction::CreateDidError { request, error }
        | EntityAction::UpdateDidError { request, error }
        | EntityAction::RemoveDidError { request, error } => {
            settle(state, request, |state| state.error = Some(error))
        }
    }
}

fn issue<T: Entity>(state: &mut EntityState<T>, op: ApiOp<T>) -> Outcome<T> {
    let id = state.begin(op.kind());
    DispatchResult::changed_with(ApiRequest { id, op })
}

fn settle<T, F>(state: &mut EntityState<T>, request: RequestId, apply: F) -> Outcome<T>
where
    T: Entity,
    F: FnOnce(&mut EntityState<T>),
{
    let was_in_flight = state.in_flight.remove(&request);
    if !state.accepts(request) {
        // Superseded or from before a reset: only the loading set moves.
        return DispatchResult::from_changed(was_in_flight);
    }
    state.mark_applied(request);
    apply(state);
    DispatchResult::changed()
}

fn replace_page<T: Entity>(state: &mut EntityState<T>, page: Page<T>) {
    let requested_size = state.pagination.page_size;
    state.error = None;
    state.pagination = page.pagination();
    // Page without a size: keep the one the intent asked for
    if state.pagination.page_size == 0 && requested_size > 0 {
        state.pagination.page_size = requested_size;
        state.pagination.recompute();
    }
    state.displayed_page = (state.pagination.page_index, state.pagination.page_size);
    state.items = page.content;
    if let Some(id) = state.selected_id.as_deref() {
        if let Some(fresh) = state.items.iter().find(|item| item.id() == id) {
            state.selected = Some(fresh.clone());
        }
    }
}
