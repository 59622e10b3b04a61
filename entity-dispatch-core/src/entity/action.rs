//! Intent and outcome messages for one entity type
//!
//! Naming follows the two-phase pattern: an intent (`List`, `Create`, ...)
//! starts a request, and a `*Did*` outcome carrying the same [`RequestId`]
//! reports how it settled.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Entity;
use crate::action::{Action, ActionSummary};
use crate::page::{ListQuery, Page, SearchQuery};

/// The kind of gateway request an intent starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    List,
    Search,
    Get,
    Create,
    Update,
    Remove,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::List => "list",
            RequestKind::Search => "search",
            RequestKind::Get => "get",
            RequestKind::Create => "create",
            RequestKind::Update => "update",
            RequestKind::Remove => "remove",
        }
    }

    /// List and search write the same slot (`items` + `pagination`), so
    /// they share one ordering key. Mutations are one-shot and unordered.
    pub fn ordering_key(self) -> Option<RequestKind> {
        match self {
            RequestKind::List | RequestKind::Search => Some(RequestKind::List),
            _ => None,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one in-flight request: its kind plus a per-store sequence
/// number that only ever grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId {
    pub kind: RequestKind,
    pub seq: u64,
}

impl RequestId {
    pub fn new(kind: RequestKind, seq: u64) -> Self {
        Self { kind, seq }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.seq)
    }
}

/// Gateway operation declared by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOp<T: Entity> {
    List(ListQuery),
    Search(SearchQuery),
    Get { id: String },
    Create(T::Input),
    Update { id: String, input: T::Input },
    Remove { id: String },
}

impl<T: Entity> ApiOp<T> {
    pub fn kind(&self) -> RequestKind {
        match self {
            ApiOp::List(_) => RequestKind::List,
            ApiOp::Search(_) => RequestKind::Search,
            ApiOp::Get { .. } => RequestKind::Get,
            ApiOp::Create(_) => RequestKind::Create,
            ApiOp::Update { .. } => RequestKind::Update,
            ApiOp::Remove { .. } => RequestKind::Remove,
        }
    }
}

/// Effect emitted by the reducer for every accepted intent.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest<T: Entity> {
    pub id: RequestId,
    pub op: ApiOp<T>,
}

/// Every message an entity store understands.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityAction<T: Entity> {
    // ===== Intents =====
    /// Load a page, optionally sorted and filtered.
    List(ListQuery),
    /// Free-text search.
    Search(SearchQuery),
    /// Load one entity by id and select it.
    Fetch(String),
    Create(T::Input),
    Update { id: String, input: T::Input },
    Remove(String),
    /// Replay the last search if a term is active, else the last list.
    Reload,
    /// Point the selection at an id (or clear it).
    Select(Option<String>),
    /// Back to the initial state (logout, teardown).
    Reset,

    // ===== Outcomes =====
    ListDidLoad { request: RequestId, page: Page<T> },
    ListDidError { request: RequestId, error: String },
    SearchDidLoad { request: RequestId, page: Page<T> },
    SearchDidError { request: RequestId, error: String },
    FetchDidLoad { request: RequestId, entity: T },
    FetchDidError { request: RequestId, error: String },
    CreateDidSucceed { request: RequestId, entity: T },
    CreateDidError { request: RequestId, error: String },
    UpdateDidSucceed { request: RequestId, entity: T },
    UpdateDidError { request: RequestId, error: String },
    RemoveDidSucceed { request: RequestId, id: String },
    RemoveDidError { request: RequestId, error: String },
}

impl<T: Entity> EntityAction<T> {
    /// Request id for outcome messages, `None` for intents.
    pub fn request(&self) -> Option<RequestId> {
        match self {
            EntityAction::ListDidLoad { request, .. }
            | EntityAction::ListDidError { request, .. }
            | EntityAction::SearchDidLoad { request, .. }
            | EntityAction::SearchDidError { request, .. }
            | EntityAction::FetchDidLoad { request, .. }
            | EntityAction::FetchDidError { request, .. }
            | EntityAction::CreateDidSucceed { request, .. }
            | EntityAction::CreateDidError { request, .. }
            | EntityAction::UpdateDidSucceed { request, .. }
            | EntityAction::UpdateDidError { request, .. }
            | EntityAction::RemoveDidSucceed { request, .. }
            | EntityAction::RemoveDidError { request, .. } => Some(*request),
            _ => None,
        }
    }

    pub fn is_outcome(&self) -> bool {
        self.request().is_some()
    }

    /// Normalized failure message for `*DidError` outcomes.
    pub fn error(&self) -> Option<&str> {
        match self {
            EntityAction::ListDidError { error, .. }
            | EntityAction::SearchDidError { error, .. }
            | EntityAction::FetchDidError { error, .. }
            | EntityAction::CreateDidError { error, .. }
            | EntityAction::UpdateDidError { error, .. }
            | EntityAction::RemoveDidError { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl<T: Entity> Action for EntityAction<T> {
    fn name(&self) -> &'static str {
        match self {
            EntityAction::List(_) => "List",
            EntityAction::Search(_) => "Search",
            EntityAction::Fetch(_) => "Fetch",
            EntityAction::Create(_) => "Create",
            EntityAction::Update { .. } => "Update",
            EntityAction::Remove(_) => "Remove",
            EntityAction::Reload => "Reload",
            EntityAction::Select(_) => "Select",
            EntityAction::Reset => "Reset",
            EntityAction::ListDidLoad { .. } => "ListDidLoad",
            EntityAction::ListDidError { .. } => "ListDidError",
            EntityAction::SearchDidLoad { .. } => "SearchDidLoad",
            EntityAction::SearchDidError { .. } => "SearchDidError",
            EntityAction::FetchDidLoad { .. } => "FetchDidLoad",
            EntityAction::FetchDidError { .. } => "FetchDidError",
            EntityAction::CreateDidSucceed { .. } => "CreateDidSucceed",
            EntityAction::CreateDidError { .. } => "CreateDidError",
            EntityAction::UpdateDidSucceed { .. } => "UpdateDidSucceed",
            EntityAction::UpdateDidError { .. } => "UpdateDidError",
            EntityAction::RemoveDidSucceed { .. } => "RemoveDidSucceed",
            EntityAction::RemoveDidError { .. } => "RemoveDidError",
        }
    }

    fn scope(&self) -> Option<&'static str> {
        Some(T::NAME)
    }
}

/// Pages are summarized by their counters instead of the full records.
impl<T: Entity> ActionSummary for EntityAction<T> {
    fn summary(&self) -> String {
        match self {
            EntityAction::ListDidLoad { request, page }
            | EntityAction::SearchDidLoad { request, page } => format!(
                "{} {{ request: {}, items: {}, total: {}, page: {}/{} }}",
                self.name(),
                request,
                page.content.len(),
                page.total_elements,
                page.page_index.saturating_add(1),
                page.total_pages
            ),
            EntityAction::FetchDidLoad { request, entity }
            | EntityAction::CreateDidSucceed { request, entity }
            | EntityAction::UpdateDidSucceed { request, entity } => format!(
                "{} {{ request: {}, id: {:?} }}",
                self.name(),
                request,
                entity.id()
            ),
            _ => format!("{:?}", self),
        }
    }
}
