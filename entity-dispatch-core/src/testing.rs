//! Test utilities for entity-dispatch applications
//!
//! - [`MemoryApi`]: in-memory [`EntityApi`] with latency and failure injection
//! - [`RecordingNotifier`] / [`RecordingNavigator`]: capture side effects
//! - [`TestHarness`]: a single entity store without a root, for reducer tests
//! - Assertion macros for verifying emitted requests or actions
//!
//! # Example
//!
//! ```ignore
//! use entity_dispatch::testing::{MemoryApi, TestHarness};
//!
//! let api = MemoryApi::<Patient>::new(|id, input| Patient::from_input(id, input));
//! let mut harness = TestHarness::<Patient>::default();
//!
//! harness.dispatch(EntityAction::List(ListQuery::page(0, 10)));
//! assert_emitted!(harness.drain_emitted(), ApiRequest { op: ApiOp::List(_), .. });
//!
//! harness.dispatch(EntityAction::Create(input));
//! let outcomes = harness.settle(&api).await;
//! assert_emitted!(outcomes, EntityAction::CreateDidSucceed { .. });
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::api::EntityApi;
use crate::effects::call;
use crate::entity::{reduce, ApiRequest, Entity, EntityAction, EntityState, RequestId};
use crate::error::{ApiError, ErrorPolicy};
use crate::page::{ListQuery, Page, SearchQuery};
use crate::sink::{Navigator, Notifier};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// In-memory gateway
// ============================================================================

type BuildFn<T> = dyn Fn(&str, &<T as Entity>::Input) -> T + Send + Sync;
type SearchFn<T> = dyn Fn(&T, &str) -> bool + Send + Sync;
type FilterFn<T> = dyn Fn(&T, &str, &str) -> bool + Send + Sync;

struct Backend<T> {
    records: Vec<T>,
    next_id: u64,
    latency: Duration,
    delays: VecDeque<Duration>,
    failures: VecDeque<ApiError>,
    calls: usize,
}

/// [`EntityApi`] over a `Vec`, in insertion order.
///
/// Create and update build records through the closure given to
/// [`MemoryApi::new`]; created ids are `"{entity}-{n}"`. Every call first
/// waits for its latency (see [`delay_next`](Self::delay_next)) and then
/// fails if a failure was queued with [`fail_next`](Self::fail_next).
pub struct MemoryApi<T: Entity> {
    build: Box<BuildFn<T>>,
    search: Option<Box<SearchFn<T>>>,
    filter: Option<Box<FilterFn<T>>>,
    backend: Mutex<Backend<T>>,
}

impl<T: Entity> MemoryApi<T> {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&str, &T::Input) -> T + Send + Sync + 'static,
    {
        Self {
            build: Box::new(build),
            search: None,
            filter: None,
            backend: Mutex::new(Backend {
                records: Vec::new(),
                next_id: 1,
                latency: Duration::ZERO,
                delays: VecDeque::new(),
                failures: VecDeque::new(),
                calls: 0,
            }),
        }
    }

    pub fn with_records(self, records: Vec<T>) -> Self {
        lock(&self.backend).records = records;
        self
    }

    /// Term matcher for `search`. Without one, the term is looked up in
    /// the record's `Debug` output, case-insensitively.
    pub fn with_search<F>(mut self, matches: F) -> Self
    where
        F: Fn(&T, &str) -> bool + Send + Sync + 'static,
    {
        self.search = Some(Box::new(matches));
        self
    }

    /// Matcher for `ListQuery::filters`, called with `(record, key, value)`.
    /// Without one, filters are ignored.
    pub fn with_filter<F>(mut self, matches: F) -> Self
    where
        F: Fn(&T, &str, &str) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(matches));
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    /// Latency of every call without a queued delay.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.backend).latency = latency;
    }

    /// Latency of the next call only. Queued delays apply in call order.
    pub fn delay_next(&self, delay: Duration) {
        lock(&self.backend).delays.push_back(delay);
    }

    /// Make the next call fail with `error`. Queued failures apply in call
    /// order.
    pub fn fail_next(&self, error: ApiError) {
        lock(&self.backend).failures.push_back(error);
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        lock(&self.backend).calls
    }

    /// Snapshot of the stored records.
    pub fn records(&self) -> Vec<T> {
        lock(&self.backend).records.clone()
    }

    pub fn insert(&self, record: T) {
        lock(&self.backend).records.push(record);
    }

    async fn begin(&self) -> Result<(), ApiError> {
        let (delay, failure) = {
            let mut backend = lock(&self.backend);
            backend.calls += 1;
            let delay = backend.delays.pop_front().unwrap_or(backend.latency);
            (delay, backend.failures.pop_front())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn matches_term(&self, record: &T, term: &str) -> bool {
        match &self.search {
            Some(matches) => matches(record, term),
            None => format!("{record:?}")
                .to_lowercase()
                .contains(&term.to_lowercase()),
        }
    }

    fn not_found(id: &str) -> ApiError {
        ApiError::not_found(T::NAME, id)
    }
}

fn paginate<T>(records: Vec<T>, page_index: usize, page_size: usize) -> Page<T> {
    let total = records.len();
    let content = if page_size == 0 {
        records
    } else {
        records
            .into_iter()
            .skip(page_index.saturating_mul(page_size))
            .take(page_size)
            .collect()
    };
    Page::new(content, total, page_index, page_size)
}

#[async_trait]
impl<T: Entity> EntityApi<T> for MemoryApi<T> {
    async fn list(&self, query: &ListQuery) -> Result<Page<T>, ApiError> {
        self.begin().await?;
        let records: Vec<T> = lock(&self.backend)
            .records
            .iter()
            .filter(|record: &&T| match &self.filter {
                Some(matches) => query
                    .filters
                    .iter()
                    .all(|(key, value)| matches(*record, key.as_str(), value.as_str())),
                None => true,
            })
            .cloned()
            .collect();
        Ok(paginate(records, query.page_index, query.page_size))
    }

    async fn search(&self, query: &SearchQuery) -> Result<Page<T>, ApiError> {
        self.begin().await?;
        let records: Vec<T> = lock(&self.backend)
            .records
            .iter()
            .filter(|record| self.matches_term(record, &query.term))
            .cloned()
            .collect();
        Ok(paginate(records, query.page_index, query.page_size))
    }

    async fn get(&self, id: &str) -> Result<T, ApiError> {
        self.begin().await?;
        lock(&self.backend)
            .records
            .iter()
            .find(|record| record.id() == id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn create(&self, input: &T::Input) -> Result<T, ApiError> {
        self.begin().await?;
        let mut backend = lock(&self.backend);
        let id = format!("{}-{}", T::NAME, backend.next_id);
        backend.next_id += 1;
        let record = (self.build)(&id, input);
        backend.records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, input: &T::Input) -> Result<T, ApiError> {
        self.begin().await?;
        let mut backend = lock(&self.backend);
        let slot = backend
            .records
            .iter_mut()
            .find(|record| record.id() == id)
            .ok_or_else(|| Self::not_found(id))?;
        *slot = (self.build)(id, input);
        Ok(slot.clone())
    }

    async fn remove(&self, id: &str) -> Result<(), ApiError> {
        self.begin().await?;
        let mut backend = lock(&self.backend);
        let index = backend
            .records
            .iter()
            .position(|record| record.id() == id)
            .ok_or_else(|| Self::not_found(id))?;
        backend.records.remove(index);
        Ok(())
    }
}

// ============================================================================
// Recording sinks
// ============================================================================

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
    Warning(String),
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    /// Notices received so far, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        lock(&self.notices).clone()
    }

    pub fn clear(&self) {
        lock(&self.notices).clear();
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        lock(&self.notices).push(Notice::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        lock(&self.notices).push(Notice::Error(message.to_string()));
    }

    fn warning(&self, message: &str) {
        lock(&self.notices).push(Notice::Warning(message.to_string()));
    }
}

/// A route change captured by [`RecordingNavigator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub path: String,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<Visit>>,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<Visit> {
        lock(&self.visits).clone()
    }

    pub fn paths(&self) -> Vec<String> {
        lock(&self.visits)
            .iter()
            .map(|visit| visit.path.clone())
            .collect()
    }
}

impl Navigator for RecordingNavigator {
    fn go_to(&self, path: &str, params: &[(String, String)]) {
        lock(&self.visits).push(Visit {
            path: path.to_string(),
            params: params.to_vec(),
        });
    }
}

// ============================================================================
// Harness
// ============================================================================

/// One entity store driven directly through the reducer.
///
/// Requests declared by the reducer are captured instead of executed.
/// [`settle`](Self::settle) runs them against a gateway and dispatches the
/// outcomes, in request order.
pub struct TestHarness<T: Entity> {
    pub state: EntityState<T>,
    /// Used to normalize gateway errors in `settle`
    pub policy: ErrorPolicy,
    tx: mpsc::UnboundedSender<ApiRequest<T>>,
    rx: mpsc::UnboundedReceiver<ApiRequest<T>>,
}

impl<T: Entity> TestHarness<T> {
    pub fn new(state: EntityState<T>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state,
            policy: ErrorPolicy::default(),
            tx,
            rx,
        }
    }

    /// Run the reducer, capturing declared requests. Returns whether the
    /// state changed.
    pub fn dispatch(&mut self, action: EntityAction<T>) -> bool {
        let result = reduce(&mut self.state, action);
        for request in result.effects {
            let _ = self.tx.send(request);
        }
        result.changed
    }

    /// Dispatch an intent and return the id of the request it declared.
    ///
    /// Other captured requests are discarded.
    pub fn start(&mut self, intent: EntityAction<T>) -> Option<RequestId> {
        self.dispatch(intent);
        self.drain_emitted().pop().map(|request| request.id)
    }

    pub fn drain_emitted(&mut self) -> Vec<ApiRequest<T>> {
        let mut requests = Vec::new();
        while let Ok(request) = self.rx.try_recv() {
            requests.push(request);
        }
        requests
    }

    pub fn has_emitted(&mut self) -> bool {
        !self.drain_emitted().is_empty()
    }

    /// Execute every captured request against `api`, then dispatch the
    /// outcomes. Returns the outcomes.
    pub async fn settle(&mut self, api: &dyn EntityApi<T>) -> Vec<EntityAction<T>> {
        let mut outcomes = Vec::new();
        for request in self.drain_emitted() {
            outcomes.push(call(api, &self.policy, request).await);
        }
        for outcome in &outcomes {
            self.dispatch(outcome.clone());
        }
        outcomes
    }
}

impl<T: Entity> Default for TestHarness<T> {
    fn default() -> Self {
        Self::new(EntityState::default())
    }
}

// ============================================================================
// Time control (requires "testing-time")
// ============================================================================

/// Freeze the tokio clock so [`MemoryApi`] latency only elapses on
/// [`advance_time`].
#[cfg(feature = "testing-time")]
pub fn pause_time() {
    tokio::time::pause();
}

#[cfg(feature = "testing-time")]
pub fn resume_time() {
    tokio::time::resume();
}

/// Move the paused clock forward and let woken tasks run.
#[cfg(feature = "testing-time")]
pub async fn advance_time(duration: Duration) {
    tokio::time::advance(duration).await;
}

/// Assert that a specific action was emitted.
///
/// # Example
///
/// ```ignore
/// use entity_dispatch::assert_emitted;
///
/// let outcomes = harness.settle(&api).await;
/// assert_emitted!(outcomes, EntityAction::ListDidLoad { .. });
/// ```
#[macro_export]
macro_rules! assert_emitted {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            $actions.iter().any(|a| matches!(a, $pattern $(if $guard)?)),
            "Expected action matching `{}` to be emitted, but got: {:?}",
            stringify!($pattern),
            $actions
        );
    };
}

/// Assert that a specific action was NOT emitted.
///
/// # Example
///
/// ```ignore
/// use entity_dispatch::assert_not_emitted;
///
/// let requests = harness.drain_emitted();
/// assert_not_emitted!(requests, ApiRequest { op: ApiOp::Remove { .. }, .. });
/// ```
#[macro_export]
macro_rules! assert_not_emitted {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            !$actions.iter().any(|a| matches!(a, $pattern $(if $guard)?)),
            "Expected action matching `{}` NOT to be emitted, but it was: {:?}",
            stringify!($pattern),
            $actions
        );
    };
}

/// Find and return the first action matching a pattern.
///
/// # Example
///
/// ```ignore
/// use entity_dispatch::find_emitted;
///
/// if let Some(EntityAction::FetchDidLoad { entity, .. }) =
///     find_emitted!(outcomes, EntityAction::FetchDidLoad { .. })
/// {
///     assert_eq!(entity.id(), "p1");
/// }
/// ```
#[macro_export]
macro_rules! find_emitted {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        $actions.iter().find(|a| matches!(a, $pattern $(if $guard)?))
    };
}

/// Count how many actions match a pattern.
///
/// # Example
///
/// ```ignore
/// use entity_dispatch::count_emitted;
///
/// assert_eq!(count_emitted!(outcomes, EntityAction::ListDidLoad { .. }), 1);
/// ```
#[macro_export]
macro_rules! count_emitted {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        $actions.iter().filter(|a| matches!(a, $pattern $(if $guard)?)).count()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ApiOp, RequestKind};

    #[derive(Debug, Clone, PartialEq)]
    struct Antecedent {
        id: String,
        label: String,
        kind: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct AntecedentInput {
        label: String,
        kind: String,
    }

    impl Entity for Antecedent {
        type Input = AntecedentInput;
        const NAME: &'static str = "antecedent";

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn input(label: &str, kind: &str) -> AntecedentInput {
        AntecedentInput {
            label: label.into(),
            kind: kind.into(),
        }
    }

    fn api() -> MemoryApi<Antecedent> {
        MemoryApi::new(|id: &str, input: &AntecedentInput| Antecedent {
            id: id.to_string(),
            label: input.label.clone(),
            kind: input.kind.clone(),
        })
        .with_filter(|record, key, value| key == "kind" && record.kind == value)
    }

    #[tokio::test]
    async fn test_memory_api_crud() {
        let api = api();
        let created = api.create(&input("Diabetes", "medical")).await.unwrap();
        assert_eq!(created.id, "antecedent-1");

        let updated = api
            .update(&created.id, &input("Type 2 diabetes", "medical"))
            .await
            .unwrap();
        assert_eq!(updated.label, "Type 2 diabetes");
        assert_eq!(api.get(&created.id).await.unwrap(), updated);

        api.remove(&created.id).await.unwrap();
        let err = api.get(&created.id).await.unwrap_err();
        assert_eq!(err.status, Some(404));
        assert_eq!(api.calls(), 5);
    }

    #[tokio::test]
    async fn test_memory_api_pagination_filters_and_search() {
        let api = api();
        for (label, kind) in [
            ("C-section", "surgical"),
            ("Asthma", "medical"),
            ("Appendix", "surgical"),
        ] {
            api.create(&input(label, kind)).await.unwrap();
        }

        let page = api.list(&ListQuery::page(1, 2)).await.unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 2);

        let surgical = api
            .list(&ListQuery::page(0, 10).filter("kind", "surgical"))
            .await
            .unwrap();
        assert_eq!(surgical.total_elements, 2);

        let found = api.search(&SearchQuery::new("asthma", 0, 10)).await.unwrap();
        assert_eq!(found.content[0].label, "Asthma");
    }

    #[tokio::test]
    async fn test_memory_api_failure_injection() {
        let api = api();
        api.fail_next(ApiError::http(409, "duplicate"));
        let err = api.create(&input("x", "y")).await.unwrap_err();
        assert_eq!(err.status, Some(409));
        // Only the next call fails
        assert!(api.create(&input("x", "y")).await.is_ok());
        assert_eq!(api.records().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_api_latency() {
        let api = api().with_latency(Duration::from_millis(200));
        api.delay_next(Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        api.list(&ListQuery::page(0, 10)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        api.list(&ListQuery::page(0, 10)).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_secs(5));
    }

    #[cfg(feature = "testing-time")]
    #[tokio::test]
    async fn test_advance_time_releases_latency() {
        pause_time();
        let api = std::sync::Arc::new(api().with_latency(Duration::from_secs(1)));
        let listing = tokio::spawn({
            let api = api.clone();
            async move { api.list(&ListQuery::page(0, 10)).await }
        });
        tokio::task::yield_now().await;

        advance_time(Duration::from_millis(500)).await;
        assert!(!listing.is_finished());

        advance_time(Duration::from_millis(500)).await;
        assert!(listing.await.unwrap().is_ok());
        assert_eq!(api.calls(), 1);
        resume_time();
    }

    #[test]
    fn test_recording_sinks() {
        let notifier = RecordingNotifier::default();
        notifier.success("saved");
        notifier.warning("slow");
        notifier.error("failed");
        assert_eq!(
            notifier.notices(),
            vec![
                Notice::Success("saved".into()),
                Notice::Warning("slow".into()),
                Notice::Error("failed".into()),
            ]
        );
        notifier.clear();
        assert!(notifier.notices().is_empty());

        let navigator = RecordingNavigator::default();
        navigator.go_to("/patients/p1", &[("tab".into(), "pregnancies".into())]);
        assert_eq!(navigator.paths(), vec!["/patients/p1".to_string()]);
        assert_eq!(navigator.visits()[0].params.len(), 1);
    }

    #[tokio::test]
    async fn test_harness_settle() {
        let api = api();
        let mut harness = TestHarness::<Antecedent>::default();

        assert!(harness.dispatch(EntityAction::List(ListQuery::page(0, 10))));
        harness.dispatch(EntityAction::Create(input("Asthma", "medical")));
        let outcomes = harness.settle(&api).await;

        assert_eq!(outcomes.len(), 2);
        assert_emitted!(outcomes, EntityAction::ListDidLoad { .. });
        assert_emitted!(outcomes, EntityAction::CreateDidSucceed { entity, .. } if entity.label == "Asthma");
        assert_not_emitted!(outcomes, EntityAction::CreateDidError { .. });
        assert_eq!(count_emitted!(outcomes, EntityAction::ListDidLoad { .. }), 1);

        assert!(!harness.state.is_loading());
        assert_eq!(harness.state.items.len(), 1);
        assert_eq!(harness.state.selected_id.as_deref(), Some("antecedent-1"));
    }

    #[test]
    fn test_harness_start_and_drain() {
        let mut harness = TestHarness::<Antecedent>::default();
        let id = harness.start(EntityAction::Remove("a1".into()));
        assert_eq!(id.map(|id| id.kind), Some(RequestKind::Remove));
        assert!(!harness.has_emitted());

        harness.dispatch(EntityAction::Reload);
        let requests = harness.drain_emitted();
        assert_emitted!(requests, ApiRequest { op: ApiOp::List(_), .. });
        let found = find_emitted!(requests, ApiRequest { op: ApiOp::List(_), .. });
        assert_eq!(found.map(|request| request.id.seq), Some(2));

        // Select declares nothing
        assert!(harness.start(EntityAction::Select(None)).is_none());
    }
}
