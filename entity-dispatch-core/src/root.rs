//! Registry of entity stores behind one dispatch entry point
//!
//! Every registered entity type gets a slot holding its store, its
//! [`EffectRunner`] and a snapshot publisher. `dispatch` is synchronous:
//! middleware `before`, reducer, middleware `after`, effects, then
//! subscribers, in that order. Outcomes of gateway calls arrive on the
//! queue and go through the same path from [`StoreRoot::process_pending`]
//! or [`StoreRoot::run`].
//!
//! # Example
//!
//! ```ignore
//! let mut root = StoreRoot::new(RuntimeConfig::default());
//! root.register::<Patient>(patients_api, notifier, navigator)?;
//!
//! root.dispatch::<Patient>(EntityAction::List(ListQuery::page(0, 20)))?;
//! root.process_pending();
//! let rows = root.select(select_all::<Patient>)?;
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::action::Action;
use crate::api::EntityApi;
use crate::channel::{ActionChannel, Message};
use crate::config::{EntityConfig, RuntimeConfig};
use crate::effect::EffectStore;
use crate::effects::EffectRunner;
use crate::entity::{reduce, ApiRequest, Entity, EntityAction, EntityState};
use crate::error::{ErrorPolicy, StoreError};
use crate::log::ActionLog;
use crate::middleware::{ComposedMiddleware, Middleware};
use crate::sink::{Navigator, Notifier, TracingNavigator, TracingNotifier};

/// Type-erased view of an [`EntitySlot`].
trait Slot: Send {
    fn as_any(&self) -> &dyn Any;

    /// Run the reducer on `message`, staging its effects.
    fn reduce(&mut self, message: &Message) -> Result<bool, StoreError>;

    /// Run staged effects and publish the new snapshot.
    fn flush(&mut self);

    fn reset_message(&self) -> Message;

    fn pending(&self) -> usize;
}

struct Staged<T: Entity> {
    changed: bool,
    effects: Vec<ApiRequest<T>>,
    reaction: Option<EntityAction<T>>,
}

impl<T: Entity> Default for Staged<T> {
    fn default() -> Self {
        Self {
            changed: false,
            effects: Vec::new(),
            reaction: None,
        }
    }
}

struct EntitySlot<T: Entity> {
    store: EffectStore<EntityState<T>, EntityAction<T>, ApiRequest<T>>,
    runner: EffectRunner<T>,
    publisher: watch::Sender<Arc<EntityState<T>>>,
    staged: Staged<T>,
}

/// Outcomes the runner reacts to. Loaded pages and entities only touch
/// the cache.
fn has_reaction<T: Entity>(action: &EntityAction<T>) -> bool {
    matches!(
        action,
        EntityAction::CreateDidSucceed { .. }
            | EntityAction::UpdateDidSucceed { .. }
            | EntityAction::RemoveDidSucceed { .. }
    ) || action.error().is_some()
}

impl<T: Entity> Slot for EntitySlot<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn reduce(&mut self, message: &Message) -> Result<bool, StoreError> {
        let action = message
            .downcast_ref::<T>()
            .cloned()
            .ok_or(StoreError::PayloadMismatch {
                entity: T::NAME,
                name: message.name(),
            })?;

        // React once per request, and never to superseded or pre-reset
        // outcomes.
        let state = self.store.state();
        let live = action
            .request()
            .is_some_and(|request| state.in_flight.contains(&request) && state.accepts(request));
        let reaction = (live && has_reaction(&action)).then(|| action.clone());

        if matches!(action, EntityAction::Reset) {
            self.runner.cancel_pending();
        }

        let result = self.store.dispatch(action);
        self.staged = Staged {
            changed: result.changed,
            effects: result.effects,
            reaction,
        };
        Ok(result.changed)
    }

    fn flush(&mut self) {
        let staged = std::mem::take(&mut self.staged);
        for request in staged.effects {
            self.runner.execute(request);
        }
        if let Some(outcome) = staged.reaction {
            self.runner.on_outcome(&outcome);
        }
        if staged.changed {
            self.publisher
                .send_replace(Arc::new(self.store.state().clone()));
        }
    }

    fn reset_message(&self) -> Message {
        Message::new(EntityAction::<T>::Reset)
    }

    fn pending(&self) -> usize {
        self.runner.pending()
    }
}

/// Root store composing one slot per entity type.
pub struct StoreRoot {
    config: RuntimeConfig,
    slots: HashMap<&'static str, Box<dyn Slot>>,
    channel: ActionChannel,
    middleware: ComposedMiddleware<Message>,
    log: Option<ActionLog>,
    policy: Arc<ErrorPolicy>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl Default for StoreRoot {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl StoreRoot {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            log: config.action_log.clone().map(ActionLog::new),
            policy: Arc::new(config.error_policy.clone()),
            config,
            slots: HashMap::new(),
            channel: ActionChannel::new(),
            middleware: ComposedMiddleware::new(),
            notifier: Arc::new(TracingNotifier),
            navigator: Arc::new(TracingNavigator),
        }
    }

    /// Add middleware seeing every message, registered order for `before`
    /// and reverse order for `after`.
    pub fn with_middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<Message> + Send + 'static,
    {
        self.middleware.add(middleware);
        self
    }

    /// Notifier used by [`register_with`](Self::register_with).
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Navigator used by [`register_with`](Self::register_with).
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Register `T` with explicit sinks and the overrides found under
    /// `entities.<name>` in the config.
    pub fn register<T: Entity>(
        &mut self,
        api: impl EntityApi<T> + 'static,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<(), StoreError> {
        let overrides = self.config.entity(T::NAME);
        self.insert_slot::<T>(Arc::new(api), notifier, navigator, &overrides)
    }

    /// Register `T` with the root's sinks and explicit overrides.
    pub fn register_with<T: Entity>(
        &mut self,
        api: impl EntityApi<T> + 'static,
        overrides: EntityConfig,
    ) -> Result<(), StoreError> {
        let notifier = Arc::clone(&self.notifier);
        let navigator = Arc::clone(&self.navigator);
        self.insert_slot::<T>(Arc::new(api), notifier, navigator, &overrides)
    }

    fn insert_slot<T: Entity>(
        &mut self,
        api: Arc<dyn EntityApi<T>>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        overrides: &EntityConfig,
    ) -> Result<(), StoreError> {
        if self.slots.contains_key(T::NAME) {
            return Err(StoreError::AlreadyRegistered(T::NAME));
        }

        let settings = self.config.resolve(T::NAME, overrides);
        let state = EntityState::<T>::with_page_size(settings.page_size);
        let (publisher, _) = watch::channel(Arc::new(state.clone()));
        let runner = EffectRunner::new(
            api,
            notifier,
            navigator,
            settings,
            Arc::clone(&self.policy),
            self.channel.sender(),
        );

        tracing::debug!(entity = T::NAME, "registered entity store");
        self.slots.insert(
            T::NAME,
            Box::new(EntitySlot {
                store: EffectStore::new(state, reduce::<T>),
                runner,
                publisher,
                staged: Staged::default(),
            }),
        );
        Ok(())
    }

    pub fn is_registered<T: Entity>(&self) -> bool {
        self.slots.contains_key(T::NAME)
    }

    /// Registered entity names, sorted.
    pub fn entities(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.slots.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Deliver `action` to the store of `T` and run its effects.
    ///
    /// Returns whether the state changed. Must be called from within a
    /// tokio runtime when the action starts a request.
    pub fn dispatch<T: Entity>(&mut self, action: EntityAction<T>) -> Result<bool, StoreError> {
        if !self.slots.contains_key(T::NAME) {
            return Err(StoreError::NotRegistered(T::NAME));
        }
        self.deliver(Message::new(action))
    }

    /// Queue `action` behind the outcomes already waiting.
    pub fn enqueue<T: Entity>(&self, action: EntityAction<T>) {
        self.channel.push(action);
    }

    fn deliver(&mut self, message: Message) -> Result<bool, StoreError> {
        let entity = message.entity();
        let slot = self
            .slots
            .get_mut(entity)
            .ok_or(StoreError::NotRegistered(entity))?;

        self.middleware.before(&message);
        let logged = self
            .log
            .as_mut()
            .is_some_and(|log| log.log(&message).is_some());

        let changed = slot.reduce(&message)?;

        self.middleware.after(&message, changed);
        if logged {
            if let Some(log) = self.log.as_mut() {
                log.update_last_state_changed(changed);
            }
        }

        slot.flush();
        tracing::debug!(entity, action = message.name(), changed, "dispatched");
        Ok(changed)
    }

    fn slot<T: Entity>(&self) -> Result<&EntitySlot<T>, StoreError> {
        self.slots
            .get(T::NAME)
            .ok_or(StoreError::NotRegistered(T::NAME))?
            .as_any()
            .downcast_ref::<EntitySlot<T>>()
            .ok_or(StoreError::PayloadMismatch {
                entity: T::NAME,
                name: std::any::type_name::<T>(),
            })
    }

    /// Current state of `T`.
    pub fn state<T: Entity>(&self) -> Result<&EntityState<T>, StoreError> {
        Ok(self.slot::<T>()?.store.state())
    }

    /// Apply `selector` to the current state of `T`.
    pub fn select<T, R, F>(&self, selector: F) -> Result<R, StoreError>
    where
        T: Entity,
        F: FnOnce(&EntityState<T>) -> R,
    {
        Ok(selector(self.state::<T>()?))
    }

    /// Snapshots of `T`, published after every change.
    pub fn subscribe<T: Entity>(
        &self,
    ) -> Result<watch::Receiver<Arc<EntityState<T>>>, StoreError> {
        Ok(self.slot::<T>()?.publisher.subscribe())
    }

    /// Distinct values of `selector` over the snapshots of `T`, starting
    /// with the current one.
    #[cfg(feature = "subscriptions")]
    pub fn select_stream<T, R, F>(
        &self,
        selector: F,
    ) -> Result<impl tokio_stream::Stream<Item = R> + Send + 'static, StoreError>
    where
        T: Entity,
        R: Clone + PartialEq + Send + 'static,
        F: Fn(&EntityState<T>) -> R + Send + 'static,
    {
        use tokio_stream::wrappers::WatchStream;
        use tokio_stream::StreamExt;

        let mut last: Option<R> = None;
        let stream = WatchStream::new(self.subscribe::<T>()?).filter_map(move |state| {
            let value = selector(state.as_ref());
            if last.as_ref() == Some(&value) {
                return None;
            }
            last = Some(value.clone());
            Some(value)
        });
        Ok(stream)
    }

    /// Deliver every queued message, including those queued while
    /// draining. Returns how many were delivered.
    pub fn process_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(message) = self.channel.try_next() {
            self.deliver_queued(message);
            delivered += 1;
        }
        delivered
    }

    /// Deliver queued messages as they arrive until `cancel` fires.
    ///
    /// Returns how many were delivered.
    pub async fn run(&mut self, cancel: CancellationToken) -> usize {
        let mut delivered = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                Some(message) = self.channel.next() => {
                    self.deliver_queued(message);
                    delivered += 1;
                }

                else => break,
            }
        }
        delivered
    }

    fn deliver_queued(&mut self, message: Message) {
        if let Err(err) = self.deliver(message) {
            tracing::warn!(error = %err, "dropping queued message");
        }
    }

    /// Reset every store and abort their pending calls (logout).
    pub fn reset_all(&mut self) {
        let mut messages: Vec<_> = self
            .slots
            .values()
            .map(|slot| slot.reset_message())
            .collect();
        messages.sort_by_key(Message::entity);
        for message in messages {
            self.deliver_queued(message);
        }
    }

    /// Gateway calls still running, across all stores.
    pub fn pending(&self) -> usize {
        self.slots.values().map(|slot| slot.pending()).sum()
    }

    /// The in-memory action log, when enabled in the config.
    pub fn action_log(&self) -> Option<&ActionLog> {
        self.log.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{selectors, RequestKind};
    use crate::log::{ActionLogConfig, ActionLoggerConfig};
    use crate::page::ListQuery;
    use crate::testing::{MemoryApi, Notice, RecordingNavigator, RecordingNotifier};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Role {
        id: String,
        label: String,
    }

    impl Entity for Role {
        type Input = String;
        const NAME: &'static str = "role";

        fn id(&self) -> &str {
            &self.id
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        id: String,
    }

    impl Entity for User {
        type Input = ();
        const NAME: &'static str = "user";

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn roles() -> Arc<MemoryApi<Role>> {
        Arc::new(
            MemoryApi::<Role>::new(|id, label: &String| Role {
                id: id.to_string(),
                label: label.clone(),
            })
            .with_records(vec![
                Role {
                    id: "admin".into(),
                    label: "Admin".into(),
                },
                Role {
                    id: "midwife".into(),
                    label: "Midwife".into(),
                },
            ]),
        )
    }

    fn users() -> MemoryApi<User> {
        MemoryApi::new(|id, _: &()| User { id: id.to_string() })
    }

    #[test]
    fn test_register_twice_fails() {
        let mut root = StoreRoot::default();
        root.register_with::<Role>(roles(), EntityConfig::default()).unwrap();
        assert_eq!(
            root.register_with::<Role>(roles(), EntityConfig::default()),
            Err(StoreError::AlreadyRegistered("role"))
        );
        assert!(root.is_registered::<Role>());
        assert!(!root.is_registered::<User>());
    }

    #[test]
    fn test_unregistered_entity() {
        let mut root = StoreRoot::default();
        assert_eq!(
            root.dispatch::<User>(EntityAction::Reload),
            Err(StoreError::NotRegistered("user"))
        );
        assert!(matches!(
            root.select(selectors::select_all::<User>),
            Err(StoreError::NotRegistered("user"))
        ));
        assert!(root.subscribe::<User>().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_list_then_process_pending() {
        let mut root = StoreRoot::default();
        root.register_with::<Role>(roles(), EntityConfig::default().page_size(10))
            .unwrap();

        assert!(root.dispatch::<Role>(EntityAction::Reload).unwrap());
        assert!(root.select(selectors::select_loading::<Role>).unwrap());
        assert_eq!(root.pending(), 1);

        // Let the spawned call finish
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(root.process_pending(), 1);

        let state = root.state::<Role>().unwrap();
        assert_eq!(state.items.len(), 2);
        assert_eq!(state.pagination.page_size, 10);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_subscribe_sees_changes_only() {
        let mut root = StoreRoot::default();
        root.register_with::<Role>(roles(), EntityConfig::default()).unwrap();
        let mut rx = root.subscribe::<Role>().unwrap();
        assert!(!rx.has_changed().unwrap());

        root.dispatch::<Role>(EntityAction::Select(Some("admin".into())))
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().selected_id.as_deref(), Some("admin"));

        // Same selection again: unchanged, nothing published
        assert!(!root
            .dispatch::<Role>(EntityAction::Select(Some("admin".into())))
            .unwrap());
        assert!(!rx.has_changed().unwrap());
    }

    #[cfg(feature = "subscriptions")]
    #[tokio::test(start_paused = true)]
    async fn test_select_stream_yields_distinct_values() {
        use tokio_stream::StreamExt;

        let mut root = StoreRoot::default();
        root.register_with::<Role>(roles(), EntityConfig::default()).unwrap();
        let selection = root
            .select_stream::<Role, _, _>(|state| state.selected_id.clone())
            .unwrap();
        tokio::pin!(selection);

        assert_eq!(selection.next().await, Some(None));

        root.dispatch::<Role>(EntityAction::Select(Some("admin".into())))
            .unwrap();
        assert_eq!(selection.next().await, Some(Some("admin".to_string())));

        // Loading changes the state but not the selection
        assert!(root.dispatch::<Role>(EntityAction::Reload).unwrap());
        let quiet = tokio::time::timeout(Duration::from_millis(50), selection.next()).await;
        assert!(quiet.is_err());

        root.dispatch::<Role>(EntityAction::Reset).unwrap();
        assert_eq!(selection.next().await, Some(None));
    }

    struct Trace(Arc<Mutex<Vec<String>>>);

    impl Middleware<Message> for Trace {
        fn before(&mut self, message: &Message) {
            self.0
                .lock()
                .unwrap()
                .push(format!("before {}/{}", message.entity(), message.name()));
        }

        fn after(&mut self, message: &Message, changed: bool) {
            self.0
                .lock()
                .unwrap()
                .push(format!("after {} {changed}", message.name()));
        }
    }

    #[test]
    fn test_middleware_sees_every_store() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut root = StoreRoot::default().with_middleware(Trace(calls.clone()));
        root.register_with::<Role>(roles(), EntityConfig::default()).unwrap();
        root.register_with::<User>(users(), EntityConfig::default()).unwrap();

        root.dispatch::<Role>(EntityAction::Select(Some("admin".into())))
            .unwrap();
        root.dispatch::<User>(EntityAction::Select(None)).unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "before role/Select".to_string(),
                "after Select true".to_string(),
                "before user/Select".to_string(),
                "after Select false".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_action_log_records_dispatches() {
        let config = RuntimeConfig::default().with_action_log(ActionLogConfig::new(
            10,
            ActionLoggerConfig::new(Some("role/*"), None),
        ));
        let mut root = StoreRoot::new(config);
        root.register_with::<Role>(roles(), EntityConfig::default()).unwrap();
        root.register_with::<User>(users(), EntityConfig::default()).unwrap();

        root.dispatch::<Role>(EntityAction::Select(None)).unwrap();
        root.dispatch::<User>(EntityAction::Select(Some("u1".into())))
            .unwrap();
        root.dispatch::<Role>(EntityAction::Select(Some("admin".into())))
            .unwrap();

        let log = root.action_log().unwrap();
        let entries: Vec<_> = log
            .entries()
            .map(|entry| (entry.entity, entry.name, entry.state_changed))
            .collect();
        assert_eq!(
            entries,
            vec![
                (Some("role"), "Select", Some(false)),
                (Some("role"), "Select", Some(true)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_all_cancels_and_ignores_late_outcomes() {
        let api = roles();
        api.set_latency(Duration::from_secs(1));
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(RecordingNavigator::default());

        let mut root = StoreRoot::default();
        root.register::<Role>(api.clone(), notifier.clone(), navigator.clone())
            .unwrap();
        root.register_with::<User>(users(), EntityConfig::default()).unwrap();

        root.dispatch::<Role>(EntityAction::List(ListQuery::page(0, 10)))
            .unwrap();
        root.dispatch::<Role>(EntityAction::Create("Nurse".into()))
            .unwrap();
        assert_eq!(root.pending(), 2);

        root.reset_all();
        assert_eq!(root.pending(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(root.process_pending(), 0);

        let state = root.state::<Role>().unwrap();
        assert!(state.items.is_empty());
        assert!(!state.is_loading());
        assert!(notifier.notices().is_empty());
        assert!(navigator.paths().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let mut root = StoreRoot::default();
        root.register::<Role>(roles(), notifier.clone(), navigator.clone())
            .unwrap();

        root.dispatch::<Role>(EntityAction::Remove("missing".into()))
            .unwrap();

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop.cancel();
        });
        let delivered = root.run(cancel).await;

        assert_eq!(delivered, 1);
        let state = root.state::<Role>().unwrap();
        assert_eq!(state.error.as_deref(), Some("Resource not found"));
        assert!(!state.is_loading_kind(RequestKind::Remove));
        assert_eq!(
            notifier.notices(),
            vec![Notice::Error("Resource not found".into())]
        );
    }

    #[tokio::test]
    async fn test_enqueue_goes_through_queue() {
        let mut root = StoreRoot::default();
        root.register_with::<Role>(roles(), EntityConfig::default()).unwrap();

        root.enqueue::<Role>(EntityAction::Select(Some("admin".into())));
        assert_eq!(root.state::<Role>().unwrap().selected_id, None);
        assert_eq!(root.process_pending(), 1);
        assert_eq!(
            root.state::<Role>().unwrap().selected_id.as_deref(),
            Some("admin")
        );
    }
}
