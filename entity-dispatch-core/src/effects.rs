//! Runs the gateway calls declared by the reducer and reacts to outcomes
//!
//! One runner per entity store. Each [`ApiRequest`] becomes exactly one
//! task; each task reports back exactly one outcome [`Message`] on the
//! queue. Reactions (notifications, navigation, refresh) never dispatch
//! synchronously: a follow-up action goes through the queue like any
//! other message.

use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::api::EntityApi;
use crate::channel::{Message, MessageSender};
use crate::config::{EntitySettings, NotificationConfig};
use crate::entity::{ApiOp, ApiRequest, Entity, EntityAction};
use crate::error::{ApiError, ErrorPolicy};
use crate::sink::{Navigator, Notifier};
use crate::tasks::{TaskKey, TaskManager};

bitflags! {
    /// Which outcomes trigger a user notification.
    ///
    /// Deserializes from flag names, e.g. `"CREATE | FAILURE"`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct NotifyOn: u8 {
        const CREATE = 1;
        const UPDATE = 1 << 1;
        const REMOVE = 1 << 2;
        const FAILURE = 1 << 3;
    }
}

impl Default for NotifyOn {
    fn default() -> Self {
        Self::all()
    }
}

/// Side-effect executor of one entity store.
pub struct EffectRunner<T: Entity> {
    api: Arc<dyn EntityApi<T>>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    settings: EntitySettings,
    policy: Arc<ErrorPolicy>,
    tasks: TaskManager<Message>,
    queue: MessageSender,
}

impl<T: Entity> EffectRunner<T> {
    pub fn new(
        api: Arc<dyn EntityApi<T>>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        settings: EntitySettings,
        policy: Arc<ErrorPolicy>,
        queue: MessageSender,
    ) -> Self {
        Self {
            api,
            notifier,
            navigator,
            settings,
            policy,
            tasks: TaskManager::new(queue.clone()),
            queue,
        }
    }

    pub fn settings(&self) -> &EntitySettings {
        &self.settings
    }

    /// Start the gateway call for `request`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn execute(&mut self, request: ApiRequest<T>) {
        tracing::debug!(entity = T::NAME, request = %request.id, "spawning gateway call");
        let api = Arc::clone(&self.api);
        let policy = Arc::clone(&self.policy);
        self.tasks.spawn(
            TaskKey::request(T::NAME, request.id.seq),
            async move { Message::new(call(api.as_ref(), &policy, request).await) },
        );
    }

    /// Fire-and-forget reactions to an outcome the store accepted.
    pub fn on_outcome(&self, action: &EntityAction<T>) {
        let settings = &self.settings;
        let flags = settings.notify_on;
        let messages = &settings.notifications;

        match action {
            EntityAction::CreateDidSucceed { entity, .. } => {
                if flags.contains(NotifyOn::CREATE) {
                    self.notify_success(&messages.created);
                }
                self.navigate_to(entity.id());
                self.refresh();
            }
            EntityAction::UpdateDidSucceed { entity, .. } => {
                if flags.contains(NotifyOn::UPDATE) {
                    self.notify_success(&messages.updated);
                }
                self.navigate_to(entity.id());
            }
            EntityAction::RemoveDidSucceed { .. } => {
                if flags.contains(NotifyOn::REMOVE) {
                    self.notify_success(&messages.removed);
                }
                self.refresh();
            }
            other => {
                if let Some(error) = other.error() {
                    if flags.contains(NotifyOn::FAILURE) {
                        self.notifier.error(error);
                    }
                }
            }
        }
    }

    /// Abort every call still running for this store.
    pub fn cancel_pending(&mut self) {
        self.tasks.cancel_all();
    }

    /// Calls spawned and not yet finished.
    pub fn pending(&self) -> usize {
        self.tasks.running_keys().count()
    }

    fn notify_success(&self, template: &str) {
        self.notifier
            .success(&NotificationConfig::render(template, &self.settings.label));
    }

    fn navigate_to(&self, id: &str) {
        if self.settings.navigate_after_save {
            self.navigator.go_to(&self.settings.detail_path(id), &[]);
        }
    }

    fn refresh(&self) {
        if self.settings.refresh_after_mutation {
            // Receiver gone means the root is shutting down
            let _ = self.queue.send(Message::new(EntityAction::<T>::Reload));
        }
    }
}

/// Perform one gateway call and wrap the result into its outcome.
pub(crate) async fn call<T: Entity>(
    api: &dyn EntityApi<T>,
    policy: &ErrorPolicy,
    request: ApiRequest<T>,
) -> EntityAction<T> {
    let ApiRequest { id: request, op } = request;
    let fail = |error: ApiError| {
        tracing::warn!(
            entity = T::NAME,
            %request,
            status = ?error.status,
            error = %error,
            "gateway call failed"
        );
        policy.normalize(&error)
    };

    match op {
        ApiOp::List(query) => match api.list(&query).await {
            Ok(page) => EntityAction::ListDidLoad { request, page },
            Err(e) => EntityAction::ListDidError { request, error: fail(e) },
        },
        ApiOp::Search(query) => match api.search(&query).await {
            Ok(page) => EntityAction::SearchDidLoad { request, page },
            Err(e) => EntityAction::SearchDidError { request, error: fail(e) },
        },
        ApiOp::Get { id } => match api.get(&id).await {
            Ok(entity) => EntityAction::FetchDidLoad { request, entity },
            Err(e) => EntityAction::FetchDidError { request, error: fail(e) },
        },
        ApiOp::Create(input) => match api.create(&input).await {
            Ok(entity) => EntityAction::CreateDidSucceed { request, entity },
            Err(e) => EntityAction::CreateDidError { request, error: fail(e) },
        },
        ApiOp::Update { id, input } => match api.update(&id, &input).await {
            Ok(entity) => EntityAction::UpdateDidSucceed { request, entity },
            Err(e) => EntityAction::UpdateDidError { request, error: fail(e) },
        },
        ApiOp::Remove { id } => match api.remove(&id).await {
            Ok(()) => EntityAction::RemoveDidSucceed { request, id },
            Err(e) => EntityAction::RemoveDidError { request, error: fail(e) },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{RequestId, RequestKind};
    use crate::page::{ListQuery, Page, SearchQuery};
    use crate::testing::{MemoryApi, Notice, RecordingNavigator, RecordingNotifier};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, PartialEq)]
    struct Centre {
        id: String,
        name: String,
    }

    impl Entity for Centre {
        type Input = String;
        const NAME: &'static str = "centre";

        fn id(&self) -> &str {
            &self.id
        }
    }

    fn api() -> Arc<MemoryApi<Centre>> {
        Arc::new(
            MemoryApi::<Centre>::new(|id, name: &String| Centre {
                id: id.to_string(),
                name: name.clone(),
            })
            .with_search(|centre, term| centre.name.contains(term))
            .with_records(vec![
                Centre {
                    id: "c1".into(),
                    name: "Nord".into(),
                },
                Centre {
                    id: "c2".into(),
                    name: "Sud".into(),
                },
            ]),
        )
    }

    struct Fixture {
        runner: EffectRunner<Centre>,
        api: Arc<MemoryApi<Centre>>,
        notifier: Arc<RecordingNotifier>,
        navigator: Arc<RecordingNavigator>,
        rx: mpsc::UnboundedReceiver<Message>,
    }

    fn fixture(settings: EntitySettings) -> Fixture {
        let api = api();
        let notifier = Arc::new(RecordingNotifier::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = EffectRunner::new(
            api.clone(),
            notifier.clone(),
            navigator.clone(),
            settings,
            Arc::new(ErrorPolicy::default()),
            tx,
        );
        Fixture {
            runner,
            api,
            notifier,
            navigator,
            rx,
        }
    }

    fn request(kind: RequestKind, seq: u64, op: ApiOp<Centre>) -> ApiRequest<Centre> {
        ApiRequest {
            id: RequestId::new(kind, seq),
            op,
        }
    }

    async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<Message>) -> EntityAction<Centre> {
        rx.recv()
            .await
            .and_then(Message::into_action::<Centre>)
            .expect("outcome")
    }

    #[tokio::test]
    async fn test_list_emits_one_outcome_with_same_id() {
        let mut f = fixture(EntitySettings::for_entity("centre"));
        f.runner
            .execute(request(RequestKind::List, 7, ApiOp::List(ListQuery::page(0, 10))));

        match next_outcome(&mut f.rx).await {
            EntityAction::ListDidLoad { request, page } => {
                assert_eq!(request, RequestId::new(RequestKind::List, 7));
                assert_eq!(page.content.len(), 2);
                assert_eq!(page.total_elements, 2);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(f.api.calls(), 1);
        assert!(f.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_search_uses_gateway_search() {
        let mut f = fixture(EntitySettings::for_entity("centre"));
        f.runner.execute(request(
            RequestKind::Search,
            1,
            ApiOp::Search(SearchQuery::new("Sud", 0, 10)),
        ));

        match next_outcome(&mut f.rx).await {
            EntityAction::SearchDidLoad { page, .. } => {
                assert_eq!(
                    page.content,
                    vec![Centre {
                        id: "c2".into(),
                        name: "Sud".into()
                    }]
                );
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_is_normalized() {
        let mut f = fixture(EntitySettings::for_entity("centre"));
        f.runner.execute(request(
            RequestKind::Get,
            2,
            ApiOp::Get {
                id: "missing".into(),
            },
        ));

        let outcome = next_outcome(&mut f.rx).await;
        assert_eq!(
            outcome,
            EntityAction::FetchDidError {
                request: RequestId::new(RequestKind::Get, 2),
                error: "Resource not found".into(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_drops_outcomes() {
        let mut f = fixture(EntitySettings::for_entity("centre"));
        f.api.set_latency(Duration::from_secs(1));
        f.runner
            .execute(request(RequestKind::List, 1, ApiOp::List(ListQuery::page(0, 10))));
        assert_eq!(f.runner.pending(), 1);

        f.runner.cancel_pending();
        assert_eq!(f.runner.pending(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(f.rx.try_recv().is_err());
    }

    #[test]
    fn test_create_success_notifies_and_navigates() {
        let mut f = fixture(EntitySettings::for_entity("centre"));
        let centre = Centre {
            id: "c9".into(),
            name: "Est".into(),
        };
        f.runner.on_outcome(&EntityAction::CreateDidSucceed {
            request: RequestId::new(RequestKind::Create, 1),
            entity: centre,
        });

        assert_eq!(f.notifier.notices(), vec![Notice::Success("centre created".into())]);
        assert_eq!(f.navigator.paths(), vec!["/centres/c9".to_string()]);
        // No refresh unless configured
        assert!(f.rx.try_recv().is_err());
    }

    #[test]
    fn test_failure_notifies_without_navigation() {
        let f = fixture(EntitySettings::for_entity("centre"));
        f.runner.on_outcome(&EntityAction::UpdateDidError {
            request: RequestId::new(RequestKind::Update, 3),
            error: "Insufficient rights".into(),
        });

        assert_eq!(f.notifier.notices(), vec![Notice::Error("Insufficient rights".into())]);
        assert!(f.navigator.paths().is_empty());
    }

    #[test]
    fn test_notify_on_flags_and_refresh() {
        let mut settings = EntitySettings::for_entity("centre");
        settings.notify_on = NotifyOn::FAILURE;
        settings.refresh_after_mutation = true;
        let mut f = fixture(settings);

        f.runner.on_outcome(&EntityAction::RemoveDidSucceed {
            request: RequestId::new(RequestKind::Remove, 4),
            id: "c1".into(),
        });
        f.runner.on_outcome(&EntityAction::ListDidLoad {
            request: RequestId::new(RequestKind::List, 5),
            page: Page::empty(10),
        });

        assert!(f.notifier.notices().is_empty());
        let queued = f.rx.try_recv().expect("reload queued");
        assert_eq!(queued.downcast_ref::<Centre>(), Some(&EntityAction::Reload));
        assert!(f.rx.try_recv().is_err());
    }
}
