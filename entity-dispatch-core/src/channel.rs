//! Type-erased message envelope and the outcome queue
//!
//! Every entity store speaks its own `EntityAction<T>`. The root routes
//! them as [`Message`]s so that one middleware chain and one queue serve
//! all stores.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::action::{Action, ActionSummary};
use crate::entity::{Entity, EntityAction};

/// An [`EntityAction`] addressed to the store named `entity`.
#[derive(Clone)]
pub struct Message {
    entity: &'static str,
    name: &'static str,
    summary: String,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Message {
    pub fn new<T: Entity>(action: EntityAction<T>) -> Self {
        Self {
            entity: T::NAME,
            name: action.name(),
            summary: action.summary(),
            payload: Arc::new(action),
        }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Borrow the payload as an action of store `T`.
    pub fn downcast_ref<T: Entity>(&self) -> Option<&EntityAction<T>> {
        self.payload.downcast_ref()
    }

    /// Take the payload back, cloning only if the message was shared.
    pub fn into_action<T: Entity>(self) -> Option<EntityAction<T>> {
        let payload = self.payload.downcast::<EntityAction<T>>().ok()?;
        Some(Arc::try_unwrap(payload).unwrap_or_else(|shared| (*shared).clone()))
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity, self.summary)
    }
}

impl Action for Message {
    fn name(&self) -> &'static str {
        self.name
    }

    fn scope(&self) -> Option<&'static str> {
        Some(self.entity)
    }
}

impl ActionSummary for Message {
    fn summary(&self) -> String {
        self.summary.clone()
    }
}

/// Sending half of the outcome queue, handed to effect runners.
pub type MessageSender = mpsc::UnboundedSender<Message>;

/// Unbounded FIFO of messages produced outside of `dispatch`.
#[derive(Debug)]
pub struct ActionChannel {
    tx: MessageSender,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Default for ActionChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> MessageSender {
        self.tx.clone()
    }

    /// Queue `action` for the next drain.
    pub fn push<T: Entity>(&self, action: EntityAction<T>) {
        // The receiver lives as long as `self`
        let _ = self.tx.send(Message::new(action));
    }

    /// Next queued message, if one is ready.
    pub fn try_next(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next message.
    pub async fn next(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}
