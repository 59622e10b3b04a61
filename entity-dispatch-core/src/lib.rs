//! Core traits and types for entity-dispatch
//!
//! This crate provides a generic state-synchronization layer between a
//! client application and a paginated REST backend: one cache per entity
//! type, driven by a Redux/Elm-inspired reducer.
//!
//! # Core Concepts
//!
//! - **Entity**: a record type with a string id, see [`Entity`]
//! - **EntityAction**: intents (`List`, `Create`, ...) and their `*Did*` outcomes
//! - **EntityState**: cached page, pagination, selection, loading and error status
//! - **EffectRunner**: executes gateway requests declared by the reducer
//! - **StoreRoot**: registry of entity stores with a single dispatch path
//! - **Selectors**: pure reads of derived data
//!
//! # Basic Example
//!
//! ```ignore
//! use entity_dispatch_core::prelude::*;
//!
//! let mut root = StoreRoot::new(RuntimeConfig::default());
//! root.register::<Patient>(api, notifier, navigator)?;
//!
//! root.dispatch::<Patient>(EntityAction::List(ListQuery::page(0, 20)))?;
//! // ... later, on the event loop
//! root.process_pending();
//!
//! let patients = root.select(select_all::<Patient>)?;
//! ```
//!
//! # Async Request Pattern
//!
//! Intents never block. The reducer records what was asked for, marks the
//! kind as loading and emits an [`ApiRequest`]. The runner spawns the call
//! and pushes the outcome (`ListDidLoad`, `CreateDidError`, ...) onto the
//! [`ActionChannel`]; the root dispatches it like any other action. Each
//! request carries a sequence number, so a slow list response never
//! overwrites a newer one.

pub mod action;
pub mod api;
pub mod channel;
pub mod config;
pub mod effect;
pub mod effects;
pub mod entity;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod log;
pub mod middleware;
pub mod page;
pub mod root;
pub mod sink;
pub mod tasks;
pub mod testing;

// Core trait exports
pub use action::{Action, ActionSummary};
pub use api::EntityApi;

// Entity exports
pub use entity::selectors;
pub use entity::{
    reduce, ApiOp, ApiRequest, Entity, EntityAction, EntityState, RequestId, RequestKind,
    DEFAULT_PAGE_SIZE,
};
pub use page::{total_pages, ListQuery, Page, Pagination, SearchQuery, SortDirection};

// Store exports
pub use channel::{ActionChannel, Message, MessageSender};
pub use effect::{DispatchResult, EffectReducer, EffectStore};
pub use effects::{EffectRunner, NotifyOn};
pub use middleware::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware};
pub use root::StoreRoot;
pub use tasks::{TaskKey, TaskManager};

// Configuration and errors
pub use config::{EntityConfig, EntitySettings, NotificationConfig, RuntimeConfig};
pub use error::{ApiError, ConfigError, ConflictRule, ErrorKind, ErrorPolicy, StoreError};

// Side-effect sinks and logging
pub use log::{
    glob_match, ActionLog, ActionLogConfig, ActionLogEntry, ActionLoggerConfig,
    ActionLoggerMiddleware,
};
pub use sink::{Navigator, Notifier, TracingNavigator, TracingNotifier};

#[cfg(feature = "http")]
pub use http::RestApi;

pub use tokio_util::sync::CancellationToken;

// Testing exports
pub use testing::{
    MemoryApi, Notice, RecordingNavigator, RecordingNotifier, TestHarness, Visit,
};

#[cfg(feature = "testing-time")]
pub use testing::{advance_time, pause_time, resume_time};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, ActionSummary};
    pub use crate::api::EntityApi;
    pub use crate::channel::{ActionChannel, Message};
    pub use crate::config::{EntityConfig, RuntimeConfig};
    pub use crate::effect::{DispatchResult, EffectStore};
    pub use crate::effects::{EffectRunner, NotifyOn};
    pub use crate::entity::selectors::*;
    pub use crate::entity::{
        ApiOp, ApiRequest, Entity, EntityAction, EntityState, RequestId, RequestKind,
    };
    pub use crate::error::{ApiError, ErrorPolicy, StoreError};
    pub use crate::log::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
    pub use crate::middleware::{ComposedMiddleware, LoggingMiddleware, Middleware};
    pub use crate::page::{ListQuery, Page, Pagination, SearchQuery, SortDirection};
    pub use crate::root::StoreRoot;
    pub use crate::sink::{Navigator, Notifier, TracingNavigator, TracingNotifier};
    pub use tokio_util::sync::CancellationToken;

    #[cfg(feature = "http")]
    pub use crate::http::RestApi;
}
