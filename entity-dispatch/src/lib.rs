//! entity-dispatch: paginated entity caches for Rust clients
//!
//! Like Redux/Elm, but for REST collections. Each entity type gets the same
//! cache (current page, pagination, selection, per-kind loading, last
//! error), and every change goes through a dispatched action.
//!
//! # Example
//! ```ignore
//! use entity_dispatch::prelude::*;
//!
//! #[derive(Entity, Clone, Debug, PartialEq)]
//! #[entity(name = "patient", input = PatientInput)]
//! struct Patient {
//!     id: String,
//!     last_name: String,
//! }
//!
//! let mut root = StoreRoot::new(RuntimeConfig::default());
//! root.register::<Patient>(api, notifier, navigator)?;
//! root.dispatch::<Patient>(EntityAction::List(ListQuery::page(0, 20)))?;
//! ```

// Re-export everything from core
pub use entity_dispatch_core::*;

// Re-export derive macros
pub use entity_dispatch_macros::Entity;

/// Prelude for convenient imports
pub mod prelude {
    pub use entity_dispatch_core::prelude::*;

    // Derive macros
    pub use entity_dispatch_macros::Entity;
}
