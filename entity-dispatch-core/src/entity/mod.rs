//! Generic per-entity cache: actions, state, reducer and selectors.
//!
//! Every managed record type (patients, pregnancies, centres, users, ...)
//! gets the same machinery by implementing [`Entity`], usually through
//! `#[derive(Entity)]`.

mod action;
mod reducer;
pub mod selectors;
mod state;

use std::fmt::Debug;

pub use action::{ApiOp, ApiRequest, EntityAction, RequestId, RequestKind};
pub use reducer::reduce;
pub use state::{EntityState, DEFAULT_PAGE_SIZE};

/// A backend record with a stable string identifier.
///
/// # Example
///
/// ```ignore
/// #[derive(Entity, Clone, Debug, PartialEq, Serialize, Deserialize)]
/// #[entity(name = "patient", input = PatientInput)]
/// struct Patient {
///     id: String,
///     last_name: String,
/// }
/// ```
pub trait Entity: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Payload accepted by `create` and `update`.
    type Input: Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Unique store name, also used for routes and log fields.
    const NAME: &'static str;

    fn id(&self) -> &str;
}
