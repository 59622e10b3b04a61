//! Action traits for type-safe state mutations

use std::fmt::Debug;

/// Marker trait for messages that can be dispatched to a store
///
/// Actions are either intents (a request to load, create, update or remove)
/// or outcomes (the result of a previously dispatched intent). They should be:
/// - Clone: Actions may be logged, replayed, or sent to multiple handlers
/// - Debug: For debugging and logging
/// - Send + 'static: Outcomes are produced on tokio tasks
pub trait Action: Clone + Debug + Send + 'static {
    /// Get the action name for logging and filtering
    fn name(&self) -> &'static str;

    /// Store the action is addressed to, if any. Used to qualify log
    /// entries as `patient/ListDidLoad`.
    fn scope(&self) -> Option<&'static str> {
        None
    }
}

/// Short, log-friendly description of an action.
///
/// The default uses `Debug`, which is fine for intents but noisy for
/// outcomes carrying whole pages of records. Override it where needed.
pub trait ActionSummary: Action {
    /// One-line summary for the action log
    fn summary(&self) -> String {
        format!("{:?}", self)
    }
}
