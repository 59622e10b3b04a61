//! Hooks around every dispatch of a [`StoreRoot`](crate::StoreRoot)
//!
//! Middleware sees each message twice: before the reducer runs and after,
//! with whether the state changed. Messages queued by gateway calls go
//! through the same hooks as intents dispatched by the application.

use crate::Action;

/// Observer of dispatched actions.
pub trait Middleware<A: Action> {
    fn before(&mut self, action: &A);

    fn after(&mut self, action: &A, state_changed: bool);
}

/// Middleware that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl<A: Action> Middleware<A> for NoopMiddleware {
    fn before(&mut self, _action: &A) {}
    fn after(&mut self, _action: &A, _state_changed: bool) {}
}

/// Logs dispatches through `tracing` at debug level, tagged with the
/// entity the action is addressed to.
///
/// Unlike [`ActionLoggerMiddleware`](crate::ActionLoggerMiddleware) there
/// is no filtering and nothing is kept in memory.
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    pub log_before: bool,
    pub log_after: bool,
    /// Skip actions that left the state untouched
    pub changes_only: bool,
}

impl LoggingMiddleware {
    /// Log after dispatch only
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
            changes_only: false,
        }
    }

    pub fn verbose() -> Self {
        Self {
            log_before: true,
            ..Self::new()
        }
    }

    pub fn changes_only(mut self) -> Self {
        self.changes_only = true;
        self
    }
}

impl<A: Action> Middleware<A> for LoggingMiddleware {
    fn before(&mut self, action: &A) {
        if self.log_before {
            tracing::debug!(
                entity = action.scope().unwrap_or("-"),
                action = action.name(),
                "dispatching"
            );
        }
    }

    fn after(&mut self, action: &A, state_changed: bool) {
        if !self.log_after || (self.changes_only && !state_changed) {
            return;
        }
        tracing::debug!(
            entity = action.scope().unwrap_or("-"),
            action = action.name(),
            state_changed,
            "dispatched"
        );
    }
}

/// Several middleware run as one.
///
/// `before` hooks run in insertion order, `after` hooks in reverse, so the
/// first middleware added wraps all the others.
pub struct ComposedMiddleware<A: Action> {
    middlewares: Vec<Box<dyn Middleware<A> + Send>>,
}

impl<A: Action> std::fmt::Debug for ComposedMiddleware<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("len", &self.middlewares.len())
            .finish()
    }
}

impl<A: Action> Default for ComposedMiddleware<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Action> ComposedMiddleware<A> {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add<M: Middleware<A> + Send + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl<A: Action> Middleware<A> for ComposedMiddleware<A> {
    fn before(&mut self, action: &A) {
        for middleware in &mut self.middlewares {
            middleware.before(action);
        }
    }

    fn after(&mut self, action: &A, state_changed: bool) {
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(action, state_changed);
        }
    }
}
