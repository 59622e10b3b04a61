//! Effect-emitting reducers
//!
//! Reducers stay pure by *describing* the gateway calls they need instead of
//! performing them. An intent such as "load page 2" updates the bookkeeping
//! in state and returns an [`ApiRequest`](crate::ApiRequest) effect; the
//! [`EffectRunner`](crate::EffectRunner) executes it and feeds the outcome
//! back as another action.
//!
//! ```ignore
//! fn reducer(state: &mut S, action: A) -> DispatchResult<E>
//! ```
//!
//! # Example
//!
//! ```ignore
//! use entity_dispatch::{DispatchResult, EffectStore};
//!
//! let mut store = EffectStore::new(EntityState::<Patient>::default(), reduce::<Patient>);
//! let result = store.dispatch(EntityAction::List(ListQuery::page(0, 20)));
//!
//! assert!(result.changed);
//! for request in result.effects {
//!     runner.execute(request);
//! }
//! ```

use std::marker::PhantomData;

use crate::action::Action;

/// What a reducer reports back: whether the state moved, and the
/// requests it wants executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult<E> {
    /// Whether the state was modified by this action.
    pub changed: bool,
    /// Requests to execute once the new state is in place.
    pub effects: Vec<E>,
}

impl<E> Default for DispatchResult<E> {
    fn default() -> Self {
        Self::unchanged()
    }
}

impl<E> DispatchResult<E> {
    /// No state change and no effects.
    #[inline]
    pub fn unchanged() -> Self {
        Self {
            changed: false,
            effects: vec![],
        }
    }

    /// State changed, no effects.
    #[inline]
    pub fn changed() -> Self {
        Self {
            changed: true,
            effects: vec![],
        }
    }

    /// State changed and one request to run, the usual intent result.
    #[inline]
    pub fn changed_with(effect: E) -> Self {
        Self {
            changed: true,
            effects: vec![effect],
        }
    }

    /// No effects, change flag computed by the caller.
    #[inline]
    pub fn from_changed(changed: bool) -> Self {
        Self {
            changed,
            effects: vec![],
        }
    }

    /// Append one more request.
    #[inline]
    pub fn with(mut self, effect: E) -> Self {
        self.effects.push(effect);
        self
    }

    #[inline]
    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    /// Transform every effect, keeping the change flag.
    pub fn map<F, U>(self, f: F) -> DispatchResult<U>
    where
        F: FnMut(E) -> U,
    {
        DispatchResult {
            changed: self.changed,
            effects: self.effects.into_iter().map(f).collect(),
        }
    }
}

/// Reducer signature shared by every entity store.
pub type EffectReducer<S, A, E> = fn(&mut S, A) -> DispatchResult<E>;

/// A store whose reducer returns [`DispatchResult<E>`].
///
/// One `EffectStore` backs each registered entity type; the
/// [`StoreRoot`](crate::StoreRoot) owns them and hands the effects to the
/// matching runner.
pub struct EffectStore<S, A, E> {
    state: S,
    reducer: EffectReducer<S, A, E>,
    _marker: PhantomData<(A, E)>,
}

impl<S, A, E> EffectStore<S, A, E>
where
    A: Action,
{
    /// Store starting from `state`.
    pub fn new(state: S, reducer: EffectReducer<S, A, E>) -> Self {
        Self {
            state,
            reducer,
            _marker: PhantomData,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Direct access for seeding fixtures. Everything else goes through
    /// [`dispatch`](Self::dispatch).
    #[inline]
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Run the reducer. The caller owns the returned effects.
    #[inline]
    pub fn dispatch(&mut self, action: A) -> DispatchResult<E> {
        (self.reducer)(&mut self.state, action)
    }
}
