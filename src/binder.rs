use log::trace;

use crate::error::Result;
use crate::store::Store;
use crate::term::Term;
use crate::unify::{unify, Substitution};

/// What a success continuation wants the search to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep enumerating solutions.
    Continue,
    /// Stop the enumeration; the remaining alternatives are abandoned.
    Stop,
}

impl Flow {
    /// Whether the search should stop.
    #[must_use]
    pub fn is_stop(self) -> bool {
        self == Flow::Stop
    }
}

/// A success continuation, called once per solution with the store that
/// holds that solution's bindings.
pub type Continuation<'a> = dyn FnMut(&Store) -> Result<Flow> + 'a;

/// Install `substitution` on top of `store` and run `continuation` there.
///
/// An empty substitution runs the continuation on `store` itself. Otherwise
/// a new store version is built for the duration of the call. `store` is
/// never modified, so once this returns, normally or with an error, no trace
/// of the binding remains for alternatives tried afterwards. Errors from the
/// continuation are returned unchanged.
///
/// # Errors
///
/// Whatever `continuation` returns.
pub fn try_binding<F>(store: &Store, substitution: &Substitution, continuation: F) -> Result<Flow>
where
    F: FnOnce(&Store) -> Result<Flow>,
{
    if substitution.is_empty() {
        return continuation(store);
    }
    let next = store.with_substitution(substitution);
    if log::log_enabled!(log::Level::Trace) {
        for (reference, term) in substitution.iter() {
            trace!("bind {reference} = {:?}", next.reify(term));
        }
    }
    continuation(&next)
}

/// Unify two terms once and, on success, run `continuation` under the
/// resulting bindings. A failed unification runs nothing and yields
/// [`Flow::Continue`].
///
/// # Errors
///
/// Whatever `continuation` returns.
pub fn unify_and_run<F>(
    store: &Store,
    left: impl Into<Term>,
    right: impl Into<Term>,
    continuation: F,
) -> Result<Flow>
where
    F: FnOnce(&Store) -> Result<Flow>,
{
    match unify(store, &left.into(), &right.into()) {
        Some(substitution) => try_binding(store, &substitution, continuation),
        None => Ok(Flow::Continue),
    }
}
