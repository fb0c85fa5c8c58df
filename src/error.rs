use thiserror::Error;

use crate::term::Reference;

/// Errors surfaced by term inspection and by success continuations.
///
/// A failed unification is not an error: it is reported as `None` and simply
/// contributes no solutions.
#[derive(Error, Debug)]
pub enum Error {
    /// The value or structure of a still-unbound variable was requested.
    #[error("variable {0} is not bound")]
    UnboundAccess(Reference),

    /// A term had the wrong shape for the requested operation.
    #[error("expected {expected}, found {found}")]
    ShapeMismatch {
        /// The shape the operation needed.
        expected: &'static str,
        /// The shape actually found.
        found: &'static str,
    },

    /// An error raised inside a success continuation.
    #[error(transparent)]
    Continuation(#[from] anyhow::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
