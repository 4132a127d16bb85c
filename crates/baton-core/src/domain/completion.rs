//! Completion value: the final outcome of a task.
//!
//! This module is engine-agnostic: it does not know about executors, cells or
//! continuations. It only defines the "shape" of a finished result.

use std::fmt;

/// Application-level error carried by [`CompletionState::Error`].
///
/// Any error type can travel through a task chain, so the payload is erased
/// to a boxed trait object (the same shape `std::thread` and most of the
/// ecosystem use for "some error").
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a task: success with a value, or failure with an error.
///
/// Immutable once constructed. Ownership moves from the completer to the
/// continuation that observes it; it is never cloned by the engine.
pub enum CompletionState<T> {
    Done(T),
    Error(BoxError),
}

impl<T> CompletionState<T> {
    /// Build an `Error` from anything convertible into [`BoxError`].
    pub fn error(error: impl Into<BoxError>) -> Self {
        CompletionState::Error(error.into())
    }

    pub fn is_done(&self) -> bool {
        matches!(self, CompletionState::Done(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CompletionState::Error(_))
    }

    /// The success value, if any.
    pub fn result(&self) -> Option<&T> {
        match self {
            CompletionState::Done(v) => Some(v),
            CompletionState::Error(_) => None,
        }
    }

    /// The error, if any.
    pub fn error_ref(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            CompletionState::Done(_) => None,
            CompletionState::Error(e) => Some(e.as_ref()),
        }
    }

    pub fn into_result(self) -> Result<T, BoxError> {
        match self {
            CompletionState::Done(v) => Ok(v),
            CompletionState::Error(e) => Err(e),
        }
    }

    /// Map the success value, leaving an error untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CompletionState<U> {
        match self {
            CompletionState::Done(v) => CompletionState::Done(f(v)),
            CompletionState::Error(e) => CompletionState::Error(e),
        }
    }
}

impl<T, E> From<Result<T, E>> for CompletionState<T>
where
    E: Into<BoxError>,
{
    fn from(r: Result<T, E>) -> Self {
        match r {
            Ok(v) => CompletionState::Done(v),
            Err(e) => CompletionState::Error(e.into()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CompletionState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionState::Done(v) => f.debug_tuple("Done").field(v).finish(),
            CompletionState::Error(e) => f.debug_tuple("Error").field(&e.to_string()).finish(),
        }
    }
}
