//! Return shapes of targets and wrapped functions.
//!
//! A target tells the gate whether its outcome is already known or still on
//! its way by returning a [`Completion`]. A wrapped function hands the caller
//! an [`Invocation`]: the target's own completion when the gate was open, or a
//! deferred-result handle when the call was queued.

use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::{Deferred, DeferredError};

// ---------------------------------------------------------------------------
// Target outcome
// ---------------------------------------------------------------------------

/// What a target produced when it was invoked.
pub enum Completion<T, E> {
    /// The outcome is final. `Err` is the synchronous-failure case.
    Ready(Result<T, E>),

    /// The outcome arrives later through this future.
    Pending(BoxFuture<'static, Result<T, E>>),
}

impl<T, E> Completion<T, E> {
    /// A final, successful outcome.
    pub fn ok(value: T) -> Self {
        Self::Ready(Ok(value))
    }

    /// A final, failed outcome.
    pub fn err(error: E) -> Self {
        Self::Ready(Err(error))
    }

    /// An outcome carried by `future`.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    /// Returns `true` for [`Completion::Pending`].
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Returns the outcome if it is already final.
    pub fn into_ready(self) -> Option<Result<T, E>> {
        match self {
            Self::Ready(result) => Some(result),
            Self::Pending(_) => None,
        }
    }

    /// Waits for the outcome, whichever variant carries it.
    pub async fn into_result(self) -> Result<T, E> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

impl<T, E> From<Result<T, E>> for Completion<T, E> {
    fn from(result: Result<T, E>) -> Self {
        Self::Ready(result)
    }
}

impl<T, E> std::fmt::Debug for Completion<T, E>
where
    T: std::fmt::Debug,
    E: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Wrapped-call outcome
// ---------------------------------------------------------------------------

/// What a wrapped function hands back to its caller.
///
/// `H` is the handle type built by the funnel's
/// [`PromiseConstructor`](crate::PromiseConstructor).
#[derive(Debug)]
pub enum Invocation<T, E, H> {
    /// The gate was open and the target ran; this is its completion unchanged.
    Immediate(Completion<T, E>),

    /// The gate was held; the call is queued and `H` settles at the next release.
    Queued(H),
}

impl<T, E, H> Invocation<T, E, H> {
    /// Returns `true` if the call was queued rather than run.
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued(_))
    }

    /// Returns the target's completion if the call ran immediately.
    pub fn into_immediate(self) -> Option<Completion<T, E>> {
        match self {
            Self::Immediate(completion) => Some(completion),
            Self::Queued(_) => None,
        }
    }

    /// Returns the deferred-result handle if the call was queued.
    pub fn into_queued(self) -> Option<H> {
        match self {
            Self::Immediate(_) => None,
            Self::Queued(handle) => Some(handle),
        }
    }
}

impl<T, E> Invocation<T, E, Deferred<T, E>> {
    /// Waits for the call's outcome regardless of whether it was queued.
    ///
    /// Immediate failures are reported as [`DeferredError::Rejected`], so
    /// both paths share one error type.
    pub async fn settled(self) -> Result<T, DeferredError<E>> {
        match self {
            Self::Immediate(completion) => {
                completion.into_result().await.map_err(DeferredError::Rejected)
            }
            Self::Queued(handle) => handle.await,
        }
    }
}
