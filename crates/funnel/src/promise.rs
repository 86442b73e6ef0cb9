//! Deferred-result handles and the constructor port that builds them.
//!
//! When a call is queued, the funnel asks its [`PromiseConstructor`] for a
//! fresh handle plus the [`Resolver`] that settles it. The handle goes back to
//! the caller straight away; the resolver travels with the queued call and is
//! consumed during the drain.
//!
//! The default constructor, [`OneshotPromise`], builds [`Deferred`] handles
//! backed by a `tokio::sync::oneshot` channel. Any other handle type can be
//! plugged in by implementing [`PromiseConstructor`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::DeferredError;

// ---------------------------------------------------------------------------
// Settle pair
// ---------------------------------------------------------------------------

/// The one-shot settle side of a deferred-result handle.
///
/// A resolver is consumed by exactly one of [`fulfill`](Self::fulfill),
/// [`reject`](Self::reject) or [`settle`](Self::settle). Dropping it unsettled
/// leaves what happens to the handle up to the constructor that built it;
/// [`Deferred`] reports [`DeferredError::Abandoned`].
pub struct Resolver<T, E> {
    settle: Box<dyn FnOnce(Result<T, E>) + Send>,
}

impl<T, E> Resolver<T, E> {
    /// Creates a resolver that hands the outcome to `settle`.
    pub fn new<F>(settle: F) -> Self
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        Self {
            settle: Box::new(settle),
        }
    }

    /// Settles the handle with a success value.
    pub fn fulfill(self, value: T) {
        self.settle(Ok(value));
    }

    /// Settles the handle with a failure value.
    pub fn reject(self, error: E) {
        self.settle(Err(error));
    }

    /// Settles the handle with `outcome`.
    pub fn settle(self, outcome: Result<T, E>) {
        (self.settle)(outcome);
    }
}

impl<T, E> std::fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Constructor port
// ---------------------------------------------------------------------------

/// Builds the handle returned to callers whose call was queued.
///
/// Implementations only decide the *type* callers receive while the gate is
/// held. They have no influence on immediate calls or on the futures targets
/// return.
pub trait PromiseConstructor: Send + Sync + 'static {
    /// Handle type for a call producing `Result<T, E>`.
    type Handle<T: Send + 'static, E: Send + 'static>;

    /// Creates an unsettled handle and the resolver that settles it.
    fn pending<T, E>(&self) -> (Self::Handle<T, E>, Resolver<T, E>)
    where
        T: Send + 'static,
        E: Send + 'static;
}

// ---------------------------------------------------------------------------
// Default constructor
// ---------------------------------------------------------------------------

/// The default [`PromiseConstructor`], producing [`Deferred`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneshotPromise;

impl PromiseConstructor for OneshotPromise {
    type Handle<T: Send + 'static, E: Send + 'static> = Deferred<T, E>;

    fn pending<T, E>(&self) -> (Self::Handle<T, E>, Resolver<T, E>)
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let resolver = Resolver::new(move |outcome| {
            // The caller may have dropped the handle; nobody is left to tell.
            let _ = tx.send(outcome);
        });
        (Deferred { rx }, resolver)
    }
}

/// A deferred result that settles when its queued call is drained.
///
/// Awaiting it yields the target's value, [`DeferredError::Rejected`] with the
/// target's failure, or [`DeferredError::Abandoned`] if the call was dropped
/// before it could run.
///
/// Abandonment depends on the funnel being dropped. A queued target that
/// captures a clone of its own [`Funnel`](crate::Funnel) (or a wrapped
/// function of it) keeps the gate alive through the queue. Such a funnel is
/// never dropped while that call waits, so its handle stays unsettled until
/// the funnel is released again.
#[derive(Debug)]
#[must_use = "a deferred result does nothing unless awaited or inspected"]
pub struct Deferred<T, E> {
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> Deferred<T, E> {
    /// Returns the outcome if the handle has already settled, without waiting.
    ///
    /// Returns `None` while the call is still queued or its future is still
    /// running. Once an outcome has been returned, later calls report
    /// [`DeferredError::Abandoned`].
    pub fn try_settled(&mut self) -> Option<Result<T, DeferredError<E>>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome.map_err(DeferredError::Rejected)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(DeferredError::Abandoned)),
        }
    }
}

impl<T, E> Future for Deferred<T, E> {
    type Output = Result<T, DeferredError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome.map_err(DeferredError::Rejected)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(DeferredError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fulfilled_handle_is_settled_immediately() {
        let (mut handle, resolver) = OneshotPromise.pending::<&str, String>();
        assert_eq!(handle.try_settled(), None);
        resolver.fulfill("done!");
        assert_eq!(handle.try_settled(), Some(Ok("done!")));
    }

    #[test]
    fn test_rejected_handle_carries_error() {
        let (mut handle, resolver) = OneshotPromise.pending::<(), String>();
        resolver.reject("done!".to_string());
        assert_eq!(
            handle.try_settled(),
            Some(Err(DeferredError::Rejected("done!".to_string())))
        );
    }

    #[test]
    fn test_dropped_resolver_abandons_handle() {
        let (mut handle, resolver) = OneshotPromise.pending::<(), String>();
        drop(resolver);
        assert_eq!(handle.try_settled(), Some(Err(DeferredError::Abandoned)));
    }

    #[test]
    fn test_settling_after_handle_dropped_is_harmless() {
        let (handle, resolver) = OneshotPromise.pending::<u8, String>();
        drop(handle);
        resolver.fulfill(1);
    }

    #[tokio::test]
    async fn test_awaiting_handle_yields_outcome() {
        let (handle, resolver) = OneshotPromise.pending::<u32, String>();
        tokio::spawn(async move { resolver.settle(Ok(42)) });
        assert_eq!(handle.await, Ok(42));
    }
}
