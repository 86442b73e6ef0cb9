//! The public facade: build a funnel, wrap functions, hold and release.

use std::sync::Arc;

use tracing::{error, trace};

use crate::gate::{Gate, PendingCall, Target};
use crate::{
    Completion, DrainPolicy, FunnelConfig, FunnelError, FunnelId, Invocation, OneshotPromise,
    PromiseConstructor, Spawn, TokioSpawn,
};

// ---------------------------------------------------------------------------
// Construction options
// ---------------------------------------------------------------------------

/// Everything a [`Funnel`] is built from.
///
/// ```
/// use funnel::{DrainPolicy, Funnel, FunnelConfig, FunnelOptions};
///
/// let config = FunnelConfig::default().with_drain_policy(DrainPolicy::Continue);
/// let funnel = Funnel::with_options(FunnelOptions::new().config(config));
/// funnel.hold();
/// funnel.release().unwrap();
/// ```
pub struct FunnelOptions<P = OneshotPromise> {
    promise_constructor: P,
    spawner: Arc<dyn Spawn>,
    config: FunnelConfig,
}

impl FunnelOptions<OneshotPromise> {
    /// Default options: [`OneshotPromise`] handles, a [`TokioSpawn`] spawner
    /// and the default [`FunnelConfig`].
    pub fn new() -> Self {
        Self {
            promise_constructor: OneshotPromise,
            spawner: Arc::new(TokioSpawn::new()),
            config: FunnelConfig::default(),
        }
    }
}

impl Default for FunnelOptions<OneshotPromise> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> FunnelOptions<P> {
    /// Replaces the constructor used for handles of queued calls.
    pub fn promise_constructor<Q: PromiseConstructor>(self, constructor: Q) -> FunnelOptions<Q> {
        FunnelOptions {
            promise_constructor: constructor,
            spawner: self.spawner,
            config: self.config,
        }
    }

    /// Replaces the spawner that drives pending outcomes during a drain.
    #[must_use]
    pub fn spawner(mut self, spawner: impl Spawn + 'static) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    /// Replaces the data-only configuration.
    #[must_use]
    pub fn config(mut self, config: FunnelConfig) -> Self {
        self.config = config;
        self
    }
}

// ---------------------------------------------------------------------------
// Funnel
// ---------------------------------------------------------------------------

/// A gate that runs wrapped calls immediately while open and queues them
/// while held.
///
/// Cloning a funnel yields another handle to the same gate.
///
/// ```
/// use std::convert::Infallible;
/// use std::sync::{Arc, Mutex};
///
/// use funnel::{Completion, Funnel};
///
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let funnel = Funnel::new();
/// let record = {
///     let log = Arc::clone(&log);
///     funnel.wrap(move |entry: &'static str| {
///         log.lock().unwrap().push(entry);
///         Completion::<(), Infallible>::ok(())
///     })
/// };
///
/// let _ = record.call("a");
/// funnel.hold();
/// let _ = record.call("b");
/// assert_eq!(*log.lock().unwrap(), ["a"]);
///
/// funnel.release().unwrap();
/// assert_eq!(*log.lock().unwrap(), ["a", "b"]);
/// ```
pub struct Funnel<P: PromiseConstructor = OneshotPromise> {
    gate: Arc<Gate>,
    promise: Arc<P>,
}

impl Funnel<OneshotPromise> {
    /// Creates an open funnel with default options.
    pub fn new() -> Self {
        Self::with_options(FunnelOptions::new())
    }
}

impl Default for Funnel<OneshotPromise> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PromiseConstructor> Clone for Funnel<P> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            promise: Arc::clone(&self.promise),
        }
    }
}

impl<P: PromiseConstructor> Funnel<P> {
    /// Creates an open funnel from `options`.
    pub fn with_options(options: FunnelOptions<P>) -> Self {
        Self {
            gate: Arc::new(Gate::new(options.config, options.spawner)),
            promise: Arc::new(options.promise_constructor),
        }
    }

    /// Identifier attached to this funnel's log output.
    pub fn id(&self) -> FunnelId {
        self.gate.id()
    }

    /// Wraps `target` so its calls go through this funnel.
    ///
    /// Multiple arguments are passed as a tuple.
    pub fn wrap<F, A, T, E>(&self, target: F) -> Wrapped<A, T, E, P>
    where
        F: Fn(A) -> Completion<T, E> + Send + Sync + 'static,
        A: Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        Wrapped {
            gate: Arc::clone(&self.gate),
            promise: Arc::clone(&self.promise),
            target: Arc::new(target),
        }
    }

    /// Holds the gate. Calls made from now on are queued.
    ///
    /// Holding an already-held gate changes nothing.
    #[doc(alias = "cork")]
    pub fn hold(&self) {
        self.gate.hold();
    }

    /// Opens the gate and runs every call queued before this point, oldest
    /// first, before returning.
    ///
    /// Queued targets that return a pending future are not awaited; their
    /// outcome is forwarded to the caller's handle by a spawned task. Calls
    /// queued while the drain is running wait for the next release.
    ///
    /// Releasing an open gate or an empty queue does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::DrainHalted`] when a queued call faults under
    /// [`DrainPolicy::Halt`](crate::DrainPolicy::Halt). The gate is then held
    /// again with the uninvoked calls at the front of the queue.
    #[doc(alias = "uncork")]
    pub fn release(&self) -> Result<(), FunnelError> {
        self.gate.release()
    }

    /// Holds the gate until the returned guard is dropped or released.
    ///
    /// Guards nest: the gate is released when the last live guard goes away.
    /// An explicit [`release`](Self::release) still opens the gate at once.
    pub fn hold_guard(&self) -> HoldGuard {
        self.gate.acquire_guard();
        HoldGuard {
            gate: Some(Arc::clone(&self.gate)),
        }
    }
}

// ---------------------------------------------------------------------------
// Wrapped function
// ---------------------------------------------------------------------------

/// A function routed through a [`Funnel`].
pub struct Wrapped<A, T, E, P: PromiseConstructor = OneshotPromise> {
    gate: Arc<Gate>,
    promise: Arc<P>,
    target: Target<A, T, E>,
}

impl<A, T, E, P: PromiseConstructor> Clone for Wrapped<A, T, E, P> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            promise: Arc::clone(&self.promise),
            target: Arc::clone(&self.target),
        }
    }
}

impl<A, T, E, P> Wrapped<A, T, E, P>
where
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    P: PromiseConstructor,
{
    /// Calls the target now if the gate is open, otherwise queues the call.
    ///
    /// An open gate returns the target's own [`Completion`] untouched. A held
    /// gate returns a handle from the funnel's [`PromiseConstructor`] which
    /// settles when a later release drains this call. The constructor runs
    /// while the gate's lock is held and must not call back into the funnel.
    pub fn call(&self, arguments: A) -> Invocation<T, E, P::Handle<T, E>> {
        let mut state = self.gate.state();
        if !state.is_held() {
            drop(state);
            return Invocation::Immediate((self.target)(arguments));
        }

        let (handle, settle) = self.promise.pending::<T, E>();
        let seq = state.next_seq();
        state.enqueue(Box::new(PendingCall {
            seq,
            target: Arc::clone(&self.target),
            arguments,
            settle,
        }));
        trace!(funnel = %self.gate.id(), %seq, "call queued");

        Invocation::Queued(handle)
    }
}

// ---------------------------------------------------------------------------
// Hold guard
// ---------------------------------------------------------------------------

/// Keeps a funnel held for as long as it lives.
///
/// Guards from the same funnel are counted, and only the last one to go
/// releases the gate. Dropping that guard drains the whole queue under
/// [`DrainPolicy::Continue`], whatever the configured policy, so the gate is
/// never left held without an owner. Faults still reach the failing calls'
/// handles. Use [`HoldGuard::release`] to drain under the configured policy
/// and observe the error instead.
#[must_use = "dropping the guard releases the gate immediately"]
pub struct HoldGuard {
    gate: Option<Arc<Gate>>,
}

impl HoldGuard {
    /// Gives up this guard, releasing the gate if it was the last one.
    ///
    /// # Errors
    ///
    /// See [`Funnel::release`]. After a halted drain the gate is held again
    /// and no guard owns it; call [`Funnel::release`] to resume.
    pub fn release(mut self) -> Result<(), FunnelError> {
        match self.gate.take() {
            Some(gate) if gate.release_guard() => gate.release(),
            _ => Ok(()),
        }
    }
}

impl Drop for HoldGuard {
    fn drop(&mut self) {
        let Some(gate) = self.gate.take() else {
            return;
        };
        if !gate.release_guard() {
            return;
        }
        if let Err(err) = gate.drain(DrainPolicy::Continue) {
            error!(funnel = %gate.id(), error = %err, "release on guard drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter(funnel: &Funnel) -> (Wrapped<(), usize, Infallible>, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let wrapped = funnel.wrap(move |()| Completion::ok(seen.fetch_add(1, Ordering::SeqCst) + 1));
        (wrapped, hits)
    }

    #[test]
    fn test_open_funnel_returns_target_result() {
        let funnel = Funnel::new();
        let (wrapped, hits) = counter(&funnel);

        let invocation = wrapped.call(());
        assert!(!invocation.is_queued());
        assert_eq!(invocation.into_immediate().unwrap().into_ready(), Some(Ok(1)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_held_funnel_returns_handle_without_running_target() {
        let funnel = Funnel::new();
        let (wrapped, hits) = counter(&funnel);
        funnel.hold();

        let mut handle = wrapped.call(()).into_queued().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(handle.try_settled(), None);

        funnel.release().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(handle.try_settled(), Some(Ok(1)));
    }

    #[test]
    fn test_hold_is_idempotent() {
        let funnel = Funnel::new();
        let (wrapped, hits) = counter(&funnel);
        funnel.hold();
        let _first = wrapped.call(());
        funnel.hold();
        let _second = wrapped.call(());

        funnel.release().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clones_share_one_gate() {
        let funnel = Funnel::new();
        let other = funnel.clone();
        let (wrapped, hits) = counter(&funnel);
        assert_eq!(funnel.id(), other.id());

        other.hold();
        let _queued = wrapped.call(());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        other.release().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hold_guard_releases_on_drop() {
        let funnel = Funnel::new();
        let (wrapped, hits) = counter(&funnel);
        {
            let _guard = funnel.hold_guard();
            let _queued = wrapped.call(());
            assert_eq!(hits.load(Ordering::SeqCst), 0);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!wrapped.call(()).is_queued());
    }

    #[test]
    fn test_nested_guards_hold_until_outer_drops() {
        let funnel = Funnel::new();
        let (wrapped, hits) = counter(&funnel);
        let outer = funnel.hold_guard();
        {
            let _inner = funnel.hold_guard();
            let _queued = wrapped.call(());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(wrapped.call(()).is_queued());

        drop(outer);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(!wrapped.call(()).is_queued());
    }

    #[test]
    fn test_inner_guard_explicit_release_keeps_gate_held() {
        let funnel = Funnel::new();
        let (wrapped, hits) = counter(&funnel);
        let outer = funnel.hold_guard();
        let inner = funnel.hold_guard();
        let _queued = wrapped.call(());

        inner.release().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        outer.release().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hold_guard_explicit_release_reports_result() {
        let funnel = Funnel::new();
        let (wrapped, hits) = counter(&funnel);
        let guard = funnel.hold_guard();
        let _queued = wrapped.call(());

        guard.release().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
