//! Gate state: the held flag, the queue of deferred calls, and the drain.
//!
//! Calls of any signature share one FIFO queue. Each queued call is boxed as a
//! [`QueuedCall`] trait object that knows how to invoke its target with the
//! arguments it captured and how to settle the caller's handle afterwards.
//!
//! The queue is never iterated in place. A release swaps it for an empty one
//! under the lock and drains the detached batch with the lock released, so a
//! target may freely hold the gate and queue further calls. Those land in the
//! fresh queue and wait for the next release.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tracing::{debug, debug_span, trace, warn};

use crate::{
    CallSeq, Completion, DrainFault, DrainPolicy, FunnelConfig, FunnelError, FunnelId, Resolver,
    Spawn,
};

/// Shared target of a wrapped function.
pub(crate) type Target<A, T, E> = Arc<dyn Fn(A) -> Completion<T, E> + Send + Sync>;

// ---------------------------------------------------------------------------
// Queued calls
// ---------------------------------------------------------------------------

/// A call waiting for the next release, with its types erased.
pub(crate) trait QueuedCall: Send {
    /// Sequence number the call was queued with.
    fn seq(&self) -> CallSeq;

    /// Invokes the target and routes its outcome to the caller's handle.
    ///
    /// Returns a fault for a synchronous failure (after rejecting the handle)
    /// or when the settlement task for a pending outcome could not be spawned.
    fn invoke(self: Box<Self>, spawner: &dyn Spawn) -> Result<(), DrainFault>;
}

/// One deferred invocation: target, captured arguments, settle pair.
pub(crate) struct PendingCall<A, T, E> {
    pub(crate) seq: CallSeq,
    pub(crate) target: Target<A, T, E>,
    pub(crate) arguments: A,
    pub(crate) settle: Resolver<T, E>,
}

impl<A, T, E> QueuedCall for PendingCall<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    fn seq(&self) -> CallSeq {
        self.seq
    }

    fn invoke(self: Box<Self>, spawner: &dyn Spawn) -> Result<(), DrainFault> {
        let PendingCall {
            target,
            arguments,
            settle,
            ..
        } = *self;

        match target(arguments) {
            Completion::Ready(Ok(value)) => {
                settle.fulfill(value);
                Ok(())
            }
            Completion::Ready(Err(error)) => {
                settle.reject(error);
                Err(DrainFault::Rejected)
            }
            Completion::Pending(future) => spawner
                .spawn(async move { settle.settle(future.await) }.boxed())
                .map_err(|err| DrainFault::Spawn {
                    reason: err.to_string(),
                }),
        }
    }
}

// ---------------------------------------------------------------------------
// Mutable state
// ---------------------------------------------------------------------------

type Queue = Vec<Box<dyn QueuedCall>>;

/// Held flag and queue. Only ever touched through [`Gate::state`].
#[derive(Default)]
pub(crate) struct GateState {
    held: bool,
    queue: Queue,
    next_seq: CallSeq,
    guards: usize,
}

impl GateState {
    pub(crate) fn is_held(&self) -> bool {
        self.held
    }

    /// Reserves the sequence number for the next queued call.
    pub(crate) fn next_seq(&mut self) -> CallSeq {
        self.next_seq.take_next()
    }

    pub(crate) fn enqueue(&mut self, call: Box<dyn QueuedCall>) {
        self.queue.push(call);
    }

    /// Opens the gate and detaches everything queued so far. Also reports
    /// whether the gate was held.
    fn open_and_take(&mut self) -> (bool, Queue) {
        let was_held = std::mem::replace(&mut self.held, false);
        (was_held, std::mem::take(&mut self.queue))
    }

    /// Puts an undrained remainder back ahead of anything queued since the
    /// drain began. The gate is held again whenever the queue is non-empty.
    fn requeue_front(&mut self, mut remainder: Queue) {
        remainder.append(&mut self.queue);
        self.queue = remainder;
        if !self.queue.is_empty() {
            self.held = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// The shared core behind a [`Funnel`](crate::Funnel) and its wrapped functions.
pub(crate) struct Gate {
    id: FunnelId,
    config: FunnelConfig,
    spawner: Arc<dyn Spawn>,
    state: Mutex<GateState>,
}

impl Gate {
    pub(crate) fn new(config: FunnelConfig, spawner: Arc<dyn Spawn>) -> Self {
        Self {
            id: FunnelId::new_random(),
            config,
            spawner,
            state: Mutex::new(GateState::default()),
        }
    }

    pub(crate) fn id(&self) -> FunnelId {
        self.id
    }

    /// Locks the state. Targets never run under this lock, so a poisoned
    /// lock still guards consistent data.
    pub(crate) fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn hold(&self) {
        self.hold_locked(&mut self.state());
    }

    fn hold_locked(&self, state: &mut GateState) {
        if !state.held {
            debug!(funnel = %self.id, "gate held");
        }
        state.held = true;
    }

    /// Holds the gate on behalf of a new hold guard.
    pub(crate) fn acquire_guard(&self) {
        let mut state = self.state();
        state.guards += 1;
        self.hold_locked(&mut state);
    }

    /// Gives up one hold guard. Returns `true` when no guard is left.
    pub(crate) fn release_guard(&self) -> bool {
        let mut state = self.state();
        state.guards = state.guards.saturating_sub(1);
        state.guards == 0
    }

    /// Opens the gate and drains the calls queued before this point under
    /// the configured drain policy.
    pub(crate) fn release(&self) -> Result<(), FunnelError> {
        self.drain(self.config.drain_policy)
    }

    /// Opens the gate and drains the calls queued before this point under
    /// `policy`.
    pub(crate) fn drain(&self, policy: DrainPolicy) -> Result<(), FunnelError> {
        let (was_held, batch) = self.state().open_and_take();
        debug!(funnel = %self.id, was_held, queued = batch.len(), "gate released");
        if batch.is_empty() {
            return Ok(());
        }

        let span = debug_span!(
            "funnel.release",
            funnel = %self.id,
            label = self.config.label.as_deref(),
            calls = batch.len(),
        );
        let _enter = span.enter();

        let mut calls = batch.into_iter().enumerate();
        while let Some((position, call)) = calls.next() {
            let seq = call.seq();
            trace!(%seq, position, "invoking queued call");

            let Err(fault) = call.invoke(self.spawner.as_ref()) else {
                continue;
            };

            match policy {
                DrainPolicy::Continue => {
                    warn!(%seq, position, %fault, "queued call faulted, continuing drain");
                }
                DrainPolicy::Halt => {
                    let remainder: Queue = calls.map(|(_, call)| call).collect();
                    let requeued = remainder.len();
                    self.state().requeue_front(remainder);
                    warn!(%seq, position, %fault, requeued, "queued call faulted, drain halted");
                    return Err(FunnelError::DrainHalted {
                        position,
                        seq,
                        requeued,
                        fault,
                    });
                }
            }
        }

        debug!("drain complete");
        Ok(())
    }
}

impl Drop for Gate {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !state.queue.is_empty() {
            warn!(
                funnel = %self.id,
                abandoned = state.queue.len(),
                "funnel dropped with calls still queued"
            );
        }
    }
}
