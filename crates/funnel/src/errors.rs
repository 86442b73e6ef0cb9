//! Error types for gate operations and deferred results.
//!
//! [`FunnelError`] covers conditions reported by the gate itself: a drain that
//! was halted by a faulting call, a missing async runtime, or a configuration
//! that could not be parsed. Failures produced by wrapped targets are never
//! converted into a [`FunnelError`]; they reach the caller through the
//! target's own return value or through [`DeferredError::Rejected`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CallSeq;

// ---------------------------------------------------------------------------
// Drain faults
// ---------------------------------------------------------------------------

/// Why a single queued call faulted while the queue was being drained.
///
/// A fault is always delivered to the faulting call's own handle first. The
/// configured [`DrainPolicy`](crate::DrainPolicy) then decides whether the
/// rest of the drain goes on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DrainFault {
    /// The target returned a synchronous failure.
    ///
    /// The failure value itself has already been moved into the call's
    /// handle as a rejection.
    #[error("target failed synchronously")]
    Rejected,

    /// The target returned a pending future but the spawner refused the task
    /// that forwards its outcome to the handle.
    #[error("could not spawn settlement task: {reason}")]
    Spawn {
        /// Description reported by the spawner.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Gate-level errors
// ---------------------------------------------------------------------------

/// Errors reported by [`Funnel`](crate::Funnel) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FunnelError {
    /// A queued call faulted and the drain stopped under
    /// [`DrainPolicy::Halt`](crate::DrainPolicy::Halt).
    ///
    /// The calls after the faulting one were put back at the front of the
    /// queue and the gate is held again; the next release resumes with them.
    #[error("drain halted at position {position} (call {seq}): {fault}; {requeued} call(s) requeued")]
    DrainHalted {
        /// Zero-based position of the faulting call within the drained batch.
        position: usize,
        /// Sequence number the faulting call was queued with.
        seq: CallSeq,
        /// Number of not-yet-invoked calls that were put back on the queue.
        requeued: usize,
        /// What went wrong with the faulting call.
        fault: DrainFault,
    },

    /// No tokio runtime was available to drive a pending target future.
    #[error("no async runtime available: {reason}")]
    NoRuntime {
        /// Description of the runtime lookup failure.
        reason: String,
    },

    /// A [`FunnelConfig`](crate::FunnelConfig) could not be parsed.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Deferred-result errors
// ---------------------------------------------------------------------------

/// Failure outcome of a [`Deferred`](crate::Deferred) handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeferredError<E> {
    /// The target failed, synchronously or asynchronously, with this value.
    ///
    /// The value is passed through unchanged.
    #[error("deferred call rejected: {0}")]
    Rejected(E),

    /// The queued call was dropped before it could settle, e.g. because its
    /// funnel was dropped while still holding it.
    #[error("deferred call was abandoned before it settled")]
    Abandoned,
}

impl<E> DeferredError<E> {
    /// Returns `true` if the call never produced an outcome.
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned)
    }

    /// Returns the target's failure value, if there is one.
    pub fn into_rejection(self) -> Option<E> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Abandoned => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_halted_message_names_position_and_requeue_count() {
        let err = FunnelError::DrainHalted {
            position: 1,
            seq: CallSeq::new(4),
            requeued: 2,
            fault: DrainFault::Rejected,
        };
        assert_eq!(
            err.to_string(),
            "drain halted at position 1 (call #4): target failed synchronously; 2 call(s) requeued"
        );
    }

    #[test]
    fn test_deferred_error_preserves_rejection_value() {
        let err: DeferredError<String> = DeferredError::Rejected("done!".to_string());
        assert!(!err.is_abandoned());
        assert_eq!(err.to_string(), "deferred call rejected: done!");
        assert_eq!(err.into_rejection().as_deref(), Some("done!"));
    }

    #[test]
    fn test_abandoned_has_no_rejection() {
        let err: DeferredError<String> = DeferredError::Abandoned;
        assert!(err.is_abandoned());
        assert_eq!(err.into_rejection(), None);
    }
}
