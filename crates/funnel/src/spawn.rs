//! The executor seam used to settle handles of asynchronous targets.
//!
//! When a drained target returns [`Completion::Pending`](crate::Completion),
//! the gate does not wait for it. It wraps the future in a task that settles
//! the call's handle and gives that task to a [`Spawn`] implementation, then
//! moves on to the next queued call.

use futures::future::BoxFuture;
use tokio::runtime::Handle;

use crate::FunnelError;

/// Runs settlement tasks to completion on some executor.
pub trait Spawn: Send + Sync {
    /// Schedules `task`. The task must not be polled inline.
    ///
    /// On failure the task is dropped.
    fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<(), FunnelError>;
}

/// Spawns settlement tasks on a tokio runtime.
///
/// The runtime of the releasing thread is preferred. If `release()` runs
/// outside any runtime, the runtime that was current when this spawner was
/// created is used instead, when there was one. `TokioSpawn::default()` has
/// no such fallback.
#[derive(Debug, Clone, Default)]
pub struct TokioSpawn {
    fallback: Option<Handle>,
}

impl TokioSpawn {
    /// Creates a spawner, remembering the current runtime if there is one.
    pub fn new() -> Self {
        Self {
            fallback: Handle::try_current().ok(),
        }
    }

    /// Creates a spawner that falls back to `handle`.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            fallback: Some(handle),
        }
    }
}

impl Spawn for TokioSpawn {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> Result<(), FunnelError> {
        let handle = match Handle::try_current() {
            Ok(current) => current,
            Err(err) => self
                .fallback
                .clone()
                .ok_or_else(|| FunnelError::NoRuntime {
                    reason: err.to_string(),
                })?,
        };
        // Settlement tasks report through the handle, not the join handle.
        drop(handle.spawn(task));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use futures::FutureExt;

    use super::*;

    #[test]
    fn test_spawn_without_runtime_fails() {
        let spawner = TokioSpawn::default();
        let err = spawner.spawn(async {}.boxed()).unwrap_err();
        assert!(matches!(err, FunnelError::NoRuntime { .. }));
    }

    #[test]
    fn test_spawn_uses_fallback_runtime_outside_context() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let spawner = TokioSpawn::with_handle(runtime.handle().clone());
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let (tx, rx) = tokio::sync::oneshot::channel();

        spawner
            .spawn(
                async move {
                    flag.store(true, Ordering::SeqCst);
                    let _ = tx.send(());
                }
                .boxed(),
            )
            .unwrap();

        runtime.block_on(rx).unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_spawn_inside_runtime_runs_task() {
        let spawner = TokioSpawn::default();
        let (tx, rx) = tokio::sync::oneshot::channel();
        spawner
            .spawn(
                async move {
                    let _ = tx.send(7_u8);
                }
                .boxed(),
            )
            .unwrap();
        assert_eq!(rx.await, Ok(7));
    }
}
