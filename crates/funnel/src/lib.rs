//! Call gating for side-effecting functions.
//!
//! A [`Funnel`] is a gate with two states. While it is open, functions wrapped
//! with [`Funnel::wrap`] run as soon as they are called. While it is held,
//! calls are queued and the caller gets a deferred-result handle instead.
//! [`Funnel::release`] opens the gate again and runs the queued calls in the
//! order they were made, settling each caller's handle with the outcome.
//!
//! ```
//! use std::convert::Infallible;
//!
//! use funnel::{Completion, Funnel};
//!
//! let funnel = Funnel::new();
//! let double = funnel.wrap(|n: u32| Completion::<u32, Infallible>::ok(n * 2));
//!
//! funnel.hold();
//! let mut handle = double.call(21).into_queued().unwrap();
//! assert!(handle.try_settled().is_none());
//!
//! funnel.release().unwrap();
//! assert_eq!(handle.try_settled(), Some(Ok(42)));
//! ```
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`funnel`] | `Funnel`, `Wrapped`, `FunnelOptions`, `HoldGuard` |
//! | [`completion`] | Target and wrapped-call return shapes |
//! | [`promise`] | Deferred-result handles and the constructor port |
//! | [`spawn`] | Executor seam for asynchronous outcomes |
//! | [`config`] | Data-only configuration and drain policy |
//! | [`identifiers`] | `FunnelId`, `CallSeq` |
//! | [`errors`] | Gate and deferred-result error types |

pub mod completion;
pub mod config;
pub mod errors;
pub mod funnel;
mod gate;
pub mod identifiers;
pub mod promise;
pub mod spawn;

// Re-export everything at the crate root.
pub use completion::{Completion, Invocation};
pub use config::{DrainPolicy, FunnelConfig};
pub use errors::{DeferredError, DrainFault, FunnelError};
pub use funnel::{Funnel, FunnelOptions, HoldGuard, Wrapped};
pub use identifiers::{CallSeq, FunnelId};
pub use promise::{Deferred, OneshotPromise, PromiseConstructor, Resolver};
pub use spawn::{Spawn, TokioSpawn};
