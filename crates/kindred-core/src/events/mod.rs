//! Document event system: the in-process trigger runtime.
//!
//! Writes that go through an evented store publish a [`DocumentEvent`] on a
//! bounded channel. A [`HookDispatcher`] drains that channel and hands each
//! event to every matching [`DocumentHook`] registered in the [`HookRegistry`].
//!
//! ```text
//!   store write ──► EventBroadcaster ──► HookDispatcher ──► HookRegistry
//!                   (bounded channel)                         │   │   │
//!                                                             ▼   ▼   ▼
//!                                                            hook tasks
//! ```
//!
//! Every hook runs in its own task with a timeout and panic protection, so a
//! slow or failing hook never blocks another hook. A full channel makes the
//! writer wait rather than drop the event. Delivery is
//! at-least-once from the hook's point of view: hooks must tolerate replays.
//!
//! ```ignore
//! use kindred_core::events::{EventBroadcaster, HookSystemBuilder};
//!
//! let broadcaster = EventBroadcaster::new_shared();
//! let registry = HookSystemBuilder::new()
//!     .register(interest_hook)
//!     .await
//!     .start(broadcaster.subscribe());
//! ```

pub mod broadcaster;
pub mod hooks;
pub mod registry;
pub mod types;

pub use broadcaster::{EventBroadcaster, EventReceiver};
pub use hooks::{DocumentHook, HookError};
pub use registry::{HookDispatcher, HookRegistry, HookSystemBuilder};
pub use types::{DocumentEvent, DocumentEventType};
