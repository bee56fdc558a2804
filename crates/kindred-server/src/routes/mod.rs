//! HTTP routes.
//!
//! - `health` - liveness, readiness and Prometheus metrics
//! - `notifications` - direct push dispatch
//! - `triggers` - document-created events from an external trigger runtime
//! - `documents` - document writes that fire the in-process triggers
//! - `maintenance` - operator-only counter maintenance and on-demand sweeps

pub mod documents;
pub mod health;
pub mod maintenance;
pub mod notifications;
pub mod triggers;
