//! # Rill Server
//!
//! The HTTP surface of the Rill event-streaming broker:
//!
//! - `/subscriptions` - managed subscription lifecycle
//! - `/event-types/{name}/events` - the raw, cursor-driven
//!   consumption stream (`application/x-json-stream`)
//!
//! Handlers stay thin: request binding, problem mapping, and response
//! headers live here; the semantics live in `rill-core`.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Request handlers.
pub mod handlers;

/// RFC 7807 problem responses.
pub mod problem;

/// Router assembly.
pub mod router;

/// Shared handler state.
pub mod state;

pub use router::build_router;
pub use state::AppState;
