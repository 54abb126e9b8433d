//! A lightweight, self-hosted per-topic notification log with durable
//! history and live-tail delivery over WebSockets.
//!
//! Producers append opaque JSON payloads to named topics; consumers either
//! page through history with a `(generationID, fromIndex)` cursor or hold a
//! watch session that receives new entries as they arrive. Entries expire
//! individually once they outlive the configured retention.

mod config;
mod constants;
mod errors;
mod server;
mod store;
mod watch;

pub use config::*;
pub use errors::*;
pub use server::*;
pub use store::*;
pub use watch::*;
