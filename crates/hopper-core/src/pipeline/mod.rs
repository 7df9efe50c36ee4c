//! Arrival pipeline components.
//!
//! - **handler**: The per-arrival state machine
//! - **exclusive**: Token serializing handler bodies
//! - **settle**: Waits for a new descriptor to finish being written
//! - **dispatch**: Single-consumer queue feeding the handler
//! - **discovery**: Finds descriptors already sitting in the watch directory
//! - **channel**: Bounded channels for backpressure

pub mod channel;
pub mod discovery;
pub mod dispatch;
pub mod exclusive;
pub mod handler;
pub mod settle;

// Re-exports for convenient access
pub use discovery::pending_descriptors;
pub use dispatch::{DispatchStats, Pipeline, PipelineHandle};
pub use exclusive::{ExclusiveGuard, ExclusivityToken};
pub use handler::{ArrivalHandler, ArrivalOutcome, HandleArrival};
pub use settle::SettleOptions;
