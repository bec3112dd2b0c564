//! Bellwether delivery orchestration.
//!
//! This crate connects the domain in [`notifications`] to transports:
//!
//! - [`ChannelDispatcher`] renders templates and issues one transport call per
//!   recipient.
//! - [`DeliveryQueue`] decouples phase detection from delivery with sharded
//!   bounded channels, per-recipient retry, and a dead-letter path.
//! - [`dead_letter`] provides the in-memory, tracing, and JSON-lines sinks.
//! - [`NoopTransport`] logs instead of sending.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** It sequences calls between the domain and the
//! transport traits. It contains no SMTP or HTTP code of its own.

pub mod dead_letter;
pub mod dispatcher;
mod ledger;
pub mod noop;
pub mod queue;
pub mod stats;

pub use dead_letter::{
    FanoutDeadLetters, JsonLinesDeadLetters, MemoryDeadLetters, TracingDeadLetters,
};
pub use dispatcher::ChannelDispatcher;
pub use noop::NoopTransport;
pub use queue::{DeliveryQueue, EnqueueOutcome, QueueError, QueueOptions};
pub use stats::DeliveryStats;
