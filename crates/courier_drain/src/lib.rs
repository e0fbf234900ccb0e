//! # Courier Drain
//!
//! Background delivery of Courier queues.
//!
//! This crate provides:
//! - [`DrainPipeline`], one worker thread that drains registered queues in
//!   batches, removing a batch only after its send succeeds
//! - [`BatchSender`] and an HTTP implementation, [`HttpSender`]
//! - [`Reachability`] checks gating every drain pass
//! - [`Dispatcher`], the `track` / `identify` facade applications call
//!
//! ## Key Invariants
//!
//! - A record is removed only after the send that carried it succeeded
//! - Records leave a queue in the order they were added
//! - At most one pass runs at a time, and at most one send per lane
//! - A failed or timed-out send ends the pass; later triggers retry it
//!
//! Delivery is at-least-once: a batch whose send succeeded is resent if the
//! process dies before it is removed.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dispatcher;
mod error;
mod http;
mod lane;
mod pipeline;
mod reachability;
mod state;
mod transport;

pub use config::DrainConfig;
pub use dispatcher::{Dispatcher, Senders};
pub use error::{DrainError, DrainResult};
pub use http::{Endpoints, HttpClient, HttpResponse, HttpSender, REQUEST_ID_HEADER};
pub use pipeline::{DrainPipeline, DrainPipelineBuilder, LaneId};
pub use reachability::{AlwaysReachable, DnsReachability, MockReachability, Reachability};
pub use state::{DrainState, DrainStats, PassOutcome, SkipReason};
pub use transport::{BatchSender, MockResponse, MockSender, SentCall};
