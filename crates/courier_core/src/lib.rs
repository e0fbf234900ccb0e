//! # Courier Core
//!
//! Typed, durable queues for Courier.
//!
//! This crate provides:
//! - [`TypedQueue`], a FIFO of serde values over an element store
//! - [`Serializer`] with JSON and CBOR implementations
//! - [`Config`] describing where queue files live
//! - [`open_store`], which falls back to memory when a file cannot be used
//! - The [`Event`] and [`Identity`] records the SDK enqueues
//!
//! ## Example
//!
//! ```rust,no_run
//! use courier_core::{Config, Event, QueueKind, TypedQueue};
//!
//! let config = Config::new("/var/lib/app");
//! let events = TypedQueue::<Event>::open(&config, QueueKind::Events);
//! events.add(&Event::new("app_open")).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod error;
mod factory;
mod model;
mod queue;

pub use codec::{CborSerializer, JsonSerializer, Serializer};
pub use config::{Config, QueueKind};
pub use error::{CoreError, CoreResult};
pub use factory::{open_queue_store, open_store};
pub use model::{Event, Identity, Properties};
pub use queue::{Batch, TypedQueue};

// Re-exported so downstream crates need only one dependency for store types.
pub use courier_storage::{ElementStore, StoreOptions};
