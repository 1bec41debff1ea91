//! # trusera-events
//!
//! Telemetry events emitted by the Trusera interceptor, and the sinks that
//! receive them.
//!
//! Every intercepted call and every policy violation is recorded as a
//! [`TelemetryEvent`] and handed to an [`EventSink`]. The sink is the
//! boundary to the outside world (a platform client, a JSONL file, a test
//! buffer); the interceptor never cares which.
//!
//! ## Sinks
//!
//! - [`JsonlSink`]: appends one JSON event per line to a file
//! - [`MemorySink`]: keeps events in memory
//! - [`QueuedSink`]: non-blocking front for any sink; a background thread
//!   does the actual delivery
//! - [`EventDispatcher`]: fans one event out to several sinks

pub mod error;
pub mod event;
pub mod sink;

pub use error::EventError;
pub use event::{EventType, TelemetryEvent};
pub use sink::{EventDispatcher, EventSink, JsonlSink, MemorySink, QueuedSink};
