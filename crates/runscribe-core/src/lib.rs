//! Streaming run processor with dual-sink tracing for agent runtimes.
//!
//! A [`Conversation`] consumes the events of one agent run at a time. It grows
//! the live answer, keeps a bounded log for display, pushes both to a
//! transcript consumer after every event, and writes each traceable event to a
//! concise CSV sink and a full-fidelity NDJSON sink.
//!
//! # Replaying a recorded run
//!
//! ```no_run
//! use runscribe_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conversation = Conversation::from_config(TraceConfig::from_env()?)?;
//! let source = open_json_lines("run_events.ndjson").await?;
//!
//! let outcome = conversation
//!     .run("What is 2+2?", source, &NoopConsumer)
//!     .await?;
//!
//! println!("{}", outcome.answer);
//! # Ok(())
//! # }
//! ```

/// Answer accumulator and bounded log ring.
pub mod buffers;
/// Trace sink configuration.
pub mod config;
/// Transcript consumer contract and channel-backed implementations.
pub mod consumer;
/// Error types for every processing boundary.
pub mod errors;
/// Run event tagged union.
pub mod event;
/// Field extraction from payloads of unknown shape.
pub mod extract;
/// Process-wide logging initialisation.
pub mod observability;
/// Runtime value model.
pub mod payload;
/// Common imports for typical usage.
pub mod prelude;
/// Event stream processor and conversation state.
pub mod processor;
/// Best-effort conversion of payloads to JSON.
pub mod serialize;
/// Upstream event source.
pub mod source;
/// Concise and verbose trace sinks.
pub mod trace;
/// JSON-lines stream-event decoding.
pub mod wire;

pub use buffers::{Answer, LOG_RING_CAPACITY, LogRing};
pub use config::{DEFAULT_MAX_FIELD_CHARS, TraceConfig};
pub use consumer::{NoopConsumer, Transcript, TranscriptConsumer};
pub use errors::{
    ConfigError, ExtractError, InspectError, ProcessError, SinkKind, SourceError, TraceError,
};
pub use event::{RunEvent, RunItemKind};
pub use observability::init_observability;
pub use payload::{Inspect, Payload, Record};
pub use processor::{CancelHandle, Conversation, RunOutcome, RunPhase};
pub use source::{EventSender, EventSource, FinalResult, RunEventStream};
pub use trace::{TraceEventType, TraceRecord, TraceReport, TraceWriter};
pub use wire::{json_lines_source, open_json_lines};
