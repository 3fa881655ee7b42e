//! Common imports for typical runscribe usage.
pub use crate::{
    CancelHandle, Conversation, EventSender, EventSource, FinalResult, NoopConsumer, Payload,
    ProcessError, RunEvent, RunOutcome, SourceError, TraceConfig, Transcript,
    TranscriptConsumer, open_json_lines,
};
