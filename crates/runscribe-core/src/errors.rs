use std::path::PathBuf;

/// Failure raised by an [`Inspect`](crate::payload::Inspect) object while it is
/// being probed or dumped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct InspectError {
    pub message: String,
}

impl InspectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A single field that could not be probed during tool-field extraction.
///
/// These are returned as data next to the extraction result; the processor
/// renders them into the log line and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} via `{key}`: {message}")]
pub struct ExtractError {
    /// Logical field being resolved (`name`, `arguments`, `output`, `text`).
    pub field: &'static str,
    /// Candidate key that failed.
    pub key: &'static str,
    pub message: String,
}

/// Which trace sink an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Concise,
    Verbose,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Concise => f.write_str("concise"),
            SinkKind::Verbose => f.write_str("verbose"),
        }
    }
}

/// Errors produced while persisting a trace record to one sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    /// Filesystem failure (create dir, open, write).
    #[error("{sink} sink i/o error at {}: {message}", path.display())]
    Io {
        sink: SinkKind,
        path: PathBuf,
        message: String,
    },
    /// CSV row encoding failed.
    #[error("concise sink csv error: {0}")]
    Csv(String),
    /// JSON line encoding failed.
    #[error("verbose sink encode error: {0}")]
    Encode(String),
}

impl TraceError {
    pub(crate) fn io(sink: SinkKind, path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            sink,
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn sink(&self) -> SinkKind {
        match self {
            Self::Io { sink, .. } => *sink,
            Self::Csv(_) => SinkKind::Concise,
            Self::Encode(_) => SinkKind::Verbose,
        }
    }
}

/// Invalid trace configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_field_chars must be greater than 0")]
    ZeroCap,
    #[error("{0} path must not be empty")]
    EmptyPath(&'static str),
    #[error("invalid value for {key}: {message}")]
    InvalidEnv { key: &'static str, message: String },
}

/// Failure of the upstream event source itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The source could not be read (file, channel, transport).
    #[error("event source transport error: {0}")]
    Transport(String),
    /// The source produced a frame that is not a run event.
    #[error("event source protocol error: {0}")]
    Protocol(String),
}

/// Top-level error returned by [`Conversation::run`](crate::processor::Conversation::run).
///
/// Trace, extraction and formatting failures never surface here. A run fails
/// only on an invalid trace configuration or an upstream source error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Source(SourceError),
    #[error("config error: {0}")]
    Config(ConfigError),
}

impl From<ConfigError> for ProcessError {
    fn from(value: ConfigError) -> Self {
        ProcessError::Config(value)
    }
}

impl From<SourceError> for ProcessError {
    fn from(value: SourceError) -> Self {
        ProcessError::Source(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_error_reports_its_sink() {
        let err = TraceError::io(
            SinkKind::Verbose,
            std::path::Path::new("/tmp/x.ndjson"),
            std::io::Error::other("disk full"),
        );
        assert_eq!(err.sink(), SinkKind::Verbose);
        assert!(err.to_string().contains("verbose sink i/o error"));
        assert!(err.to_string().contains("disk full"));
        assert_eq!(TraceError::Csv("x".into()).sink(), SinkKind::Concise);
    }

    #[test]
    fn source_error_is_transparent_in_process_error() {
        let err: ProcessError = SourceError::Transport("closed".into()).into();
        assert_eq!(err.to_string(), "event source transport error: closed");
    }
}
