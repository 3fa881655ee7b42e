//! Append-only dual-sink run tracing.
//!
//! Every record goes to two independent files:
//! - a concise CSV with a fixed header and size-capped fields, for quick inspection;
//! - a verbose NDJSON log with the untruncated record plus `raw`, for replay and debugging.
//!
//! Each sink is its own failure domain. A record is encoded fully in memory
//! and handed to the file in a single write, so a sink either gets the whole
//! record or nothing.

use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::config::TraceConfig;
use crate::errors::{ConfigError, SinkKind, TraceError};
use crate::serialize::render_value;

/// Column order of the concise sink.
pub const CONCISE_HEADER: [&str; 6] = [
    "timestamp",
    "event_type",
    "tool_name",
    "input",
    "output",
    "question",
];

/// Kind of traced event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventType {
    FirstQuestion,
    FollowupQuestion,
    ToolCalled,
    ToolOutput,
    AgentMessage,
}

impl TraceEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstQuestion => "first_question",
            Self::FollowupQuestion => "followup_question",
            Self::ToolCalled => "tool_called",
            Self::ToolOutput => "tool_output",
            Self::AgentMessage => "agent_message",
        }
    }
}

/// One traced event. The timestamp is taken when the record is written.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRecord {
    pub event_type: TraceEventType,
    pub tool_name: Option<String>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub question: Option<String>,
    /// Full-fidelity payload; verbose sink only.
    pub raw: Option<Value>,
}

impl TraceRecord {
    fn empty(event_type: TraceEventType) -> Self {
        Self {
            event_type,
            tool_name: None,
            input: None,
            output: None,
            question: None,
            raw: None,
        }
    }

    /// Question that opens a run; `first` selects `first_question` over `followup_question`.
    pub fn question(first: bool, question: impl Into<String>) -> Self {
        let event_type = if first {
            TraceEventType::FirstQuestion
        } else {
            TraceEventType::FollowupQuestion
        };
        Self {
            question: Some(question.into()),
            ..Self::empty(event_type)
        }
    }

    /// Tool invocation; `arguments` is the concise `input` column.
    pub fn tool_called(name: impl Into<String>, arguments: Option<Value>, raw: Value) -> Self {
        Self {
            tool_name: Some(name.into()),
            input: arguments,
            raw: Some(raw),
            ..Self::empty(TraceEventType::ToolCalled)
        }
    }

    /// Tool result; `output` is the concise `output` column.
    pub fn tool_output(name: impl Into<String>, output: Option<Value>, raw: Value) -> Self {
        Self {
            tool_name: Some(name.into()),
            output,
            raw: Some(raw),
            ..Self::empty(TraceEventType::ToolOutput)
        }
    }

    /// Final answer of a run.
    pub fn agent_message(answer: impl Into<String>, raw: Option<Value>) -> Self {
        Self {
            output: Some(Value::String(answer.into())),
            raw,
            ..Self::empty(TraceEventType::AgentMessage)
        }
    }
}

#[derive(serde::Serialize)]
struct VerboseLine<'a> {
    timestamp: &'a str,
    event_type: TraceEventType,
    tool_name: Option<&'a str>,
    input: Option<&'a Value>,
    output: Option<&'a Value>,
    question: Option<&'a str>,
    raw: Option<&'a Value>,
}

/// Outcome of one [`TraceWriter::append`], one result per sink.
#[derive(Debug)]
pub struct TraceReport {
    pub concise: Result<(), TraceError>,
    pub verbose: Result<(), TraceError>,
}

impl TraceReport {
    pub fn is_ok(&self) -> bool {
        self.concise.is_ok() && self.verbose.is_ok()
    }

    pub fn into_errors(self) -> impl Iterator<Item = TraceError> {
        [self.concise.err(), self.verbose.err()].into_iter().flatten()
    }
}

/// Truncates `text` to `cap` characters, appending the truncation marker when
/// anything was cut.
pub fn truncate(text: &str, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}{}", &text[..cut], truncation_marker(cap)),
    }
}

/// Marker appended by [`truncate`].
pub fn truncation_marker(cap: usize) -> String {
    format!("... [TRUNCATED to {cap} chars]")
}

/// Writer for the concise and verbose trace sinks.
///
/// Sinks are bootstrapped lazily on the first append: parent directories are
/// created, the CSV gets its header when missing or empty, the NDJSON file is
/// created empty. A single writer per sink path is assumed.
pub struct TraceWriter {
    config: TraceConfig,
    concise_ready: bool,
    verbose_ready: bool,
}

impl TraceWriter {
    /// Validates `config`; no file is touched until the first append.
    pub fn new(config: TraceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            concise_ready: false,
            verbose_ready: false,
        })
    }

    /// Configuration the writer was built with.
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Appends `record` to both sinks.
    ///
    /// The concise row is written first, then the verbose line; a failure in
    /// one never skips the other. Errors are returned, not raised, so callers
    /// can log and move on.
    pub fn append(&mut self, record: &TraceRecord) -> TraceReport {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let concise = self.append_concise(&timestamp, record);
        if concise.is_err() {
            self.concise_ready = false;
        }
        let verbose = self.append_verbose(&timestamp, record);
        if verbose.is_err() {
            self.verbose_ready = false;
        }
        TraceReport { concise, verbose }
    }

    fn append_concise(&mut self, timestamp: &str, record: &TraceRecord) -> Result<(), TraceError> {
        let path = self.config.concise_path.clone();
        if !self.concise_ready {
            bootstrap_concise(&path)?;
            self.concise_ready = true;
        }
        let cap = self.config.max_field_chars;
        let input = capped_field(record.input.as_ref(), cap);
        let output = capped_field(record.output.as_ref(), cap);
        let row = encode_csv_row(&[
            timestamp,
            record.event_type.as_str(),
            record.tool_name.as_deref().unwrap_or(""),
            &input,
            &output,
            record.question.as_deref().unwrap_or(""),
        ])?;
        append_bytes(SinkKind::Concise, &path, &row)
    }

    fn append_verbose(&mut self, timestamp: &str, record: &TraceRecord) -> Result<(), TraceError> {
        let path = self.config.verbose_path.clone();
        if !self.verbose_ready {
            ensure_parent(SinkKind::Verbose, &path)?;
            open_append(SinkKind::Verbose, &path)?;
            self.verbose_ready = true;
        }
        let line = VerboseLine {
            timestamp,
            event_type: record.event_type,
            tool_name: record.tool_name.as_deref(),
            input: record.input.as_ref(),
            output: record.output.as_ref(),
            question: record.question.as_deref(),
            raw: record.raw.as_ref(),
        };
        let mut bytes = serde_json::to_vec(&line).map_err(|e| TraceError::Encode(e.to_string()))?;
        bytes.push(b'\n');
        append_bytes(SinkKind::Verbose, &path, &bytes)
    }
}

fn capped_field(value: Option<&Value>, cap: usize) -> String {
    match value {
        Some(value) => truncate(&render_value(value), cap),
        None => String::new(),
    }
}

fn bootstrap_concise(path: &Path) -> Result<(), TraceError> {
    ensure_parent(SinkKind::Concise, path)?;
    let needs_header = match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
        Err(err) => return Err(TraceError::io(SinkKind::Concise, path, err)),
    };
    if needs_header {
        let header = encode_csv_row(&CONCISE_HEADER)?;
        append_bytes(SinkKind::Concise, path, &header)?;
    }
    Ok(())
}

fn encode_csv_row(fields: &[&str]) -> Result<Vec<u8>, TraceError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(fields)
        .map_err(|e| TraceError::Csv(e.to_string()))?;
    writer.into_inner().map_err(|e| TraceError::Csv(e.to_string()))
}

fn ensure_parent(sink: SinkKind, path: &Path) -> Result<(), TraceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| TraceError::io(sink, parent, e))?;
    }
    Ok(())
}

fn open_append(sink: SinkKind, path: &Path) -> Result<File, TraceError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| TraceError::io(sink, path, e))
}

fn append_bytes(sink: SinkKind, path: &Path, bytes: &[u8]) -> Result<(), TraceError> {
    let mut file = open_append(sink, path)?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| TraceError::io(sink, path, e))
}
