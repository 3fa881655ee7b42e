//! Event stream processor.
//!
//! A [`Conversation`] consumes one run's events at a time: it accumulates the
//! answer, renders log lines into a bounded ring, writes trace records, and
//! pushes a [`Transcript`] to the consumer after every event.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{Instrument as _, debug, info, info_span, warn};
use uuid::Uuid;

use crate::buffers::{Answer, LogRing};
use crate::config::TraceConfig;
use crate::consumer::{Transcript, TranscriptConsumer};
use crate::errors::{ExtractError, ProcessError};
use crate::event::{RunEvent, RunItemKind};
use crate::extract::{
    ToolFields, ToolKind, discover_tool_kind, extract_agent_label, extract_message_text,
    extract_tool_call, extract_tool_output,
};
use crate::payload::Payload;
use crate::serialize::{render_value, to_jsonable};
use crate::source::EventSource;
use crate::trace::{TraceRecord, TraceWriter, truncate};

/// Lifecycle of a single run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Streaming,
    Finalizing,
    Done,
}

/// Handle used to abandon the run in progress.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Requests cancellation.
    ///
    /// Takes effect between events: the event being processed completes, no
    /// further events are consumed and no final answer record is written. A
    /// request made while no run is active applies to the next run.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Result of one completed or cancelled run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Identifier recorded on the run's tracing span.
    pub run_id: Uuid,
    /// 1-based turn within the conversation.
    pub turn: u32,
    /// Final answer text.
    pub answer: String,
    /// Log lines kept by the ring, oldest first.
    pub log: Vec<String>,
    /// Number of events consumed from the source.
    pub events: usize,
    pub cancelled: bool,
}

impl RunOutcome {
    /// Log lines joined for display.
    pub fn log_text(&self) -> String {
        self.log.join("\n")
    }
}

/// A sequence of question/answer turns sharing one trace writer.
pub struct Conversation {
    writer: TraceWriter,
    turns: u32,
    phase: RunPhase,
    cancel_tx: Arc<watch::Sender<bool>>,
}

struct RunState {
    answer: Answer,
    log: LogRing,
    events: usize,
}

impl RunState {
    fn transcript(&self) -> Transcript {
        Transcript {
            answer: self.answer.value().to_string(),
            log: self.log.snapshot(),
        }
    }
}

impl Conversation {
    /// Starts an idle conversation that traces through `writer`.
    pub fn new(writer: TraceWriter) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            writer,
            turns: 0,
            phase: RunPhase::Idle,
            cancel_tx: Arc::new(cancel_tx),
        }
    }

    /// Validates `config` and builds the trace writer from it.
    pub fn from_config(config: TraceConfig) -> Result<Self, ProcessError> {
        Ok(Self::new(TraceWriter::new(config)?))
    }

    /// Number of runs started so far.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// Phase of the current or most recent run.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Handle that cancels the run in progress from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel_tx),
        }
    }

    /// Sink paths and cap in effect.
    pub fn trace_config(&self) -> &TraceConfig {
        self.writer.config()
    }

    /// Processes one run to completion.
    ///
    /// Only a failure of `source` is returned as an error; trace, extraction
    /// and formatting problems are logged and the run continues.
    pub async fn run(
        &mut self,
        question: &str,
        source: EventSource,
        consumer: &dyn TranscriptConsumer,
    ) -> Result<RunOutcome, ProcessError> {
        self.turns += 1;
        let run_id = Uuid::new_v4();
        let turn = self.turns;
        let span = info_span!("run", run_id = %run_id, turn);
        let result = self
            .run_turn(run_id, turn, question, source, consumer)
            .instrument(span)
            .await;
        self.cancel_tx.send_replace(false);
        self.phase = RunPhase::Done;
        result
    }

    async fn run_turn(
        &mut self,
        run_id: Uuid,
        turn: u32,
        question: &str,
        mut source: EventSource,
        consumer: &dyn TranscriptConsumer,
    ) -> Result<RunOutcome, ProcessError> {
        let mut cancel_rx = self.cancel_tx.subscribe();
        let mut state = RunState {
            answer: Answer::new(),
            log: LogRing::new(),
            events: 0,
        };

        self.phase = RunPhase::Streaming;
        debug!(event = "processor.run_started", domain = "processor", turn);
        self.write_trace(&TraceRecord::question(turn == 1, question));

        let mut cancelled = false;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel_requested(&mut cancel_rx) => {
                    cancelled = true;
                    break;
                }
                next = source.next_event() => next,
            };
            let event = match next {
                None => break,
                Some(Ok(event)) => event,
                Some(Err(err)) => {
                    warn!(
                        event = "processor.source_failed",
                        domain = "processor",
                        error = %err,
                        "upstream event source failed"
                    );
                    return Err(err.into());
                }
            };
            state.events += 1;
            self.handle_event(&mut state, event);
            consumer.push(&state.transcript());
            tokio::task::yield_now().await;
        }

        if cancelled {
            info!(
                event = "processor.run_cancelled",
                domain = "processor",
                events = state.events
            );
        } else {
            self.phase = RunPhase::Finalizing;
            let final_result = source.final_result().await;
            let mut raw = None;
            if let Some(result) = final_result {
                if state.answer.is_empty()
                    && let Some(text) = result.final_output.as_deref()
                    && !text.is_empty()
                {
                    state.answer.append(text);
                    consumer.push(&state.transcript());
                }
                raw = result.payload.as_ref().map(to_jsonable);
            }
            self.write_trace(&TraceRecord::agent_message(state.answer.value(), raw));
            debug!(
                event = "processor.run_finished",
                domain = "processor",
                events = state.events,
                answer_chars = state.answer.value().chars().count()
            );
        }

        Ok(RunOutcome {
            run_id,
            turn,
            log: state.log.iter().map(ToOwned::to_owned).collect(),
            answer: state.answer.into_string(),
            events: state.events,
            cancelled,
        })
    }

    fn handle_event(&mut self, state: &mut RunState, event: RunEvent) {
        let cap = self.writer.config().max_field_chars;
        match event {
            RunEvent::TokenDelta { text } => state.answer.append(&text),
            RunEvent::RunItem { kind, payload } => match kind {
                RunItemKind::ToolCalled => self.handle_tool(state, ToolKind::Called, &payload),
                RunItemKind::ToolOutput => self.handle_tool(state, ToolKind::Output, &payload),
                RunItemKind::MessageFinalized => {
                    let message = extract_message_text(&payload);
                    if let Some(text) = message.text.as_deref()
                        && !text.is_empty()
                    {
                        state.answer.append(text);
                    }
                    push_line(state, "[message_output_created]".to_string(), &message.issues, cap);
                }
                RunItemKind::Other(name) => match discover_tool_kind(&payload) {
                    Some(tool_kind) => self.handle_tool(state, tool_kind, &payload),
                    None => push_line(state, format!("[{}]", truncate(&name, cap)), &[], cap),
                },
            },
            RunEvent::AgentSwitch { new_agent } => {
                let (label, issues) = extract_agent_label(&new_agent);
                push_line(
                    state,
                    format!("[agent_updated] new_agent={}", truncate(&label, cap)),
                    &issues,
                    cap,
                );
            }
        }
    }

    fn handle_tool(&mut self, state: &mut RunState, kind: ToolKind, payload: &Payload) {
        let cap = self.writer.config().max_field_chars;
        let (fields, record) = match kind {
            ToolKind::Called => {
                let fields = extract_tool_call(payload);
                let record = TraceRecord::tool_called(
                    fields.name.clone(),
                    fields.value.clone(),
                    fields.raw.clone(),
                );
                (fields, record)
            }
            ToolKind::Output => {
                let fields = extract_tool_output(payload);
                let record = TraceRecord::tool_output(
                    fields.name.clone(),
                    fields.value.clone(),
                    fields.raw.clone(),
                );
                (fields, record)
            }
        };
        push_line(state, tool_line(kind, &fields, cap), &fields.issues, cap);
        self.write_trace(&record);
    }

    fn write_trace(&mut self, record: &TraceRecord) {
        let report = self.writer.append(record);
        for err in report.into_errors() {
            warn!(
                event = "trace.write_failed",
                domain = "trace",
                sink = %err.sink(),
                event_type = record.event_type.as_str(),
                error = %err,
                "trace record dropped"
            );
        }
    }
}

fn tool_line(kind: ToolKind, fields: &ToolFields, cap: usize) -> String {
    let rendered = truncate(
        &render_value(fields.value.as_ref().unwrap_or(&Value::Null)),
        cap,
    );
    let name = truncate(&fields.name, cap);
    match kind {
        ToolKind::Called => format!("[tool_called] tool={name} args={rendered}"),
        ToolKind::Output => format!("[tool_output] tool={name} output={rendered}"),
    }
}

/// Every embedded field, the detail text included, is held to `cap` chars.
fn push_line(state: &mut RunState, mut line: String, issues: &[ExtractError], cap: usize) {
    if !issues.is_empty() {
        let detail = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        line.push_str(&format!(" (detail error: {})", truncate(&detail, cap)));
    }
    info!(event = "processor.log_line", domain = "processor", line = %line);
    state.log.push(line);
}

/// Resolves once cancellation has been requested; pends forever otherwise.
async fn cancel_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
