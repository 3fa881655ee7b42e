//! JSON-lines encoding of agent stream events.
//!
//! Each line is one stream-event object tagged by `type`:
//! - `raw_response_event` carries model output in `data`; a string `delta`
//!   (or `output_text`) becomes a token delta, anything else is skipped;
//! - `run_item_stream_event` carries a run item `name` and its `item`;
//! - `agent_updated_stream_event` carries `new_agent`;
//! - `final_result` carries `final_output` and feeds the final-result accessor.
//!
//! Unknown types are skipped; a line without a `type`, or that is not JSON,
//! fails the source.

use std::path::Path;

use futures::stream;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, BufReader};
use tokio::sync::oneshot;
use tracing::debug;

use crate::errors::SourceError;
use crate::event::{RunEvent, RunItemKind};
use crate::extract::{MESSAGE_TEXT_KEYS, TOOL_NAME_KEYS};
use crate::payload::Payload;
use crate::source::{EventSource, FinalResult};

/// A decoded line.
#[derive(Clone, Debug)]
pub enum WireFrame {
    Event(RunEvent),
    Final(FinalResult),
}

/// Maps one stream-event object to a frame. `Ok(None)` means "nothing to process".
pub fn map_stream_json(value: &Value) -> Result<Option<WireFrame>, SourceError> {
    let Some(event_type) = value.get("type").and_then(Value::as_str) else {
        return Err(SourceError::Protocol(
            "stream event object has no string `type`".into(),
        ));
    };
    match event_type {
        "raw_response_event" => {
            let data = value.get("data").unwrap_or(&Value::Null);
            let delta = data
                .get("delta")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    data.get("output_text")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                });
            Ok(delta.map(|text| WireFrame::Event(RunEvent::delta(text))))
        }
        "run_item_stream_event" => {
            let name = value
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("unknown_event");
            let kind = RunItemKind::from_name(name);
            let item = value.get("item").cloned().unwrap_or(Value::Null);
            let item = promote_raw_item(&kind, item);
            Ok(Some(WireFrame::Event(RunEvent::item(kind, Payload::Json(item)))))
        }
        "agent_updated_stream_event" => {
            let agent = value.get("new_agent").cloned().unwrap_or(Value::Null);
            Ok(Some(WireFrame::Event(RunEvent::agent_switch(agent))))
        }
        "final_result" => {
            let final_output = value
                .get("final_output")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned);
            Ok(Some(WireFrame::Final(FinalResult {
                final_output,
                payload: Some(Payload::Json(value.clone())),
            })))
        }
        other => {
            debug!(event = "wire.skipped", domain = "source", event_type = other);
            Ok(None)
        }
    }
}

/// Runtimes wrap the provider object in `raw_item`; use it when the item
/// itself has none of the keys the processor looks for.
fn promote_raw_item(kind: &RunItemKind, item: Value) -> Value {
    let wanted: &[&str] = match kind {
        RunItemKind::ToolCalled | RunItemKind::ToolOutput => &TOOL_NAME_KEYS,
        RunItemKind::MessageFinalized => &MESSAGE_TEXT_KEYS,
        RunItemKind::Other(_) => return item,
    };
    let has_wanted = item
        .as_object()
        .is_some_and(|obj| wanted.iter().any(|k| obj.contains_key(*k)));
    if has_wanted {
        return item;
    }
    match item.get("raw_item") {
        Some(raw @ Value::Object(_)) => merge_raw_item(&item, raw),
        _ => item,
    }
}

/// `raw_item` fields, plus any item-level field the raw item lacks
/// (tool outputs keep `output` on the item).
fn merge_raw_item(item: &Value, raw: &Value) -> Value {
    let mut merged = raw.clone();
    if let (Some(target), Some(source)) = (merged.as_object_mut(), item.as_object()) {
        for (key, value) in source {
            if key != "raw_item" && !target.contains_key(key) {
                target.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Parses one line. Blank lines decode to `None`.
pub fn decode_line(line: &str, line_no: usize) -> Result<Option<WireFrame>, SourceError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| SourceError::Protocol(format!("line {line_no}: invalid JSON: {e}")))?;
    map_stream_json(&value)
        .map_err(|e| SourceError::Protocol(format!("line {line_no}: {e}")))
}

/// Opens a JSON-lines event file as an [`EventSource`].
pub async fn open_json_lines(path: impl AsRef<Path>) -> Result<EventSource, SourceError> {
    let path = path.as_ref();
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| SourceError::Transport(format!("open {}: {e}", path.display())))?;
    Ok(json_lines_source(BufReader::new(file)))
}

/// Wraps any async line reader as an [`EventSource`].
///
/// A `final_result` line resolves the source's final-result accessor; if none
/// appears the accessor yields nothing.
pub fn json_lines_source<R>(reader: R) -> EventSource
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    struct State<R> {
        lines: tokio::io::Lines<R>,
        line_no: usize,
        final_tx: Option<oneshot::Sender<FinalResult>>,
    }

    let (final_tx, final_rx) = oneshot::channel();
    let events = stream::try_unfold(
        State {
            lines: reader.lines(),
            line_no: 0,
            final_tx: Some(final_tx),
        },
        |mut state| async move {
            loop {
                let line = state
                    .lines
                    .next_line()
                    .await
                    .map_err(|e| SourceError::Transport(format!("read failed: {e}")))?;
                let Some(line) = line else {
                    state.final_tx = None;
                    return Ok(None);
                };
                state.line_no += 1;
                match decode_line(&line, state.line_no)? {
                    Some(WireFrame::Event(event)) => return Ok(Some((event, state))),
                    Some(WireFrame::Final(result)) => {
                        if let Some(tx) = state.final_tx.take() {
                            let _ = tx.send(result);
                        }
                    }
                    None => {}
                }
            }
        },
    );
    EventSource::from_stream(events).with_final_result(final_rx)
}
