//! Field resolution for tool calls, tool results and finalized messages.
//!
//! Each logical field is resolved by probing an ordered table of candidate
//! keys. The tables are the contract: reorder them and extraction changes.

use serde_json::Value;

use crate::errors::ExtractError;
use crate::payload::Payload;
use crate::serialize::{render_value, to_jsonable};

/// Candidate keys for the tool identifier, in probe order.
pub const TOOL_NAME_KEYS: [&str; 3] = ["name", "tool_name", "function_name"];

/// Candidate keys for tool-call arguments, in probe order.
pub const TOOL_CALL_PAYLOAD_KEYS: [&str; 7] = [
    "arguments",
    "args",
    "input",
    "params",
    "parameters",
    "kwargs",
    "payload",
];

/// Candidate keys for tool output, in probe order.
pub const TOOL_OUTPUT_PAYLOAD_KEYS: [&str; 7] = [
    "output", "result", "data", "content", "text", "message", "messages",
];

/// Candidate keys for the text of a finalized assistant message.
pub const MESSAGE_TEXT_KEYS: [&str; 3] = ["text", "output_text", "content"];

/// Candidate keys for an agent's display name.
pub const AGENT_NAME_KEYS: [&str; 2] = ["name", "agent_name"];

/// Tool name used when no candidate key yields a value.
pub const UNKNOWN_TOOL: &str = "unknown_tool";

/// Result of resolving a tool call or tool output.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolFields {
    pub name: String,
    /// Arguments (calls) or output (results). `Some(Value::Null)` when the
    /// matching key is present but null.
    pub value: Option<Value>,
    /// Full-fidelity JSON form of the whole payload.
    pub raw: Value,
    /// Per-field probing failures; the affected field is left unresolved.
    pub issues: Vec<ExtractError>,
}

/// Which tool lifecycle step a payload looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Called,
    Output,
}

/// Resolves name and arguments of a tool call.
pub fn extract_tool_call(obj: &Payload) -> ToolFields {
    extract_tool(obj, "arguments", &TOOL_CALL_PAYLOAD_KEYS)
}

/// Resolves name and output of a tool result.
pub fn extract_tool_output(obj: &Payload) -> ToolFields {
    extract_tool(obj, "output", &TOOL_OUTPUT_PAYLOAD_KEYS)
}

fn extract_tool(obj: &Payload, value_field: &'static str, value_keys: &[&'static str]) -> ToolFields {
    let mut issues = Vec::new();
    let name = match probe_name(obj, &TOOL_NAME_KEYS) {
        Ok(name) => name,
        Err(err) => {
            issues.push(err);
            None
        }
    };
    let value = match probe_present(obj, value_field, value_keys) {
        Ok(found) => found.map(|(_, payload)| to_jsonable(&payload)),
        Err(err) => {
            issues.push(err);
            None
        }
    };
    ToolFields {
        name: name.unwrap_or_else(|| UNKNOWN_TOOL.to_string()),
        value,
        raw: to_jsonable(obj),
        issues,
    }
}

/// Guesses whether an unrecognized run item is really a tool event.
///
/// Requires a resolvable tool name plus an output key (checked first) or an
/// argument key. Probing failures count as "not a tool event".
pub fn discover_tool_kind(obj: &Payload) -> Option<ToolKind> {
    if !matches!(probe_name(obj, &TOOL_NAME_KEYS), Ok(Some(_))) {
        return None;
    }
    if matches!(
        probe_present(obj, "output", &TOOL_OUTPUT_PAYLOAD_KEYS),
        Ok(Some(_))
    ) {
        return Some(ToolKind::Output);
    }
    if matches!(
        probe_present(obj, "arguments", &TOOL_CALL_PAYLOAD_KEYS),
        Ok(Some(_))
    ) {
        return Some(ToolKind::Called);
    }
    None
}

/// Text of a finalized message plus any probing failure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageText {
    pub text: Option<String>,
    pub issues: Vec<ExtractError>,
}

/// Resolves the text of a finalized message.
///
/// Accepts a bare string, or probes [`MESSAGE_TEXT_KEYS`]; a list under the
/// matched key is treated as content parts whose `text` members are joined.
pub fn extract_message_text(obj: &Payload) -> MessageText {
    if let Some(text) = as_text(obj) {
        return MessageText {
            text: Some(text),
            issues: Vec::new(),
        };
    }
    match probe_present(obj, "text", &MESSAGE_TEXT_KEYS) {
        Ok(Some((key, found))) => match text_from_parts(&found, key) {
            Ok(text) => MessageText {
                text,
                issues: Vec::new(),
            },
            Err(err) => MessageText {
                text: None,
                issues: vec![err],
            },
        },
        Ok(None) => MessageText::default(),
        Err(err) => MessageText {
            text: None,
            issues: vec![err],
        },
    }
}

/// Display label for an agent: its name when resolvable, otherwise its
/// description.
pub fn extract_agent_label(obj: &Payload) -> (String, Vec<ExtractError>) {
    match probe_name(obj, &AGENT_NAME_KEYS) {
        Ok(Some(name)) => (name, Vec::new()),
        Ok(None) => match obj.describe() {
            Ok(text) => (text, Vec::new()),
            Err(err) => (
                "unknown_agent".to_string(),
                vec![ExtractError {
                    field: "agent",
                    key: "describe",
                    message: err.message,
                }],
            ),
        },
        Err(err) => ("unknown_agent".to_string(), vec![err]),
    }
}

/// First candidate whose value renders to a non-empty string.
fn probe_name(obj: &Payload, keys: &[&'static str]) -> Result<Option<String>, ExtractError> {
    for &key in keys {
        let found = obj.lookup(key).map_err(|err| ExtractError {
            field: "name",
            key,
            message: err.message,
        })?;
        if let Some(value) = found
            && let Some(name) = name_text(&value)
        {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

/// First candidate that is present at all, null and empty values included.
fn probe_present(
    obj: &Payload,
    field: &'static str,
    keys: &[&'static str],
) -> Result<Option<(&'static str, Payload)>, ExtractError> {
    for &key in keys {
        let found = obj.lookup(key).map_err(|err| ExtractError {
            field,
            key,
            message: err.message,
        })?;
        if let Some(value) = found {
            return Ok(Some((key, value)));
        }
    }
    Ok(None)
}

fn name_text(value: &Payload) -> Option<String> {
    if value.is_null() {
        return None;
    }
    let text = match as_text(value) {
        Some(text) => text,
        None => render_value(&to_jsonable(value)),
    };
    (!text.is_empty()).then_some(text)
}

fn as_text(value: &Payload) -> Option<String> {
    match value {
        Payload::Str(s) => Some(s.clone()),
        Payload::Json(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn text_from_parts(value: &Payload, key: &'static str) -> Result<Option<String>, ExtractError> {
    if let Some(text) = as_text(value) {
        return Ok(Some(text));
    }
    let parts: Vec<Payload> = match value {
        Payload::List(items) => items.clone(),
        Payload::Json(Value::Array(items)) => items.iter().cloned().map(Payload::Json).collect(),
        _ => return Ok(None),
    };
    let mut joined = String::new();
    for part in &parts {
        if let Some(text) = as_text(part) {
            joined.push_str(&text);
            continue;
        }
        let found = part.lookup("text").map_err(|err| ExtractError {
            field: "text",
            key,
            message: err.message,
        })?;
        if let Some(text) = found.as_ref().and_then(as_text) {
            joined.push_str(&text);
        }
    }
    Ok((!joined.is_empty()).then_some(joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InspectError;
    use crate::payload::Inspect;
    use serde_json::json;

    struct ToolCallRecord;

    impl Inspect for ToolCallRecord {
        fn type_name(&self) -> &str {
            "FunctionToolCall"
        }
        fn attr(&self, name: &str) -> Result<Option<Payload>, InspectError> {
            Ok(match name {
                "tool_name" => Some(Payload::from("get_weather")),
                "params" => Some(Payload::Json(json!({"city": "Tokyo"}))),
                _ => None,
            })
        }
    }

    struct Exploding;

    impl Inspect for Exploding {
        fn type_name(&self) -> &str {
            "Exploding"
        }
        fn attr(&self, name: &str) -> Result<Option<Payload>, InspectError> {
            Err(InspectError::new(format!("attribute {name} raised")))
        }
    }

    #[test]
    fn mapping_with_name_and_arguments() {
        let payload = Payload::map([
            ("name", Payload::from("calculator")),
            ("arguments", Payload::from("2+2")),
        ]);
        let fields = extract_tool_call(&payload);
        assert_eq!(fields.name, "calculator");
        assert_eq!(fields.value, Some(json!("2+2")));
        assert_eq!(fields.raw, json!({"name": "calculator", "arguments": "2+2"}));
        assert!(fields.issues.is_empty());
    }

    #[test]
    fn object_with_tool_name_attribute() {
        let fields = extract_tool_call(&Payload::object(ToolCallRecord));
        assert_eq!(fields.name, "get_weather");
        assert_eq!(fields.value, Some(json!({"city": "Tokyo"})));
    }

    #[test]
    fn payload_without_candidates_yields_unknown_tool() {
        let fields = extract_tool_call(&Payload::map([("id", Payload::Int(1))]));
        assert_eq!(fields.name, UNKNOWN_TOOL);
        assert_eq!(fields.value, None);
        assert_eq!(fields.raw, json!({"id": 1}));
    }

    #[test]
    fn empty_name_falls_through_to_next_candidate() {
        let payload = Payload::map([
            ("name", Payload::from("")),
            ("function_name", Payload::from("lookup")),
        ]);
        assert_eq!(extract_tool_call(&payload).name, "lookup");
    }

    #[test]
    fn presence_not_truthiness_selects_the_payload_key() {
        let payload = Payload::map([
            ("name", Payload::from("search")),
            ("output", Payload::Null),
            ("result", Payload::from("ignored")),
        ]);
        let fields = extract_tool_output(&payload);
        assert_eq!(fields.value, Some(Value::Null));

        let payload = Payload::map([("result", Payload::from("")), ("data", Payload::from("x"))]);
        assert_eq!(extract_tool_output(&payload).value, Some(json!("")));
    }

    #[test]
    fn probing_failures_are_reported_not_raised() {
        let fields = extract_tool_output(&Payload::object(Exploding));
        assert_eq!(fields.name, UNKNOWN_TOOL);
        assert_eq!(fields.value, None);
        assert_eq!(fields.issues.len(), 2);
        assert!(fields.issues[0].to_string().contains("attribute name raised"));
        assert_eq!(fields.raw, json!("<Exploding>"));
    }

    #[test]
    fn discovers_tool_shapes_on_unrecognized_items() {
        let output = Payload::map([("name", Payload::from("a")), ("result", Payload::from("1"))]);
        let call = Payload::map([("name", Payload::from("a")), ("kwargs", Payload::Null)]);
        let neither = Payload::map([("name", Payload::from("a"))]);
        assert_eq!(discover_tool_kind(&output), Some(ToolKind::Output));
        assert_eq!(discover_tool_kind(&call), Some(ToolKind::Called));
        assert_eq!(discover_tool_kind(&neither), None);
        assert_eq!(discover_tool_kind(&Payload::object(Exploding)), None);
    }

    #[test]
    fn message_text_from_string_key_and_content_parts() {
        assert_eq!(
            extract_message_text(&Payload::from("done")).text.as_deref(),
            Some("done")
        );
        let parts = Payload::Json(json!({
            "content": [{"type": "output_text", "text": "Hello "}, {"text": "there"}]
        }));
        assert_eq!(
            extract_message_text(&parts).text.as_deref(),
            Some("Hello there")
        );
        let empty = Payload::map([("text", Payload::from(""))]);
        assert_eq!(extract_message_text(&empty).text.as_deref(), Some(""));
        assert_eq!(extract_message_text(&Payload::Null).text, None);
    }

    #[test]
    fn agent_label_prefers_name_then_description() {
        let named = Payload::map([("name", Payload::from("Planner"))]);
        assert_eq!(extract_agent_label(&named).0, "Planner");
        let unnamed = Payload::record("Agent", [("tools", Payload::List(vec![]))]);
        assert_eq!(extract_agent_label(&unnamed).0, "Agent(tools=[])");
        let (label, issues) = extract_agent_label(&Payload::object(Exploding));
        assert_eq!(label, "unknown_agent");
        assert_eq!(issues.len(), 1);
    }
}
