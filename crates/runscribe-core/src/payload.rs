//! Runtime value model for event payloads of unknown, provider-specific shape.
//!
//! Upstream runtimes hand over anything from plain JSON to rich typed objects.
//! [`Payload`] captures the shapes the serializer and the field extractor know
//! how to walk; [`Inspect`] is the capability surface of objects that can only
//! be looked at through named attributes.

use std::fmt;
use std::sync::Arc;

use crate::errors::InspectError;

/// Capability surface of an attribute-bearing object of unknown shape.
///
/// Every method may fail; callers treat failures as local and degrade instead
/// of aborting.
pub trait Inspect: Send + Sync {
    /// Type name used in descriptions and log lines.
    fn type_name(&self) -> &str;

    /// Looks up one named attribute. `Ok(None)` means the attribute is absent.
    fn attr(&self, name: &str) -> Result<Option<Payload>, InspectError>;

    /// Self-describing conversion to a mapping, when the object offers one.
    fn dump(&self) -> Option<Result<Payload, InspectError>> {
        None
    }

    /// Self-describing conversion straight to JSON, when the object offers one.
    fn dump_json(&self) -> Option<Result<serde_json::Value, InspectError>> {
        None
    }

    /// Generic attribute bag, when the object can enumerate its attributes.
    fn attributes(&self) -> Option<Result<Vec<(String, Payload)>, InspectError>> {
        None
    }

    /// Human-readable form used as the last-resort string representation.
    fn describe(&self) -> Result<String, InspectError> {
        Ok(format!("<{}>", self.type_name()))
    }
}

/// Structured record with declared field order.
#[derive(Clone, Debug)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(String, Payload)>,
}

/// A runtime value carried by a run event.
#[derive(Clone)]
pub enum Payload {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Binary blob; never embedded verbatim in JSON output.
    Bytes(Vec<u8>),
    List(Vec<Payload>),
    /// Ordered mapping; lookups return the first matching key.
    Map(Vec<(String, Payload)>),
    Record(Record),
    Object(Arc<dyn Inspect>),
    /// Value that is already JSON.
    Json(serde_json::Value),
}

impl Payload {
    pub fn object(value: impl Inspect + 'static) -> Self {
        Payload::Object(Arc::new(value))
    }

    pub fn record(
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = (impl Into<String>, Payload)>,
    ) -> Self {
        Payload::Record(Record {
            type_name: type_name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    pub fn map(entries: impl IntoIterator<Item = (impl Into<String>, Payload)>) -> Self {
        Payload::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Payload::Bytes(data.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null | Payload::Json(serde_json::Value::Null))
    }

    /// Looks up `key` as a mapping key, record field or object attribute.
    ///
    /// Returns `Ok(None)` when the key is absent or the payload has no named
    /// members at all.
    pub fn lookup(&self, key: &str) -> Result<Option<Payload>, InspectError> {
        match self {
            Payload::Map(entries) => Ok(entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())),
            Payload::Record(record) => Ok(record
                .fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())),
            Payload::Object(obj) => obj.attr(key),
            Payload::Json(serde_json::Value::Object(map)) => {
                Ok(map.get(key).cloned().map(Payload::Json))
            }
            _ => Ok(None),
        }
    }

    /// String form of the value, the equivalent of asking an object to print itself.
    pub fn describe(&self) -> Result<String, InspectError> {
        match self {
            Payload::Null => Ok("None".to_string()),
            Payload::Bool(b) => Ok(b.to_string()),
            Payload::Int(i) => Ok(i.to_string()),
            Payload::Float(f) => Ok(f.to_string()),
            Payload::Str(s) => Ok(s.clone()),
            Payload::Bytes(b) => Ok(format!("<{} bytes>", b.len())),
            Payload::List(items) => {
                let parts: Vec<String> = items.iter().map(describe_or_placeholder).collect();
                Ok(format!("[{}]", parts.join(", ")))
            }
            Payload::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", describe_or_placeholder(v)))
                    .collect();
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            Payload::Record(record) => {
                let parts: Vec<String> = record
                    .fields
                    .iter()
                    .map(|(k, v)| format!("{k}={}", describe_or_placeholder(v)))
                    .collect();
                Ok(format!("{}({})", record.type_name, parts.join(", ")))
            }
            Payload::Object(obj) => obj.describe(),
            Payload::Json(value) => Ok(match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }
}

fn describe_or_placeholder(value: &Payload) -> String {
    value.describe().unwrap_or_else(|_| "?".to_string())
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Null => f.write_str("Null"),
            Payload::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Payload::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Payload::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Payload::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Payload::Bytes(b) => write!(f, "Bytes(len={})", b.len()),
            Payload::List(items) => f.debug_tuple("List").field(items).finish(),
            Payload::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Payload::Record(record) => f.debug_tuple("Record").field(record).finish(),
            Payload::Object(obj) => write!(f, "Object({})", obj.type_name()),
            Payload::Json(value) => f.debug_tuple("Json").field(value).finish(),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Str(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Str(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Int(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Payload::Float(value)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map_or(Payload::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Agent {
        name: &'static str,
    }

    impl Inspect for Agent {
        fn type_name(&self) -> &str {
            "Agent"
        }

        fn attr(&self, name: &str) -> Result<Option<Payload>, InspectError> {
            Ok((name == "name").then(|| Payload::from(self.name)))
        }
    }

    #[test]
    fn lookup_covers_maps_records_objects_and_json() {
        let map = Payload::map([("name", Payload::from("calc"))]);
        let record = Payload::record("Call", [("tool_name", Payload::from("calc"))]);
        let object = Payload::object(Agent { name: "calc" });
        let json = Payload::Json(serde_json::json!({"function_name": "calc"}));

        assert!(map.lookup("name").unwrap().is_some());
        assert!(record.lookup("tool_name").unwrap().is_some());
        assert!(object.lookup("name").unwrap().is_some());
        assert!(json.lookup("function_name").unwrap().is_some());
        assert!(Payload::from("text").lookup("name").unwrap().is_none());
    }

    #[test]
    fn describe_renders_records_and_defaults_objects_to_type_name() {
        let record = Payload::record(
            "Usage",
            [("input", Payload::Int(3)), ("output", Payload::Int(4))],
        );
        assert_eq!(record.describe().unwrap(), "Usage(input=3, output=4)");
        assert_eq!(
            Payload::object(Agent { name: "x" }).describe().unwrap(),
            "<Agent>"
        );
    }

    #[test]
    fn option_conversion_maps_none_to_null() {
        assert!(Payload::from(None::<&str>).is_null());
        assert!(!Payload::from(Some("x")).is_null());
    }
}
