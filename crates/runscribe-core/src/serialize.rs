//! Total conversion of runtime payloads into JSON.
//!
//! Nothing in here returns an error: unrepresentable values degrade to their
//! string form and finally to [`UNSERIALIZABLE`].

use serde_json::{Map, Value};

use crate::errors::InspectError;
use crate::payload::{Inspect, Payload};

/// Sentinel emitted when a value has neither a JSON nor a string form.
pub const UNSERIALIZABLE: &str = "<unserializable>";

/// Nesting depth after which values are rendered as strings; guards against
/// self-referencing objects.
const MAX_DEPTH: usize = 64;

/// Converts `value` into a JSON-representable value. Never fails.
///
/// Order of precedence: structured record, self-describing dump, attribute
/// bag, collection, binary blob, primitive.
pub fn to_jsonable(value: &Payload) -> Value {
    convert(value, 0)
}

/// Serializes `value` to JSON text, falling back to its string form and
/// then to [`UNSERIALIZABLE`].
pub fn dump_safe(value: &Payload) -> String {
    match serde_json::to_string(&to_jsonable(value)) {
        Ok(text) => text,
        Err(_) => match value.describe() {
            Ok(text) => serde_json::to_string(&text).unwrap_or_else(|_| UNSERIALIZABLE.to_string()),
            Err(_) => UNSERIALIZABLE.to_string(),
        },
    }
}

/// Text form of an already-converted value: strings are used verbatim,
/// everything else as compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn convert(value: &Payload, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return fallback_string(value);
    }
    match try_convert(value, depth) {
        Ok(json) => json,
        Err(_) => fallback_string(value),
    }
}

fn fallback_string(value: &Payload) -> Value {
    match value.describe() {
        Ok(text) => Value::String(text),
        Err(_) => Value::String(UNSERIALIZABLE.to_string()),
    }
}

fn try_convert(value: &Payload, depth: usize) -> Result<Value, InspectError> {
    match value {
        Payload::Record(record) => Ok(Value::Object(convert_entries(&record.fields, depth))),
        Payload::Object(obj) => convert_object(obj.as_ref(), depth),
        Payload::Map(entries) => Ok(Value::Object(convert_entries(entries, depth))),
        Payload::List(items) => Ok(convert_list(items, depth)),
        Payload::Bytes(data) => Ok(serde_json::json!({
            "is_binary": true,
            "length": data.len(),
        })),
        Payload::Null => Ok(Value::Null),
        Payload::Bool(b) => Ok(Value::Bool(*b)),
        Payload::Int(i) => Ok(Value::from(*i)),
        Payload::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| InspectError::new(format!("non-finite float {f}"))),
        Payload::Str(s) => Ok(Value::String(s.clone())),
        Payload::Json(json) => Ok(json.clone()),
    }
}

fn convert_entries(entries: &[(String, Payload)], depth: usize) -> Map<String, Value> {
    let mut map = Map::with_capacity(entries.len());
    for (key, value) in entries {
        if !map.contains_key(key) {
            map.insert(key.clone(), convert(value, depth + 1));
        }
    }
    map
}

fn convert_object(obj: &dyn Inspect, depth: usize) -> Result<Value, InspectError> {
    if let Some(Ok(dumped)) = obj.dump() {
        return Ok(convert(&dumped, depth + 1));
    }
    if let Some(Ok(json)) = obj.dump_json() {
        return Ok(json);
    }
    match obj.attributes() {
        Some(Ok(attrs)) => Ok(Value::Object(convert_entries(&attrs, depth))),
        Some(Err(err)) => Err(err),
        None => Err(InspectError::new(format!(
            "{} exposes no serializable form",
            obj.type_name()
        ))),
    }
}

fn convert_list(items: &[Payload], depth: usize) -> Value {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if depth + 1 > MAX_DEPTH {
            return opaque_list(items);
        }
        match try_convert(item, depth + 1) {
            Ok(json) => out.push(json),
            Err(_) => return opaque_list(items),
        }
    }
    Value::Array(out)
}

/// Element-level failure: keep the collection, but as opaque string elements.
fn opaque_list(items: &[Payload]) -> Value {
    Value::Array(items.iter().map(fallback_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Dumps;

    impl Inspect for Dumps {
        fn type_name(&self) -> &str {
            "Dumps"
        }
        fn attr(&self, _name: &str) -> Result<Option<Payload>, InspectError> {
            Ok(None)
        }
        fn dump(&self) -> Option<Result<Payload, InspectError>> {
            Some(Err(InspectError::new("model_dump failed")))
        }
        fn dump_json(&self) -> Option<Result<Value, InspectError>> {
            Some(Ok(json!({"via": "dump_json"})))
        }
        fn attributes(&self) -> Option<Result<Vec<(String, Payload)>, InspectError>> {
            Some(Ok(vec![("via".into(), Payload::from("attributes"))]))
        }
    }

    struct AttrBag;

    impl Inspect for AttrBag {
        fn type_name(&self) -> &str {
            "AttrBag"
        }
        fn attr(&self, _name: &str) -> Result<Option<Payload>, InspectError> {
            Ok(None)
        }
        fn attributes(&self) -> Option<Result<Vec<(String, Payload)>, InspectError>> {
            Some(Ok(vec![
                ("b".into(), Payload::Int(2)),
                ("a".into(), Payload::bytes(vec![0u8; 4])),
            ]))
        }
    }

    struct Opaque;

    impl Inspect for Opaque {
        fn type_name(&self) -> &str {
            "Opaque"
        }
        fn attr(&self, _name: &str) -> Result<Option<Payload>, InspectError> {
            Err(InspectError::new("no attributes"))
        }
        fn describe(&self) -> Result<String, InspectError> {
            Err(InspectError::new("no repr either"))
        }
    }

    #[test]
    fn primitives_are_returned_unchanged() {
        for value in [json!(null), json!(true), json!(42), json!(1.5), json!("hi")] {
            assert_eq!(to_jsonable(&Payload::Json(value.clone())), value);
        }
        assert_eq!(to_jsonable(&Payload::Int(7)), json!(7));
        assert_eq!(to_jsonable(&Payload::from("x")), json!("x"));
        assert_eq!(to_jsonable(&Payload::Bool(false)), json!(false));
        assert_eq!(to_jsonable(&Payload::Null), json!(null));
    }

    #[test]
    fn record_fields_keep_declaration_order() {
        let record = Payload::record(
            "ToolCall",
            [
                ("name", Payload::from("calc")),
                ("arguments", Payload::from("2+2")),
                ("call_id", Payload::Int(1)),
            ],
        );
        let value = to_jsonable(&record);
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["name", "arguments", "call_id"]);
    }

    #[test]
    fn first_successful_dump_wins_over_attribute_bag() {
        assert_eq!(
            to_jsonable(&Payload::object(Dumps)),
            json!({"via": "dump_json"})
        );
    }

    #[test]
    fn attribute_bag_is_converted_recursively() {
        assert_eq!(
            to_jsonable(&Payload::object(AttrBag)),
            json!({"b": 2, "a": {"is_binary": true, "length": 4}})
        );
    }

    #[test]
    fn bytes_never_embed_raw_content() {
        assert_eq!(
            to_jsonable(&Payload::bytes(b"\x00\xffpng".to_vec())),
            json!({"is_binary": true, "length": 5})
        );
    }

    #[test]
    fn failing_list_element_degrades_whole_list_to_opaque_elements() {
        let list = Payload::List(vec![Payload::Int(1), Payload::Float(f64::NAN)]);
        assert_eq!(to_jsonable(&list), json!(["1", "NaN"]));
    }

    #[test]
    fn unrepresentable_object_degrades_to_sentinel() {
        assert_eq!(to_jsonable(&Payload::object(Opaque)), json!(UNSERIALIZABLE));
        assert_eq!(dump_safe(&Payload::object(Opaque)), "\"<unserializable>\"");
    }

    #[test]
    fn dump_safe_produces_compact_json() {
        let map = Payload::map([("k", Payload::from("v"))]);
        assert_eq!(dump_safe(&map), r#"{"k":"v"}"#);
    }

    #[test]
    fn render_value_keeps_strings_verbatim() {
        assert_eq!(render_value(&json!("2+2")), "2+2");
        assert_eq!(render_value(&json!({"x": 1})), r#"{"x":1}"#);
    }
}
