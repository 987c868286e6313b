//! Metadata envelope stamped on committed artifacts

use crate::model::RunId;
use crate::naming::DATASET;
use serde_json::{json, Map, Value};

/// Wrap stage fields as `{"modules": {"climate_foresight": {..., "run_id": id}}}`.
///
/// `fields` should be a JSON object; any other value is stored under `"value"`.
pub fn envelope(run: RunId, fields: Value) -> Value {
    let mut module = match fields {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    };
    module.insert("run_id".into(), json!(run));
    json!({ "modules": { DATASET: Value::Object(module) } })
}

/// The stage fields of an envelope, if it has one
pub fn module_fields(metadata: &Value) -> Option<&Map<String, Value>> {
    metadata.get("modules")?.get(DATASET)?.as_object()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let meta = envelope(5, json!({"weights": {"1": 0.5, "2": 0.5}}));
        assert_eq!(meta["modules"]["climate_foresight"]["run_id"], 5);
        let fields = module_fields(&meta).unwrap();
        assert_eq!(fields["weights"]["2"], 0.5);
    }

    #[test]
    fn test_scalar_fields_are_wrapped() {
        let meta = envelope(1, json!(42));
        assert_eq!(module_fields(&meta).unwrap()["value"], 42);
        assert!(module_fields(&json!({})).is_none());
    }
}
