use serde_json::Value as JsonValue;

use super::model::StepIndex;
use crate::error::SchemaError;

/// Pull `steps` and `default_color_key` out of the steps resource.
///
/// Nothing is filtered here: surviving events address steps and communities
/// by index, so the index has to stay complete.
pub fn build_step_index(resource: &str, raw: JsonValue) -> Result<(StepIndex, String), SchemaError> {
    let JsonValue::Object(mut obj) = raw else {
        return Err(SchemaError::WrongType {
            resource: resource.to_string(),
            field: "<root>".into(),
            expected: "an object",
        });
    };

    let missing = |field: &str| SchemaError::MissingField {
        resource: resource.to_string(),
        field: field.to_string(),
    };

    let steps = obj.remove("steps").ok_or_else(|| missing("steps"))?;
    let color_key = obj
        .remove("default_color_key")
        .ok_or_else(|| missing("default_color_key"))?;

    let JsonValue::String(default_color_key) = color_key else {
        return Err(SchemaError::WrongType {
            resource: resource.to_string(),
            field: "default_color_key".into(),
            expected: "a string",
        });
    };

    let index: StepIndex = serde_json::from_value(steps).map_err(|source| SchemaError::Invalid {
        resource: resource.to_string(),
        source,
    })?;

    Ok((index, default_color_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_steps_and_color_key() {
        let raw = json!({
            "steps": {
                "1": {"time": 1_400_000_000, "communities": {
                    "1": {"data": {"topic": "#elections", "party": "green"}, "users": [10, 11]},
                }},
                "2": {"time": 1_400_003_600, "communities": {}},
            },
            "default_color_key": "party",
        });
        let (index, key) = build_step_index("x.steps.json", raw).unwrap();
        assert_eq!(key, "party");
        assert_eq!(index.len(), 2);
        assert_eq!(index.community(1, 1).map(|c| c.users.len()), Some(2));
    }

    #[test]
    fn missing_fields_are_schema_errors() {
        let err = build_step_index("x.steps.json", json!({"steps": {}})).unwrap_err();
        assert!(matches!(err, SchemaError::MissingField { ref field, .. } if field == "default_color_key"));

        let err = build_step_index("x.steps.json", json!({"default_color_key": "k"})).unwrap_err();
        assert!(matches!(err, SchemaError::MissingField { ref field, .. } if field == "steps"));
    }

    #[test]
    fn non_string_color_key_is_rejected() {
        let err = build_step_index("x.steps.json", json!({"steps": {}, "default_color_key": 3})).unwrap_err();
        assert!(matches!(err, SchemaError::WrongType { .. }));
    }
}
