use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Types usable as structured chat output. Blanket-implemented for anything that
/// derives `JsonSchema` and can be deserialized back out of the model's JSON.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Build a JSON Schema document matching the strict-mode constraints the
    /// chat-completions `json_schema` response format requires:
    /// 1. `additionalProperties: false` on every object schema
    /// 2. every property listed in `required`, even optional ones
    /// 3. fully inlined (no `$ref`)
    fn json_schema_strict() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        fix_object_schemas(&mut value);
        inline_refs(&mut value);

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn fix_object_schemas(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
            map.insert(
                "additionalProperties".to_string(),
                serde_json::Value::Bool(false),
            );

            if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                let all_keys: Vec<serde_json::Value> = props
                    .keys()
                    .map(|k| serde_json::Value::String(k.clone()))
                    .collect();
                map.insert("required".to_string(), serde_json::Value::Array(all_keys));
            }
        }

        for (_, v) in map.iter_mut() {
            fix_object_schemas(v);
        }
    } else if let serde_json::Value::Array(arr) = value {
        for item in arr.iter_mut() {
            fix_object_schemas(item);
        }
    }
}

fn inline_refs(value: &mut serde_json::Value) {
    let definitions = if let serde_json::Value::Object(map) = value {
        map.get("definitions").cloned()
    } else {
        None
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if ref_path.starts_with("#/definitions/") {
                    let type_name = ref_path.trim_start_matches("#/definitions/");
                    if let Some(def) = definitions.get(type_name) {
                        *value = def.clone();
                        inline_refs_recursive(value, definitions);
                        return;
                    }
                }
            }

            if let Some(serde_json::Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    *value = all_of.into_iter().next().unwrap();
                    inline_refs_recursive(value, definitions);
                    return;
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Inner {
        name: String,
        nickname: Option<String>,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Outer {
        inner: Inner,
        count: u32,
    }

    #[test]
    fn additional_properties_is_false_everywhere() {
        let schema = Outer::json_schema_strict();
        let s = serde_json::to_string(&schema).unwrap();
        assert!(s.contains("additionalProperties"));
    }

    #[test]
    fn all_properties_required_even_optional_ones() {
        let schema = Outer::json_schema_strict();
        let inner = schema["properties"]["inner"].as_object().unwrap();
        let required: Vec<&str> = inner["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"nickname"));
        assert!(required.contains(&"name"));
    }

    #[test]
    fn nested_structs_are_inlined_not_ref() {
        let schema = Outer::json_schema_strict();
        assert!(schema.get("definitions").is_none());
        let inner = schema["properties"]["inner"].as_object().unwrap();
        assert!(!inner.contains_key("$ref"));
    }
}
