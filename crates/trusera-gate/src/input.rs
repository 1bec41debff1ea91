// input.rs — Loading scan results and entities.
//
// Accepted scan-result shapes:
//   [ {component}, ... ]                      bare array
//   { "components": [ ... ] }                 native and CycloneDX
//   { "runs": [ { "results": [ ... ] } ] }    SARIF
//   { "name": ..., ... }                      a single component
//
// Entities use the Cedar entities layout; `uid` is either `{type, id}` or a
// plain string.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::error::GateError;

pub type Component = Map<String, Value>;

/// Read and parse a JSON file.
pub fn read_json(path: &Path) -> Result<Value, GateError> {
    if !path.exists() {
        return Err(GateError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|source| GateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| GateError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Pull the component list out of any supported scan-result shape.
pub fn extract_components(scan: &Value) -> Vec<Component> {
    match scan {
        Value::Array(items) => objects(items),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("components") {
                objects(items)
            } else if let Some(Value::Array(runs)) = map.get("runs") {
                runs.iter().flat_map(sarif_components).collect()
            } else if map.contains_key("name") {
                vec![map.clone()]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

fn objects(items: &[Value]) -> Vec<Component> {
    items
        .iter()
        .filter_map(|item| item.as_object().cloned())
        .collect()
}

fn sarif_components(run: &Value) -> Vec<Component> {
    let Some(results) = run.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    results
        .iter()
        .map(|result| {
            let props = result.get("properties");
            let prop = |key: &str, default: Value| {
                props
                    .and_then(|p| p.get(key))
                    .cloned()
                    .unwrap_or(default)
            };

            let mut component = Map::new();
            component.insert(
                "name".into(),
                result.get("ruleId").cloned().unwrap_or(json!("unknown")),
            );
            component.insert(
                "severity".into(),
                result.get("level").cloned().unwrap_or(json!("none")),
            );
            component.insert("component_type".into(), prop("component_type", json!("unknown")));
            component.insert("provider".into(), prop("provider", json!("unknown")));
            component.insert("risk_score".into(), prop("risk_score", json!(0)));

            let physical = result
                .get("locations")
                .and_then(Value::as_array)
                .and_then(|locations| locations.first())
                .and_then(|location| location.get("physicalLocation"));
            if let Some(physical) = physical {
                let uri = physical
                    .pointer("/artifactLocation/uri")
                    .cloned()
                    .unwrap_or(json!(""));
                let line = physical
                    .pointer("/region/startLine")
                    .cloned()
                    .unwrap_or(json!(0));
                component.insert("file_path".into(), uri);
                component.insert("line_number".into(), line);
            }
            component
        })
        .collect()
}

/// Extra attributes keyed by component name.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    attrs: HashMap<String, Map<String, Value>>,
}

impl EntityStore {
    pub fn from_json(doc: &Value) -> Self {
        let mut attrs = HashMap::new();
        let entities = doc
            .get("entities")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for entity in entities {
            let id = match entity.get("uid") {
                Some(Value::Object(uid)) => uid.get("id").and_then(Value::as_str).map(str::to_string),
                Some(Value::String(uid)) => Some(uid.clone()),
                Some(other) if !other.is_null() => Some(other.to_string()),
                _ => None,
            };
            let Some(id) = id.filter(|id| !id.is_empty()) else {
                continue;
            };
            let entity_attrs = entity
                .get("attrs")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            attrs.insert(id, entity_attrs);
        }

        Self { attrs }
    }

    pub fn load(path: &Path) -> Result<Self, GateError> {
        Ok(Self::from_json(&read_json(path)?))
    }

    pub fn get(&self, name: &str) -> Option<&Map<String, Value>> {
        self.attrs.get(name)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}
