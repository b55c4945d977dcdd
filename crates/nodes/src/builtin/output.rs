//! `output` — the designated sink kind.
//!
//! Collects predecessor outputs into the workflow's final result. Three
//! selection modes, checked in order: a `template` string (already resolved
//! by the executor), a `fields` list of dot-paths into the inputs, or the
//! whole input map.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::builtin::{cfg, cfg_str, render};
use crate::contract::{NodeContext, NodeKind};
use crate::NodeError;

pub struct OutputNode;

impl OutputNode {
    /// Resolve a dot-path like `summarize.text` against the input map.
    fn lookup<'a>(inputs: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
        let mut segments = path.split('.');
        let mut current = inputs.get(segments.next()?)?;

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

#[async_trait]
impl NodeKind for OutputNode {
    async fn run(
        &self,
        config: &Value,
        inputs: &Map<String, Value>,
        _ctx: &NodeContext,
    ) -> Result<Value, NodeError> {
        let selected = if let Some(template) = cfg(config, "template") {
            Value::String(render(template))
        } else if let Some(fields) = cfg(config, "fields").and_then(Value::as_array) {
            let mut picked = Map::new();
            for field in fields {
                let Some(path) = field.as_str() else {
                    return Err(NodeError::fatal("'fields' entries must be strings"));
                };
                if let Some(value) = Self::lookup(inputs, path) {
                    picked.insert(path.to_string(), value.clone());
                }
            }
            Value::Object(picked)
        } else {
            Value::Object(inputs.clone())
        };

        let formatted = match cfg_str(config, "format").unwrap_or("auto") {
            "text" => match &selected {
                Value::Object(map) => Value::String(
                    map.iter()
                        .map(|(k, v)| format!("{k}: {}", render(v)))
                        .collect::<Vec<_>>()
                        .join("\n"),
                ),
                other => Value::String(render(other)),
            },
            // "json" and "auto" keep the structured value
            _ => selected,
        };

        Ok(formatted)
    }

    fn config_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "template": { "type": "string" },
                "fields": { "type": "array", "items": { "type": "string" } },
                "format": { "type": "string", "enum": ["auto", "json", "text"] }
            }
        })
    }
}
