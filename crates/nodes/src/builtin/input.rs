//! `input` — capture a caller-provided input value.
//!
//! Resolution order: preset `value` in config, then the caller input map
//! under `input_key`, then the configured `default`. The resolved value is
//! cast to the expected type before it is emitted.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::builtin::{cfg, cfg_bool, cfg_str, render};
use crate::contract::{NodeContext, NodeKind};
use crate::NodeError;

pub struct InputNode;

impl InputNode {
    fn resolve(config: &Value, ctx: &NodeContext, key: &str) -> Option<(Value, &'static str)> {
        if let Some(v) = cfg(config, "value") {
            return Some((v.clone(), "config"));
        }
        if let Some(v) = ctx.caller_inputs().get(key) {
            return Some((v.clone(), "caller"));
        }
        cfg(config, "default").map(|v| (v.clone(), "default"))
    }

    fn cast(value: Value, expected: &str) -> Result<Value, NodeError> {
        match expected {
            "text" => Ok(Value::String(render(&value))),
            "number" => match &value {
                Value::Number(_) => Ok(value),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| NodeError::fatal(format!("'{s}' is not a number"))),
                other => Err(NodeError::fatal(format!("cannot cast {other} to number"))),
            },
            "boolean" => match &value {
                Value::Bool(_) => Ok(value),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(NodeError::fatal(format!("'{s}' is not a boolean"))),
                },
                other => Err(NodeError::fatal(format!("cannot cast {other} to boolean"))),
            },
            // "json" and anything unrecognised pass through untouched
            _ => Ok(value),
        }
    }
}

#[async_trait]
impl NodeKind for InputNode {
    async fn run(
        &self,
        config: &Value,
        _inputs: &Map<String, Value>,
        ctx: &NodeContext,
    ) -> Result<Value, NodeError> {
        let key = cfg_str(config, "input_key").unwrap_or("value");
        let required = cfg_bool(config, "required").unwrap_or(true);
        let expected = cfg_str(config, "type").unwrap_or("text");

        match Self::resolve(config, ctx, key) {
            Some((value, source)) => {
                tracing::debug!(node_id = %ctx.node_id, source, "input resolved");
                Self::cast(value, expected)
            }
            None if required => Err(NodeError::fatal(format!(
                "no value found for input key '{key}'"
            ))),
            None => Ok(Value::Null),
        }
    }

    fn config_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input_key": { "type": "string" },
                "value": {},
                "default": {},
                "required": { "type": "boolean" },
                "type": { "type": "string", "enum": ["text", "number", "boolean", "json"] }
            }
        })
    }
}
