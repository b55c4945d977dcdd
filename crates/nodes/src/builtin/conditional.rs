//! `conditional` — if/else branching over typed comparisons.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::builtin::{cfg, cfg_str};
use crate::contract::{NodeContext, NodeKind};
use crate::NodeError;

pub struct ConditionalNode;

impl ConditionalNode {
    /// Coerce a condition operand: strings are re-parsed as booleans,
    /// null, numbers or JSON where possible; everything else passes
    /// through. Template resolution already happened, so operands like
    /// `"42"` arrive as strings.
    fn parse_operand(value: &Value) -> Value {
        let Value::String(s) = value else {
            return value.clone();
        };
        match s.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            trimmed => {
                if let Ok(n) = trimmed.parse::<i64>() {
                    return json!(n);
                }
                if let Ok(f) = trimmed.parse::<f64>() {
                    return json!(f);
                }
                serde_json::from_str(trimmed).unwrap_or_else(|_| value.clone())
            }
        }
    }

    fn evaluate(op: &str, left: &Value, right: &Value) -> Result<bool, NodeError> {
        let as_num = |v: &Value| v.as_f64();
        let as_text = |v: &Value| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let passed = match op {
            "equals" => left == right,
            "not_equals" => left != right,
            "greater_than" => match (as_num(left), as_num(right)) {
                (Some(l), Some(r)) => l > r,
                _ => as_text(left) > as_text(right),
            },
            "less_than" => match (as_num(left), as_num(right)) {
                (Some(l), Some(r)) => l < r,
                _ => as_text(left) < as_text(right),
            },
            "contains" => match (left, right) {
                (Value::String(l), r) => l.contains(&as_text(r)),
                (Value::Array(items), r) => items.contains(r),
                (Value::Object(map), Value::String(key)) => map.contains_key(key),
                _ => false,
            },
            "starts_with" => as_text(left).starts_with(&as_text(right)),
            "ends_with" => as_text(left).ends_with(&as_text(right)),
            "is_empty" => match left {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                _ => false,
            },
            "is_not_empty" => !Self::evaluate("is_empty", left, right)?,
            other => return Err(NodeError::fatal(format!("unknown operator '{other}'"))),
        };
        Ok(passed)
    }
}

#[async_trait]
impl NodeKind for ConditionalNode {
    async fn run(
        &self,
        config: &Value,
        _inputs: &Map<String, Value>,
        _ctx: &NodeContext,
    ) -> Result<Value, NodeError> {
        let conditions = cfg(config, "conditions")
            .and_then(Value::as_array)
            .ok_or_else(|| NodeError::fatal("conditional node requires a 'conditions' array"))?;
        let mode = cfg_str(config, "mode").unwrap_or("and").to_ascii_lowercase();

        let mut outcomes = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let left = Self::parse_operand(condition.get("left").unwrap_or(&Value::Null));
            let right = Self::parse_operand(condition.get("right").unwrap_or(&Value::Null));
            let op = condition
                .get("op")
                .and_then(Value::as_str)
                .unwrap_or("equals");

            outcomes.push(Self::evaluate(op, &left, &right)?);
        }

        let result = match mode.as_str() {
            "and" => outcomes.iter().all(|&b| b),
            "or" => outcomes.iter().any(|&b| b),
            other => return Err(NodeError::fatal(format!("unknown mode '{other}'"))),
        };

        Ok(json!({
            "result": result,
            "branch": if result { "true" } else { "false" },
        }))
    }

    fn config_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "conditions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "left": {},
                            "op": { "type": "string" },
                            "right": {}
                        }
                    }
                },
                "mode": { "type": "string", "enum": ["and", "or"] }
            },
            "required": ["conditions"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "result": { "type": "boolean" },
                "branch": { "type": "string" }
            }
        })
    }
}
