//! `literal` — emit the configured value unchanged.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::builtin::cfg;
use crate::contract::{NodeContext, NodeKind};
use crate::NodeError;

pub struct LiteralNode;

#[async_trait]
impl NodeKind for LiteralNode {
    async fn run(
        &self,
        config: &Value,
        _inputs: &Map<String, Value>,
        _ctx: &NodeContext,
    ) -> Result<Value, NodeError> {
        cfg(config, "value")
            .cloned()
            .ok_or_else(|| NodeError::fatal("literal node requires a 'value' config entry"))
    }

    fn config_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "value": { "description": "Any JSON value to emit" }
            },
            "required": ["value"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({ "description": "The configured value, verbatim" })
    }
}
