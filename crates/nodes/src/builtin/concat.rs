//! `concat` — join text or predecessor outputs into one string.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::builtin::{cfg, cfg_str, render};
use crate::contract::{NodeContext, NodeKind};
use crate::NodeError;

pub struct ConcatNode;

#[async_trait]
impl NodeKind for ConcatNode {
    /// With a `text` entry the (already template-resolved) text is emitted
    /// directly. Without one, the predecessor outputs are rendered and
    /// joined with `separator`, ordered by node id for determinism.
    async fn run(
        &self,
        config: &Value,
        inputs: &Map<String, Value>,
        _ctx: &NodeContext,
    ) -> Result<Value, NodeError> {
        if let Some(text) = cfg(config, "text") {
            return Ok(Value::String(render(text)));
        }

        let separator = cfg_str(config, "separator").unwrap_or_default();
        let joined = inputs
            .iter()
            .map(|(_, v)| render(v))
            .collect::<Vec<_>>()
            .join(separator);

        Ok(Value::String(joined))
    }

    fn config_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "separator": { "type": "string" }
            }
        })
    }

    fn output_schema(&self) -> Value {
        json!({ "type": "string" })
    }
}
