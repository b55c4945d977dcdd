//! `echo` — emit the configured text with an optional prefix.
//!
//! Template references in `text` are resolved by the executor before the
//! node runs, so this node only concatenates.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::builtin::{cfg, cfg_str, render};
use crate::contract::{NodeContext, NodeKind};
use crate::NodeError;

pub struct EchoNode;

#[async_trait]
impl NodeKind for EchoNode {
    async fn run(
        &self,
        config: &Value,
        _inputs: &Map<String, Value>,
        _ctx: &NodeContext,
    ) -> Result<Value, NodeError> {
        let text = cfg(config, "text")
            .map(render)
            .ok_or_else(|| NodeError::fatal("echo node requires a 'text' config entry"))?;
        let prefix = cfg_str(config, "prefix").unwrap_or_default();

        Ok(Value::String(format!("{prefix}{text}")))
    }

    fn config_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "prefix": { "type": "string" }
            },
            "required": ["text"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({ "type": "string" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn prepends_prefix() {
        let ctx = NodeContext::detached("echo");
        let out = EchoNode
            .run(&json!({ "prefix": "X-", "text": "hi" }), &Map::new(), &ctx)
            .await
            .unwrap();
        assert_eq!(out, json!("X-hi"));
    }

    #[tokio::test]
    async fn prefix_is_optional() {
        let ctx = NodeContext::detached("echo");
        let out = EchoNode
            .run(&json!({ "text": "plain" }), &Map::new(), &ctx)
            .await
            .unwrap();
        assert_eq!(out, json!("plain"));
    }
}
