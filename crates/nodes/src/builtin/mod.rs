//! Built-in node kinds.
//!
//! All built-ins are deterministic and pure — provider-wrapping kinds
//! (LLM, image, HTTP, …) live outside this crate and register themselves
//! through the same [`NodeDescriptor`] path.

use std::sync::Arc;

use serde_json::Value;

use crate::registry::{NodeDescriptor, NodeRegistry, RegistryError};

pub mod concat;
pub mod conditional;
pub mod echo;
pub mod input;
pub mod literal;
pub mod output;

pub use concat::ConcatNode;
pub use conditional::ConditionalNode;
pub use echo::EchoNode;
pub use input::InputNode;
pub use literal::LiteralNode;
pub use output::OutputNode;

/// The kind whose nodes act as workflow sinks.
pub const OUTPUT_KIND: &str = "output";

/// Register every built-in kind. Idempotent.
pub fn register_builtins(registry: &mut NodeRegistry) -> Result<(), RegistryError> {
    registry.register(NodeDescriptor::new(
        "literal",
        "Literal",
        "Emit a configured value unchanged",
        "Input/Output",
        Arc::new(LiteralNode),
    ))?;
    registry.register(NodeDescriptor::new(
        "input",
        "User Input",
        "Capture a caller-provided input value",
        "Input/Output",
        Arc::new(InputNode),
    ))?;
    registry.register(NodeDescriptor::new(
        OUTPUT_KIND,
        "Output",
        "Collect and format final workflow results",
        "Input/Output",
        Arc::new(OutputNode),
    ))?;
    registry.register(NodeDescriptor::new(
        "echo",
        "Echo",
        "Emit the configured text with an optional prefix",
        "Text",
        Arc::new(EchoNode),
    ))?;
    registry.register(NodeDescriptor::new(
        "concat",
        "Concatenate",
        "Join text or predecessor outputs into one string",
        "Text",
        Arc::new(ConcatNode),
    ))?;
    registry.register(NodeDescriptor::new(
        "conditional",
        "Conditional Logic",
        "Evaluate comparisons combined with and/or",
        "Logic",
        Arc::new(ConditionalNode),
    ))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared config helpers
// ---------------------------------------------------------------------------

pub(crate) fn cfg<'a>(config: &'a Value, key: &str) -> Option<&'a Value> {
    config.get(key)
}

pub(crate) fn cfg_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

pub(crate) fn cfg_bool(config: &Value, key: &str) -> Option<bool> {
    config.get(key).and_then(Value::as_bool)
}

/// Natural text form of a JSON value: strings verbatim, null empty,
/// everything structured as canonical JSON.
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
