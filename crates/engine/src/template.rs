//! `{{path}}` template resolution against an execution context.
//!
//! Paths are dot-separated: the first segment is looked up in the context
//! map, subsequent segments descend into objects by key and into arrays by
//! index.  Unresolved references pass through unchanged — resolution is
//! total and side-effect free.  Substituted content is never rescanned, so
//! a second pass over already-resolved output is a no-op.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}").unwrap()
    })
}

/// Resolve every `{{path}}` placeholder in `template` against `context`.
pub fn resolve(template: &str, context: &Map<String, Value>) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures<'_>| match lookup(context, &caps[1]) {
            Some(value) => render(value),
            // Unresolved reference: keep the placeholder verbatim.
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Resolve templates recursively through a structured configuration value:
/// every string leaf is resolved, everything else is returned unchanged.
pub fn resolve_value(value: &Value, context: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(resolve(s, context)),
        Value::Array(items) => Value::Array(
            items.iter().map(|v| resolve_value(v, context)).collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Walk a dot-separated path through the context.
fn lookup<'a>(context: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = context.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Natural text form of a resolved value: strings verbatim, null empty,
/// structured values as canonical JSON.
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn resolves_simple_reference() {
        let ctx = context(&[("name", json!("world"))]);
        assert_eq!(resolve("hello {{name}}", &ctx), "hello world");
    }

    #[test]
    fn resolves_nested_paths() {
        let ctx = context(&[("gen", json!({ "data": { "text": "done" } }))]);
        assert_eq!(resolve("{{gen.data.text}}", &ctx), "done");
    }

    #[test]
    fn indexes_into_arrays() {
        let ctx = context(&[("items", json!(["a", "b", "c"]))]);
        assert_eq!(resolve("{{items.1}}", &ctx), "b");
        // out of range passes through
        assert_eq!(resolve("{{items.9}}", &ctx), "{{items.9}}");
    }

    #[test]
    fn unresolved_reference_passes_through() {
        let ctx = Map::new();
        assert_eq!(resolve("{{missing.key}}", &ctx), "{{missing.key}}");
    }

    #[test]
    fn null_renders_empty_and_structures_render_as_json() {
        let ctx = context(&[("gone", Value::Null), ("obj", json!({ "a": 1 }))]);
        assert_eq!(resolve("[{{gone}}]", &ctx), "[]");
        assert_eq!(resolve("{{obj}}", &ctx), r#"{"a":1}"#);
    }

    #[test]
    fn numbers_and_booleans_use_natural_form() {
        let ctx = context(&[("n", json!(42)), ("b", json!(true))]);
        assert_eq!(resolve("{{n}}/{{b}}", &ctx), "42/true");
    }

    #[test]
    fn resolution_is_idempotent() {
        let ctx = context(&[
            ("topic", json!("rust")),
            ("missing_stays", json!("{{other}}")),
        ]);
        let template = "write about {{topic}} and {{absent}}";
        let once = resolve(template, &ctx);
        assert_eq!(resolve(&once, &ctx), once);
    }

    #[test]
    fn resolve_value_walks_structures() {
        let ctx = context(&[("user", json!("ada"))]);
        let config = json!({
            "greeting": "hi {{user}}",
            "retries": 3,
            "headers": ["x-{{user}}", 1]
        });

        let resolved = resolve_value(&config, &ctx);
        assert_eq!(
            resolved,
            json!({
                "greeting": "hi ada",
                "retries": 3,
                "headers": ["x-ada", 1]
            })
        );
    }

    #[test]
    fn malformed_placeholders_are_left_alone() {
        let ctx = context(&[("a", json!("x"))]);
        assert_eq!(resolve("{{ }}", &ctx), "{{ }}");
        assert_eq!(resolve("{{1bad}}", &ctx), "{{1bad}}");
        assert_eq!(resolve("{ {a} }", &ctx), "{ {a} }");
    }
}
