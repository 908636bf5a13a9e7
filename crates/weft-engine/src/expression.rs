//! Variable references and string templates.
//!
//! Three forms are recognised in node data:
//!
//! - `"${path}"`: the whole string is one reference; resolves to the raw value.
//! - `"text ${path} text"`: a template; each reference is replaced by the
//!   value's string form, unresolved references stay as literal text.
//! - anything without `${`: returned unchanged.
//!
//! A path whose first segment is `inputs`, `outputs` or `state` is resolved
//! against that bucket. Any other path is tried against `outputs`, then
//! `inputs`, then `state`.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use weft_core::context::{ExecutionContext, Scope};
use weft_core::types::Outputs;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([^{}]+)\}").expect("placeholder pattern is valid")
    })
}

/// Resolve every string inside `value`, walking nested objects and arrays.
pub fn resolve_value(value: &Value, scope: Scope<'_>) -> Value {
    match value {
        Value::String(s) => resolve_str(s, scope),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, scope)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, scope)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve a single string.
///
/// An exact reference that cannot be resolved yields `Value::Null`.
pub fn resolve_str(s: &str, scope: Scope<'_>) -> Value {
    if !s.contains("${") {
        return Value::String(s.to_string());
    }
    if let Some(path) = exact_reference(s) {
        return lookup(path, scope).unwrap_or(Value::Null);
    }
    Value::String(render_template(s, scope))
}

/// If `s` consists of exactly one `${...}` reference, return its path.
pub fn exact_reference(s: &str) -> Option<&str> {
    let caps = placeholder().captures(s)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == s.len() {
        caps.get(1).map(|m| m.as_str().trim())
    } else {
        None
    }
}

/// Substitute every reference in `template` with its string form.
pub fn render_template(template: &str, scope: Scope<'_>) -> String {
    placeholder()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            match lookup(caps[1].trim(), scope) {
                Some(v) => display(&v),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Resolve a dotted path against the scope. `None` means undefined.
pub fn lookup(path: &str, scope: Scope<'_>) -> Option<Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    match head {
        "inputs" => walk(scope.inputs, rest),
        "outputs" => walk(scope.outputs, rest),
        "state" => walk(scope.state, rest),
        _ => walk(scope.outputs, Some(path))
            .or_else(|| walk(scope.inputs, Some(path)))
            .or_else(|| walk(scope.state, Some(path))),
    }
}

fn walk(bucket: &Outputs, path: Option<&str>) -> Option<Value> {
    let Some(path) = path else {
        return Some(Value::Object(bucket.clone()));
    };

    let mut segments = path.split('.');
    let mut current = bucket.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

/// String form used when a value is spliced into a template.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve `value` against the current state of a run.
pub fn resolve_in(ctx: &ExecutionContext, value: &Value) -> Value {
    ctx.with_scope(|scope| resolve_value(value, scope))
}

/// Render `template` against the current state of a run.
pub fn render_in(ctx: &ExecutionContext, template: &str) -> String {
    ctx.with_scope(|scope| render_template(template, scope))
}
