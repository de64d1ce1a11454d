//! Typed accessors over filtered tool arguments.

use chimera_core::error::ToolError;
use chimera_core::tool::ToolArgs;
use serde_json::Value;

pub(crate) fn required_str<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

pub(crate) fn optional_str<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Accepts numbers and numeric strings; models emit both.
pub(crate) fn optional_usize(args: &ToolArgs, key: &str) -> Option<usize> {
    match args.get(key)? {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn optional_bool(args: &ToolArgs, key: &str) -> Option<bool> {
    match args.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// String arguments given either as a list or as one whitespace-separated string.
pub(crate) fn string_list(args: &ToolArgs, key: &str) -> Vec<String> {
    match args.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => s.split_whitespace().map(String::from).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(v: Value) -> ToolArgs {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn numbers_may_arrive_as_strings() {
        let a = args(json!({"n": "7", "m": 3, "x": "seven"}));
        assert_eq!(optional_usize(&a, "n"), Some(7));
        assert_eq!(optional_usize(&a, "m"), Some(3));
        assert_eq!(optional_usize(&a, "x"), None);
    }

    #[test]
    fn list_accepts_array_or_string() {
        assert_eq!(string_list(&args(json!({"a": ["x", 1]})), "a"), vec!["x", "1"]);
        assert_eq!(string_list(&args(json!({"a": "--fast  -v"})), "a"), vec!["--fast", "-v"]);
        assert!(string_list(&args(json!({})), "a").is_empty());
    }

    #[test]
    fn missing_required_names_the_key() {
        let err = required_str(&args(json!({})), "filename").unwrap_err();
        assert!(err.to_string().contains("filename"));
    }
}
