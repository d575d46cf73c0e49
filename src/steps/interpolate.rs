//! Placeholder Interpolation
//!
//! Replaces `{{name}}` with the string form of `name` from the working
//! context. Unknown names stay in the text untouched. Substituted values are
//! not scanned again.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::WorkingContext;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("placeholder pattern must compile"));

/// Substitutes every known `{{name}}` placeholder in `template`.
///
/// # Example
///
/// ```
/// use flowrunner::steps::{interpolate, WorkingContext};
/// use serde_json::json;
///
/// let mut context = WorkingContext::new();
/// context.insert("name".to_string(), json!("Ann"));
///
/// assert_eq!(interpolate("Hi {{name}}", &context), "Hi Ann");
/// assert_eq!(interpolate("Hi {{missing}}", &context), "Hi {{missing}}");
/// ```
pub fn interpolate(template: &str, context: &WorkingContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match context.get(&caps[1]) {
            Some(value) => value_to_string(value).into_owned(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Interpolates every string inside a JSON value, recursively.
pub fn interpolate_value(value: &Value, context: &WorkingContext) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, context)),
        Value::Array(items) => Value::Array(items.iter().map(|v| interpolate_value(v, context)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// String form used for interpolation and condition comparison.
///
/// Strings are used verbatim; anything else is rendered as JSON.
pub fn value_to_string(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> WorkingContext {
        let mut ctx = WorkingContext::new();
        ctx.insert("name".to_string(), json!("Ann"));
        ctx.insert("count".to_string(), json!(3));
        ctx.insert("ok".to_string(), json!(true));
        ctx.insert("nested".to_string(), json!({"a": 1}));
        ctx.insert("tricky".to_string(), json!("{{name}}"));
        ctx
    }

    #[test]
    fn test_simple_placeholder() {
        assert_eq!(interpolate("Hi {{name}}", &context()), "Hi Ann");
    }

    #[test]
    fn test_missing_placeholder_left_literal() {
        assert_eq!(interpolate("Hi {{missing}}", &context()), "Hi {{missing}}");
    }

    #[test]
    fn test_non_string_values() {
        let ctx = context();
        assert_eq!(interpolate("{{count}} items", &ctx), "3 items");
        assert_eq!(interpolate("ok={{ok}}", &ctx), "ok=true");
        assert_eq!(interpolate("{{nested}}", &ctx), r#"{"a":1}"#);
    }

    #[test]
    fn test_multiple_and_repeated() {
        assert_eq!(
            interpolate("{{name}}/{{count}}/{{name}}", &context()),
            "Ann/3/Ann"
        );
    }

    #[test]
    fn test_no_nested_interpolation() {
        assert_eq!(interpolate("x {{tricky}} y", &context()), "x {{name}} y");
    }

    #[test]
    fn test_whitespace_is_part_of_name() {
        assert_eq!(interpolate("{{ name }}", &context()), "{{ name }}");
    }

    #[test]
    fn test_interpolate_value_recurses() {
        let body = json!({"greeting": "Hi {{name}}", "list": ["{{count}}", 7], "flag": false});
        let resolved = interpolate_value(&body, &context());
        assert_eq!(resolved, json!({"greeting": "Hi Ann", "list": ["3", 7], "flag": false}));
    }
}
