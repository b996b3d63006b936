//! Formatting helpers for CLI commands.

use serde_json::Value;

/// Parses a `KEY=VALUE` tag argument.
///
/// # Errors
///
/// Returns a message if there is no `=` or the key is empty.
pub fn parse_tag(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("invalid tag `{arg}`: expected KEY=VALUE"))?;
    if key.trim().is_empty() {
        return Err(format!("invalid tag `{arg}`: empty key"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

/// Renders a template value for display.
///
/// Intrinsic functions are shown in a compact form: `Ref` as the logical
/// id, `Fn::GetAtt` as `Id.Attribute`, and `Fn::Join` as the concatenation
/// of its parts.
#[must_use]
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("Ref") {
                return format!("<{id}>");
            }
            if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                let parts: Vec<String> = parts.iter().map(format_value).collect();
                return format!("<{}>", parts.join("."));
            }
            if let Some(parts) = map
                .get("Fn::Join")
                .and_then(Value::as_array)
                .and_then(|j| j.get(1))
                .and_then(Value::as_array)
            {
                return parts.iter().map(format_value).collect();
            }
            value.to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_tag_splits_on_first_equals() {
        assert_eq!(parse_tag("a=b=c"), Ok(("a".into(), "b=c".into())));
        assert_eq!(parse_tag("team="), Ok(("team".into(), String::new())));
    }

    #[test]
    fn parse_tag_rejects_missing_key_or_separator() {
        assert!(parse_tag("novalue").is_err());
        assert!(parse_tag("=x").is_err());
    }

    #[test]
    fn format_value_compacts_intrinsics() {
        assert_eq!(format_value(&json!("plain")), "plain");
        assert_eq!(format_value(&json!({ "Ref": "Secret1" })), "<Secret1>");
        assert_eq!(
            format_value(&json!({ "Fn::GetAtt": ["Cluster1", "Endpoint.Port"] })),
            "<Cluster1.Endpoint.Port>"
        );
        assert_eq!(
            format_value(&json!({ "Fn::Join": ["", ["a:", { "Ref": "X" }]] })),
            "a:<X>"
        );
        assert_eq!(format_value(&json!(3306)), "3306");
    }
}
