use serde_json::Value;

/// Render a JSON value as a filter operand (`eq.<operand>`), dropping control characters.
pub fn value_to_operand(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    };
    sanitize_operand(raw)
}

fn sanitize_operand(s: String) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}
