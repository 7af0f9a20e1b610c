use serde_json::Value;

/// Look up `key` on an object, trying the snake_case spelling first and the
/// camelCase spelling second.
pub fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let obj = value.as_object()?;
    if let Some(v) = obj.get(key).filter(|v| !v.is_null()) {
        return Some(v);
    }
    let camel = snake_to_camel(key);
    if camel != key
        && let Some(v) = obj.get(&camel).filter(|v| !v.is_null())
    {
        return Some(v);
    }
    None
}

pub fn field_any<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| field(value, k))
}

pub fn nested<'a>(value: &'a Value, outer: &str, inner: &str) -> Option<&'a Value> {
    field(field(value, outer)?, inner)
}

pub fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn field_number(value: &Value, key: &str) -> Option<f64> {
    field(value, key).and_then(number)
}

pub fn nested_number(value: &Value, outer: &str, inner: &str) -> Option<f64> {
    nested(value, outer, inner).and_then(number)
}

pub fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

pub fn field_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| field(value, k).and_then(text))
}

pub fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|x| x != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" | "yes" | "y" => Some(true),
            "0" | "false" | "f" | "no" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn field_flag(value: &Value, key: &str) -> Option<bool> {
    field(value, key).and_then(flag)
}

/// Accepts `401520281`, `"401520281"` and the `"401520281.0"` form that
/// spreadsheet round-trips produce.
pub fn as_u64_any(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = number(value)?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for ch in key.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}
