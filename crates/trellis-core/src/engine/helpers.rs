//! Helper functions for fragment execution

use serde_json::{Map, Value};

use super::eval::EvalError;

/// Resolve a dotted path against the data context. Numeric segments index
/// into arrays.
pub(crate) fn resolve_path<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = data.get(parts.next()?)?;

    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Stringify a value for echo output. Structured values cannot be echoed;
/// they belong in loops or the `json` fragment.
pub(crate) fn stringify_value(value: &Value, expr: &str) -> Result<String, EvalError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(_) | Value::Object(_) => Err(EvalError::UnprintableValue(expr.to_string())),
    }
}

/// Loose truthiness for condition fragments: null, false, zero, the empty
/// string, `"0"` and empty collections are false.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Split argument text on top-level commas, respecting quotes and
/// brackets. The pieces are still opaque expression text.
pub(crate) fn split_args(args: &str) -> Vec<&str> {
    if args.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0usize;

    for (i, ch) in args.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    parts.push(args[start..].trim());
    parts
}

/// Match `text` against the call shape `name(args)`, returning the raw
/// argument text. The whole of `text` must be the call.
pub(crate) fn call_shape<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(name)?.trim_start();
    rest.strip_prefix('(')?.strip_suffix(')').map(str::trim)
}

/// Strip one pair of outer parentheses when they wrap the whole
/// expression.
pub(crate) fn strip_outer_parens(expr: &str) -> &str {
    let trimmed = expr.trim();
    if !trimmed.starts_with('(') || !trimmed.ends_with(')') {
        return trimmed;
    }

    let mut depth = 0usize;
    for (i, ch) in trimmed.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return if i == trimmed.len() - 1 {
                        trimmed[1..i].trim()
                    } else {
                        trimmed
                    };
                }
            }
            _ => {}
        }
    }

    trimmed
}

/// Format the `class` attribute helper: list entries pass through,
/// string-keyed entries are included when their value is truthy. An empty
/// result emits no attribute at all.
pub(crate) fn class_attribute(value: &Value) -> String {
    let mut classes: Vec<String> = Vec::new();
    collect_classes(value, &mut classes);

    let joined = classes.join(" ");
    if joined.is_empty() {
        String::new()
    } else {
        format!("class=\"{joined}\"")
    }
}

fn collect_classes(value: &Value, classes: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() => classes.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                collect_classes(item, classes);
            }
        }
        Value::Object(map) => {
            for (key, flag) in map {
                if is_truthy(flag) {
                    classes.push(key.clone());
                }
            }
        }
        _ => {}
    }
}

/// Format the `style` attribute helper: list entries pass through,
/// string-keyed entries become `key: value` pairs unless the value is
/// false or null. Pairs join with `; `.
pub(crate) fn style_attribute(value: &Value) -> String {
    let mut styles: Vec<String> = Vec::new();
    collect_styles(value, &mut styles);

    let joined = styles.join("; ");
    if joined.is_empty() {
        String::new()
    } else {
        format!("style=\"{joined}\"")
    }
}

fn collect_styles(value: &Value, styles: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() => styles.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                collect_styles(item, styles);
            }
        }
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::Bool(false) | Value::Null => {}
                    Value::String(s) => styles.push(format!("{key}: {s}")),
                    Value::Number(n) => styles.push(format!("{key}: {n}")),
                    _ => {}
                }
            }
        }
        _ => {}
    }
}
