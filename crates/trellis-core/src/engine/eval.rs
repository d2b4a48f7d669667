//! Expression evaluation and host-capability seams
//!
//! The compiler relocates expression text without ever parsing it; at
//! render time every opaque expression is handed to an [`Evaluator`]. The
//! bundled [`BasicEvaluator`] understands literals and `$`-optional dotted
//! data paths only - it is a seam default for tests and simple hosts, not
//! an expression language. Hosts that need arithmetic, calls or stateful
//! code supply their own implementation.
//!
//! [`Host`] is the second seam: the named capabilities compiled fragments
//! refer to (`auth`, `csrf_token`, `env`, `production`, `vite`) resolve
//! through it.

use serde_json::{Map, Value};
use thiserror::Error;

use super::helpers::resolve_path;

/// Errors raised while evaluating embedded expression text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("UNDEFINED_VARIABLE: '{0}' is not present in the data context")]
    UndefinedVariable(String),

    #[error("UNSUPPORTED_EXPRESSION: the active evaluator cannot evaluate '{0}'")]
    UnsupportedExpression(String),

    #[error("UNSUPPORTED_CODE: the active evaluator cannot execute raw code blocks")]
    UnsupportedCode,

    #[error("NOT_A_LIST: '{0}' does not evaluate to a list")]
    NotAList(String),

    #[error("NOT_A_STRING: '{0}' does not evaluate to a string")]
    NotAString(String),

    #[error("UNPRINTABLE_VALUE: '{0}' evaluates to a structured value that cannot be echoed")]
    UnprintableValue(String),

    #[error("HALTED: rendering stopped by dd()")]
    Halted,
}

/// The host expression evaluator collaborating with the engine.
///
/// Expression text reaches this trait exactly as it appeared between the
/// delimiters in the source template, surrounding whitespace aside.
pub trait Evaluator: Send + Sync {
    /// Evaluate opaque expression text against the render data.
    fn eval(&self, expr: &str, data: &Map<String, Value>) -> Result<Value, EvalError>;

    /// Execute a raw code block for its side effects on the data context.
    fn exec(&self, code: &str, data: &mut Map<String, Value>) -> Result<(), EvalError> {
        let _ = (code, data);
        Err(EvalError::UnsupportedCode)
    }
}

/// Minimal evaluator covering literals and `$`-optional dotted paths.
///
/// Recognized forms: single- or double-quoted string literals, integer and
/// float literals, `true`/`false`/`null`, and data paths like `user.name`
/// or `$user.name` (array positions by numeric segment). Anything else is
/// an [`EvalError::UnsupportedExpression`], never a guess.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicEvaluator;

impl Evaluator for BasicEvaluator {
    fn eval(&self, expr: &str, data: &Map<String, Value>) -> Result<Value, EvalError> {
        let expr = expr.trim();

        if expr.is_empty() {
            return Err(EvalError::UnsupportedExpression(expr.to_string()));
        }

        if let Some(literal) = string_literal(expr) {
            return Ok(Value::String(literal));
        }

        match expr {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" => return Ok(Value::Null),
            _ => {}
        }

        if let Ok(int) = expr.parse::<i64>() {
            return Ok(Value::from(int));
        }
        if let Ok(float) = expr.parse::<f64>() {
            return Ok(Value::from(float));
        }

        let path = expr.strip_prefix('$').unwrap_or(expr);
        if is_path(path) {
            return resolve_path(data, path)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(path.to_string()));
        }

        Err(EvalError::UnsupportedExpression(expr.to_string()))
    }
}

/// Named host capabilities referenced from compiled fragments.
///
/// The compiler emits calls to these by fixed name only; the engine
/// resolves them here. Every default answers the capability's neutral
/// value, so an engine without a host behaves as logged-out, un-tokened
/// and non-production.
pub trait Host: Send + Sync {
    /// Authentication-state check behind `auth`/`guest` fragments.
    fn auth_check(&self, guard: Option<&str>) -> bool {
        let _ = guard;
        false
    }

    /// Token source behind the `csrf_token` fragment.
    fn csrf_token(&self) -> String {
        String::new()
    }

    /// Environment-name check behind the `env` fragment.
    fn environment(&self, names: &[String]) -> bool {
        let _ = names;
        false
    }

    /// Production check behind the `production` fragment.
    fn is_production(&self) -> bool {
        false
    }

    /// Asset-reference resolver behind the `vite` fragment.
    fn asset_tags(&self, entries: &[String]) -> String {
        let _ = entries;
        String::new()
    }
}

/// Host answering every capability with its neutral default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHost;

impl Host for DefaultHost {}

fn string_literal(expr: &str) -> Option<String> {
    let bytes = expr.as_bytes();
    if expr.len() < 2 {
        return None;
    }
    let quote = match bytes[0] {
        b'\'' => '\'',
        b'"' => '"',
        _ => return None,
    };
    if !expr.ends_with(quote) {
        return None;
    }

    let inner = &expr[1..expr.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(escaped) if escaped == quote || escaped == '\\' => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else if ch == quote {
            // A bare closing quote in the middle means this is not a
            // single literal after all.
            return None;
        } else {
            out.push(ch);
        }
    }
    Some(out)
}

fn is_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
