//! Fragment execution
//!
//! Compiled text is literal output interleaved with `<% ... %>` ops. The
//! executor scans forward, writes literal segments through the session (so
//! open section or push captures receive them), runs composition and
//! control-flow ops itself, and hands every opaque expression to the
//! engine's evaluator. It never parses expression text.

use serde_json::{Map, Value};
use tracing::warn;

use super::blocks::{find_block_end, find_dividers};
use super::eval::EvalError;
use super::helpers::{
    call_shape, class_attribute, is_truthy, split_args, stringify_value, strip_outer_parens,
    style_attribute,
};
use super::{Engine, RenderSession};
use crate::error::{Result, TrellisError};

/// Iteration guard for `while`/`for` blocks (malformed input protection).
const MAX_LOOP_ITERATIONS: usize = 100_000;

/// One piece of compiled text: literal output or a fragment op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Literal(&'a str),
    Op(&'a str),
}

/// Control-flow signal propagated out of a block body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// The leading op keyword (`if`, `echo`, `section`, ...).
pub(crate) fn op_name(op: &str) -> &str {
    let end = op
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(op.len());
    &op[..end]
}

/// The raw argument text of a call-shaped op, empty when absent.
fn op_args(op: &str) -> &str {
    let rest = op[op_name(op).len()..].trim();
    rest.strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .map(str::trim)
        .unwrap_or("")
}

/// Split compiled text into literal and op segments.
fn tokenize(compiled: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while pos < compiled.len() {
        let remaining = &compiled[pos..];
        match remaining.find("<%") {
            None => {
                segments.push(Segment::Literal(remaining));
                break;
            }
            Some(start) => {
                if start > 0 {
                    segments.push(Segment::Literal(&remaining[..start]));
                }
                let body = &remaining[start + 2..];
                let close = body
                    .find("%>")
                    .ok_or(TrellisError::UnclosedFragment { offset: pos + start })?;
                segments.push(Segment::Op(body[..close].trim()));
                pos += start + 2 + close + 2;
            }
        }
    }

    Ok(segments)
}

/// Pair each item of an iterable value with its key (index or field name).
pub(crate) fn iterable_entries(value: Value) -> Option<Vec<(Value, Value)>> {
    match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v))
                .collect(),
        ),
        Value::Object(map) => Some(
            map.into_iter()
                .map(|(k, v)| (Value::String(k), v))
                .collect(),
        ),
        _ => None,
    }
}

/// Variable binding of a `foreach`/`forelse` head (`list as $v`, or
/// `list as $k => $v`).
struct LoopBinding {
    key_var: Option<String>,
    value_var: String,
}

impl LoopBinding {
    fn apply(&self, scope: &mut Map<String, Value>, key: Value, value: Value) {
        if let Some(key_var) = &self.key_var {
            scope.insert(key_var.clone(), key);
        }
        scope.insert(self.value_var.clone(), value);
    }
}

fn loop_parts<'a>(args: &'a str, op: &str) -> Result<(&'a str, LoopBinding)> {
    let (expr, binding) = args
        .rsplit_once(" as ")
        .ok_or_else(|| TrellisError::BadFragmentArgs {
            op: op.to_string(),
            reason: "expected '<list> as <var>'".to_string(),
        })?;

    let binding = binding.trim();
    let (key_var, value_var) = match binding.split_once("=>") {
        Some((key, value)) => (Some(clean_var(key)), clean_var(value)),
        None => (None, clean_var(binding)),
    };

    Ok((expr.trim(), LoopBinding { key_var, value_var }))
}

fn clean_var(text: &str) -> String {
    text.trim().trim_start_matches('$').to_string()
}

fn unclosed(open: &str, close: &str) -> TrellisError {
    TrellisError::UnclosedBlock {
        open: open.to_string(),
        close: close.to_string(),
    }
}

fn bad_args(op: &str, reason: &str) -> TrellisError {
    TrellisError::BadFragmentArgs {
        op: op.to_string(),
        reason: reason.to_string(),
    }
}

impl Engine {
    /// Evaluate compiled text into an output string.
    ///
    /// Each evaluation gets its own variable scope (a copy of the caller's
    /// data), so mutations from raw-code blocks stay local to the template
    /// being evaluated. On error the partially built output is dropped;
    /// session state mutated so far is left as-is for inspection.
    pub(crate) fn evaluate_compiled(
        &self,
        compiled: &str,
        data: &Map<String, Value>,
        session: &mut RenderSession,
    ) -> Result<String> {
        let segments = tokenize(compiled)?;
        let mut scope = data.clone();
        let mut out = String::new();
        self.exec_range(
            &segments,
            0,
            segments.len(),
            &mut scope,
            session,
            &mut out,
        )?;
        Ok(out)
    }

    fn exec_range(
        &self,
        segments: &[Segment<'_>],
        start: usize,
        end: usize,
        scope: &mut Map<String, Value>,
        session: &mut RenderSession,
        out: &mut String,
    ) -> Result<Flow> {
        let mut i = start;
        while i < end {
            match segments[i] {
                Segment::Literal(text) => {
                    session.write(out, text);
                    i += 1;
                }
                Segment::Op(op) => {
                    let (next, flow) = self.exec_op(segments, i, op, scope, session, out)?;
                    if flow != Flow::Normal {
                        return Ok(flow);
                    }
                    i = next;
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_op(
        &self,
        segments: &[Segment<'_>],
        i: usize,
        op: &str,
        scope: &mut Map<String, Value>,
        session: &mut RenderSession,
        out: &mut String,
    ) -> Result<(usize, Flow)> {
        match op_name(op) {
            "if" => self.exec_if(segments, i, op, scope, session, out),
            "foreach" => self.exec_foreach(segments, i, op, scope, session, out),
            "forelse" => self.exec_forelse(segments, i, op, scope, session, out),
            "while" => self.exec_conditional_loop(segments, i, op, "while", "endwhile", scope, session, out),
            "for" => self.exec_conditional_loop(segments, i, op, "for", "endfor", scope, session, out),
            "switch" => self.exec_switch(segments, i, op, scope, session, out),

            "break" | "continue" => {
                let args = op_args(op);
                let fires = args.is_empty() || self.eval_condition(args, scope)?;
                if !fires {
                    return Ok((i + 1, Flow::Normal));
                }
                let flow = if op_name(op) == "break" {
                    Flow::Break
                } else {
                    Flow::Continue
                };
                Ok((i + 1, flow))
            }

            "echo" => {
                let text = self.eval_echo(op["echo".len()..].trim(), scope, session)?;
                session.write(out, &text);
                Ok((i + 1, Flow::Normal))
            }

            "extends" => {
                let parts = split_args(op_args(op));
                let name = parts
                    .first()
                    .ok_or_else(|| bad_args("extends", "expected a template identifier"))?;
                session.parent = Some(self.eval_string(name, scope)?);
                Ok((i + 1, Flow::Normal))
            }

            "section" => {
                let parts = split_args(op_args(op));
                match parts.as_slice() {
                    [name] => {
                        let name = self.eval_string(name, scope)?;
                        session.start_section(name);
                    }
                    [name, content] => {
                        let name = self.eval_string(name, scope)?;
                        let value = self.eval_value(content, scope)?;
                        let content = stringify_value(&value, content)?;
                        session.inline_section(name, content);
                    }
                    _ => return Err(bad_args("section", "expected a name and optional inline content")),
                }
                Ok((i + 1, Flow::Normal))
            }

            "endsection" => {
                session.end_section()?;
                Ok((i + 1, Flow::Normal))
            }

            "push" => {
                let parts = split_args(op_args(op));
                let name = parts
                    .first()
                    .ok_or_else(|| bad_args("push", "expected a stack name"))?;
                let name = self.eval_string(name, scope)?;
                session.start_push(name);
                Ok((i + 1, Flow::Normal))
            }

            "endpush" => {
                session.end_push()?;
                Ok((i + 1, Flow::Normal))
            }

            "include" => {
                let parts = split_args(op_args(op));
                let (view, extra) = match parts.as_slice() {
                    [view] => (view, None),
                    [view, data] => (view, Some(*data)),
                    _ => return Err(bad_args("include", "expected a template identifier and optional data")),
                };
                let view = self.eval_string(view, scope)?;
                let data = self.include_scope(scope, extra)?;
                let rendered = self.render_in_session(&view, data, session)?;
                session.write(out, &rendered);
                Ok((i + 1, Flow::Normal))
            }

            "include_if" => {
                let parts = split_args(op_args(op));
                let (view, extra) = match parts.as_slice() {
                    [view] => (view, None),
                    [view, data] => (view, Some(*data)),
                    _ => return Err(bad_args("include_if", "expected a template identifier and optional data")),
                };
                let view = self.eval_string(view, scope)?;
                if self.exists(&view) {
                    let data = self.include_scope(scope, extra)?;
                    let rendered = self.render_in_session(&view, data, session)?;
                    session.write(out, &rendered);
                } else {
                    warn!(view = %view, "include_if target not found, skipping");
                }
                Ok((i + 1, Flow::Normal))
            }

            "include_when" => {
                let parts = split_args(op_args(op));
                let (condition, view, extra) = match parts.as_slice() {
                    [condition, view] => (condition, view, None),
                    [condition, view, data] => (condition, view, Some(*data)),
                    _ => return Err(bad_args("include_when", "expected a condition and a template identifier")),
                };
                if self.eval_condition(condition, scope)? {
                    let view = self.eval_string(view, scope)?;
                    let data = self.include_scope(scope, extra)?;
                    let rendered = self.render_in_session(&view, data, session)?;
                    session.write(out, &rendered);
                }
                Ok((i + 1, Flow::Normal))
            }

            "each" => {
                let parts = split_args(op_args(op));
                if parts.len() < 3 {
                    return Err(bad_args("each", "expected a template, a list and an iterator name"));
                }
                let view = self.eval_string(parts[0], scope)?;
                let items = self.eval_value(parts[1], scope)?;
                let iterator = self.eval_string(parts[2], scope)?;
                let empty = match parts.get(3) {
                    Some(expr) => Some(self.eval_string(expr, scope)?),
                    None => None,
                };
                let rendered =
                    self.render_each_in_session(&view, items, &iterator, empty.as_deref(), session)?;
                session.write(out, &rendered);
                Ok((i + 1, Flow::Normal))
            }

            "dump" => {
                let value = self.eval_value(op_args(op), scope)?;
                session.write(out, &serde_json::to_string_pretty(&value)?);
                Ok((i + 1, Flow::Normal))
            }

            "dd" => {
                let value = self.eval_value(op_args(op), scope)?;
                session.write(out, &serde_json::to_string_pretty(&value)?);
                Err(EvalError::Halted.into())
            }

            // Stray closers and dividers: an imbalance the compiler
            // deliberately does not validate surfaces here.
            "endif" | "endforeach" | "endforelse" | "endfor" | "endwhile" | "endswitch"
            | "elseif" | "else" | "case" | "default" | "forelseempty" => {
                Err(TrellisError::UnmatchedBlockOp(op_name(op).to_string()))
            }

            // Anything else is raw host code (a protected `@code` block);
            // the evaluator is responsible for giving it meaning.
            _ => {
                self.evaluator.exec(op, scope)?;
                Ok((i + 1, Flow::Normal))
            }
        }
    }

    fn exec_if(
        &self,
        segments: &[Segment<'_>],
        i: usize,
        op: &str,
        scope: &mut Map<String, Value>,
        session: &mut RenderSession,
        out: &mut String,
    ) -> Result<(usize, Flow)> {
        let close =
            find_block_end(segments, i + 1, "if", "endif").ok_or_else(|| unclosed("if", "endif"))?;
        let dividers = find_dividers(segments, i + 1, close, "if", "endif", &["elseif", "else"]);

        let mut arms: Vec<(Option<&str>, usize, usize)> = Vec::new();
        let mut condition = Some(op_args(op));
        let mut arm_start = i + 1;
        for &divider in &dividers {
            arms.push((condition, arm_start, divider));
            let Segment::Op(divider_op) = segments[divider] else {
                continue;
            };
            condition = match op_name(divider_op) {
                "elseif" => Some(op_args(divider_op)),
                _ => None,
            };
            arm_start = divider + 1;
        }
        arms.push((condition, arm_start, close));

        for (condition, start, end) in arms {
            let take = match condition {
                Some(condition) => self.eval_condition(condition, scope)?,
                None => true,
            };
            if take {
                let flow = self.exec_range(segments, start, end, scope, session, out)?;
                return Ok((close + 1, flow));
            }
        }

        Ok((close + 1, Flow::Normal))
    }

    fn exec_foreach(
        &self,
        segments: &[Segment<'_>],
        i: usize,
        op: &str,
        scope: &mut Map<String, Value>,
        session: &mut RenderSession,
        out: &mut String,
    ) -> Result<(usize, Flow)> {
        let close = find_block_end(segments, i + 1, "foreach", "endforeach")
            .ok_or_else(|| unclosed("foreach", "endforeach"))?;
        let (expr, binding) = loop_parts(op_args(op), "foreach")?;
        let entries = self.loop_entries(expr, scope)?;

        for (key, value) in entries {
            let mut iteration = scope.clone();
            binding.apply(&mut iteration, key, value);
            match self.exec_range(segments, i + 1, close, &mut iteration, session, out)? {
                Flow::Break => break,
                Flow::Continue | Flow::Normal => {}
            }
        }

        Ok((close + 1, Flow::Normal))
    }

    fn exec_forelse(
        &self,
        segments: &[Segment<'_>],
        i: usize,
        op: &str,
        scope: &mut Map<String, Value>,
        session: &mut RenderSession,
        out: &mut String,
    ) -> Result<(usize, Flow)> {
        let close = find_block_end(segments, i + 1, "forelse", "endforelse")
            .ok_or_else(|| unclosed("forelse", "endforelse"))?;
        let dividers = find_dividers(segments, i + 1, close, "forelse", "endforelse", &["forelseempty"]);
        let body_end = dividers.first().copied().unwrap_or(close);

        let (expr, binding) = loop_parts(op_args(op), "forelse")?;
        let entries = self.loop_entries(expr, scope)?;

        if entries.is_empty() {
            if let Some(&divider) = dividers.first() {
                let flow = self.exec_range(segments, divider + 1, close, scope, session, out)?;
                return Ok((close + 1, flow));
            }
            return Ok((close + 1, Flow::Normal));
        }

        for (key, value) in entries {
            let mut iteration = scope.clone();
            binding.apply(&mut iteration, key, value);
            match self.exec_range(segments, i + 1, body_end, &mut iteration, session, out)? {
                Flow::Break => break,
                Flow::Continue | Flow::Normal => {}
            }
        }

        Ok((close + 1, Flow::Normal))
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_conditional_loop(
        &self,
        segments: &[Segment<'_>],
        i: usize,
        op: &str,
        open: &str,
        close_name: &str,
        scope: &mut Map<String, Value>,
        session: &mut RenderSession,
        out: &mut String,
    ) -> Result<(usize, Flow)> {
        let close = find_block_end(segments, i + 1, open, close_name)
            .ok_or_else(|| unclosed(open, close_name))?;
        let condition = op_args(op);

        let mut iterations = 0usize;
        while self.eval_condition(condition, scope)? {
            iterations += 1;
            if iterations > MAX_LOOP_ITERATIONS {
                return Err(TrellisError::LoopLimitExceeded {
                    limit: MAX_LOOP_ITERATIONS,
                });
            }
            match self.exec_range(segments, i + 1, close, scope, session, out)? {
                Flow::Break => break,
                Flow::Continue | Flow::Normal => {}
            }
        }

        Ok((close + 1, Flow::Normal))
    }

    fn exec_switch(
        &self,
        segments: &[Segment<'_>],
        i: usize,
        op: &str,
        scope: &mut Map<String, Value>,
        session: &mut RenderSession,
        out: &mut String,
    ) -> Result<(usize, Flow)> {
        let close = find_block_end(segments, i + 1, "switch", "endswitch")
            .ok_or_else(|| unclosed("switch", "endswitch"))?;
        let arms = find_dividers(segments, i + 1, close, "switch", "endswitch", &["case", "default"]);
        let subject = self.eval_value(op_args(op), scope)?;

        let mut matched = None;
        for (k, &arm) in arms.iter().enumerate() {
            let Segment::Op(arm_op) = segments[arm] else {
                continue;
            };
            if op_name(arm_op) == "case" && self.eval_value(op_args(arm_op), scope)? == subject {
                matched = Some(k);
                break;
            }
        }
        if matched.is_none() {
            matched = arms.iter().position(|&arm| {
                matches!(segments[arm], Segment::Op(arm_op) if op_name(arm_op) == "default")
            });
        }

        if let Some(first) = matched {
            // Arms fall through until a break, like the host's switch.
            for k in first..arms.len() {
                let body_start = arms[k] + 1;
                let body_end = arms.get(k + 1).copied().unwrap_or(close);
                match self.exec_range(segments, body_start, body_end, scope, session, out)? {
                    Flow::Break => break,
                    Flow::Continue => return Ok((close + 1, Flow::Continue)),
                    Flow::Normal => {}
                }
            }
        }

        Ok((close + 1, Flow::Normal))
    }

    fn eval_echo(
        &self,
        rest: &str,
        scope: &Map<String, Value>,
        session: &mut RenderSession,
    ) -> Result<String> {
        if let Some(args) = call_shape(rest, "escape") {
            let value = self.eval_value(args, scope)?;
            let text = stringify_value(&value, args)?;
            return Ok(html_escape::encode_quoted_attribute(&text).into_owned());
        }

        if let Some(args) = call_shape(rest, "yield") {
            let parts = split_args(args);
            let name = parts
                .first()
                .ok_or_else(|| bad_args("yield", "expected a section name"))?;
            let name = self.eval_string(name, scope)?;
            let default = match parts.get(1) {
                Some(expr) => {
                    let value = self.eval_value(expr, scope)?;
                    stringify_value(&value, expr)?
                }
                None => String::new(),
            };
            return Ok(session.yield_content(&name, &default));
        }

        if call_shape(rest, "show").is_some() {
            let name = session.end_section()?;
            return Ok(session.yield_content(&name, ""));
        }

        if call_shape(rest, "parent").is_some() {
            return Ok(session.parent_content());
        }

        if let Some(args) = call_shape(rest, "stack") {
            let parts = split_args(args);
            let name = parts
                .first()
                .ok_or_else(|| bad_args("stack", "expected a stack name"))?;
            let name = self.eval_string(name, scope)?;
            let default = match parts.get(1) {
                Some(expr) => {
                    let value = self.eval_value(expr, scope)?;
                    stringify_value(&value, expr)?
                }
                None => String::new(),
            };
            return Ok(session.yield_push_content(&name, &default));
        }

        if call_shape(rest, "csrf_token").is_some() {
            return Ok(self.host.csrf_token());
        }

        if let Some(args) = call_shape(rest, "vite") {
            let entries = self.eval_string_list(args, scope)?;
            return Ok(self.host.asset_tags(&entries));
        }

        if let Some(args) = call_shape(rest, "json") {
            let parts = split_args(args);
            let subject = parts
                .first()
                .ok_or_else(|| bad_args("json", "expected a value"))?;
            let value = self.eval_value(subject, scope)?;
            return Ok(serde_json::to_string(&value)?);
        }

        if let Some(args) = call_shape(rest, "class_attr") {
            let value = self.eval_value(args, scope)?;
            return Ok(class_attribute(&value));
        }

        if let Some(args) = call_shape(rest, "style_attr") {
            let value = self.eval_value(args, scope)?;
            return Ok(style_attribute(&value));
        }

        // Raw output: the expression result is emitted without escaping.
        let value = self.eval_value(rest, scope)?;
        Ok(stringify_value(&value, rest)?)
    }

    /// Evaluate a condition fragment, resolving the capability call shapes
    /// the compiler emits before falling back to evaluator truthiness.
    fn eval_condition(&self, condition: &str, scope: &Map<String, Value>) -> Result<bool> {
        let condition = condition.trim();

        if let Some(rest) = condition.strip_prefix('!') {
            return Ok(!self.eval_condition(strip_outer_parens(rest), scope)?);
        }

        if let Some(args) = call_shape(condition, "isset") {
            return Ok(matches!(self.evaluator.eval(args, scope), Ok(value) if !value.is_null()));
        }

        if let Some(args) = call_shape(condition, "empty") {
            return Ok(match self.evaluator.eval(args, scope) {
                Ok(value) => !is_truthy(&value),
                Err(_) => true,
            });
        }

        if let Some(args) = call_shape(condition, "auth") {
            let guard = self.eval_optional_string(args, scope)?;
            return Ok(self.host.auth_check(guard.as_deref()));
        }

        if let Some(args) = call_shape(condition, "guest") {
            let guard = self.eval_optional_string(args, scope)?;
            return Ok(!self.host.auth_check(guard.as_deref()));
        }

        if let Some(args) = call_shape(condition, "env") {
            let names = self.eval_string_list(args, scope)?;
            return Ok(self.host.environment(&names));
        }

        if call_shape(condition, "production").is_some() {
            return Ok(self.host.is_production());
        }

        if let Some(args) = call_shape(condition, "condition") {
            let parts = split_args(args);
            let name = parts
                .first()
                .ok_or_else(|| bad_args("condition", "expected a condition name"))?;
            let name = self.eval_string(name, scope)?;
            let predicate = self
                .compiler
                .condition(&name)
                .ok_or_else(|| TrellisError::UnknownCondition(name.clone()))?;
            let mut values = Vec::new();
            for part in &parts[1..] {
                values.push(self.eval_value(part, scope)?);
            }
            return Ok(predicate(&values));
        }

        Ok(is_truthy(&self.eval_value(condition, scope)?))
    }

    fn loop_entries(
        &self,
        expr: &str,
        scope: &Map<String, Value>,
    ) -> Result<Vec<(Value, Value)>> {
        let value = self.eval_value(expr, scope)?;
        iterable_entries(value).ok_or_else(|| EvalError::NotAList(expr.to_string()).into())
    }

    fn include_scope(
        &self,
        scope: &Map<String, Value>,
        extra: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let mut data = scope.clone();
        if let Some(expr) = extra {
            match self.eval_value(expr, scope)? {
                Value::Object(map) => data.extend(map),
                _ => return Err(bad_args("include", "data argument must evaluate to an object")),
            }
        }
        Ok(data)
    }

    pub(crate) fn eval_value(&self, expr: &str, scope: &Map<String, Value>) -> Result<Value> {
        Ok(self.evaluator.eval(expr, scope)?)
    }

    fn eval_string(&self, expr: &str, scope: &Map<String, Value>) -> Result<String> {
        match self.eval_value(expr, scope)? {
            Value::String(s) => Ok(s),
            _ => Err(EvalError::NotAString(expr.to_string()).into()),
        }
    }

    fn eval_optional_string(
        &self,
        args: &str,
        scope: &Map<String, Value>,
    ) -> Result<Option<String>> {
        let parts = split_args(args);
        match parts.first() {
            Some(expr) => Ok(Some(self.eval_string(expr, scope)?)),
            None => Ok(None),
        }
    }

    fn eval_string_list(&self, args: &str, scope: &Map<String, Value>) -> Result<Vec<String>> {
        let mut entries = Vec::new();
        for part in split_args(args) {
            let value = self.eval_value(part, scope)?;
            entries.push(stringify_value(&value, part)?);
        }
        Ok(entries)
    }
}
