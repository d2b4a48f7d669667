//! Directive compiler - single forward pass from source text to fragments
//!
//! Turns directive-annotated source text into compiled text: literal
//! passthrough interleaved with executable fragments delimited by `<%` and
//! `%>`. Expression text inside directives and echoes is relocated verbatim,
//! never parsed; the engine's evaluator gives it meaning at render time.
//!
//! ## Pipeline
//!
//! 1. store raw blocks (`@verbatim`, `@code`)
//! 2. strip comments (`{{-- --}}`)
//! 3. expand user-registered extension directives
//! 4. compile built-in statements (`@name`, `@name(args)`)
//! 5. compile echoes (`{!! !!}`, then `{{ }}`)
//! 6. restore raw blocks
//!
//! Compilation never fails: unregistered directives pass through untouched,
//! and malformed argument parentheses produce best-effort output rather than
//! an error. Structural balance of paired directives is not validated here;
//! an imbalance surfaces as a render-time error.

mod statements;

use std::sync::Arc;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

/// Compilation handler for a registered extension directive.
pub type DirectiveHandler = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Render-time predicate backing a conditional directive.
pub type ConditionFn = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;

/// Verbatim and raw-code spans pulled out before any other transform and
/// reinserted untouched at the end of the pipeline. One vault exists per
/// `compile` call, so blocks can never leak between unrelated inputs.
struct RawBlockVault {
    blocks: Vec<String>,
}

impl RawBlockVault {
    fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    fn store(&mut self, literal: String) -> String {
        self.blocks.push(literal);
        format!("@__raw_block_{}__@", self.blocks.len() - 1)
    }

    fn restore(&self, value: &str, placeholder_re: &Regex) -> String {
        placeholder_re
            .replace_all(value, |caps: &Captures| {
                let index: usize = caps[1].parse().unwrap_or(usize::MAX);
                self.blocks.get(index).cloned().unwrap_or_default()
            })
            .into_owned()
    }
}

/// The directive compiler.
///
/// Holds the pre-built scanning patterns, the open table of extension
/// directives, and registered condition predicates. Stateless across
/// `compile` calls apart from the table itself: the same input and the same
/// table state always produce the same output.
pub struct Compiler {
    verbatim_re: Regex,
    code_re: Regex,
    comment_re: Regex,
    statement_re: Regex,
    raw_echo_re: Regex,
    echo_re: Regex,
    placeholder_re: Regex,
    custom_directives: Vec<(String, DirectiveHandler)>,
    conditions: Vec<(String, ConditionFn)>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            verbatim_re: Regex::new(r"(?s)@verbatim(.*?)@endverbatim").unwrap(),
            code_re: Regex::new(r"(?s)@code(.*?)@endcode").unwrap(),
            comment_re: Regex::new(r"(?s)\{\{--(.*?)--\}\}").unwrap(),
            // Lazy argument match: the first `)` closes the argument list,
            // so deeply nested parentheses are not guaranteed to tokenize.
            statement_re: Regex::new(r"(?s)\B@(@?\w+(?:::\w+)?)([ \t]*)(\((.*?)\))?").unwrap(),
            raw_echo_re: Regex::new(r"\{!!\s*(.+?)\s*!!\}").unwrap(),
            echo_re: Regex::new(r"\{\{\s*(.+?)\s*\}\}").unwrap(),
            placeholder_re: Regex::new(r"@__raw_block_(\d+)__@").unwrap(),
            custom_directives: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Compile source text into fragment-delimited text.
    pub fn compile(&self, value: &str) -> String {
        let mut vault = RawBlockVault::new();

        let value = self.store_raw_blocks(value, &mut vault);
        let value = self.compile_comments(&value);
        let value = self.compile_extensions(&value);
        let value = self.compile_statements(&value);
        let value = self.compile_echos(&value);
        let value = vault.restore(&value, &self.placeholder_re);

        debug!(bytes = value.len(), "compiled template source");
        value
    }

    fn store_raw_blocks(&self, value: &str, vault: &mut RawBlockVault) -> String {
        // Verbatim spans are reinserted exactly as written.
        let value = self
            .verbatim_re
            .replace_all(value, |caps: &Captures| vault.store(caps[1].to_string()));

        // Raw-code spans come back wrapped as a fragment, so the engine
        // hands their content to the host evaluator.
        self.code_re
            .replace_all(&value, |caps: &Captures| {
                vault.store(format!("<%{}%>", &caps[1]))
            })
            .into_owned()
    }

    fn compile_comments(&self, value: &str) -> String {
        self.comment_re.replace_all(value, "").into_owned()
    }

    fn compile_extensions(&self, value: &str) -> String {
        let mut value = value.to_string();

        for (name, handler) in &self.custom_directives {
            // Built-ins always win on a name collision.
            if statements::is_builtin(name) {
                continue;
            }

            // Same boundary guards as the statement scanner: no match
            // inside an identifier, and no match on a longer token that
            // merely starts with this name.
            let pattern = format!(r"(?s)\B@{}\b(?:\s*\((.*?)\))?", regex::escape(name));
            let re = Regex::new(&pattern).unwrap();
            value = re
                .replace_all(&value, |caps: &Captures| {
                    handler(caps.get(1).map(|m| m.as_str()).unwrap_or(""))
                })
                .into_owned();
        }

        value
    }

    fn compile_statements(&self, value: &str) -> String {
        self.statement_re
            .replace_all(value, |caps: &Captures| self.compile_statement(caps))
            .into_owned()
    }

    fn compile_statement(&self, caps: &Captures) -> String {
        let full = &caps[0];
        let directive = &caps[1];

        // A doubled at-sign escapes the directive: emit the text with one
        // at-sign stripped and compile nothing.
        if directive.starts_with('@') {
            return full[1..].to_string();
        }

        let whitespace = &caps[2];
        let expression = caps.get(4).map(|m| m.as_str()).unwrap_or("");

        let compiled = statements::compile_builtin(directive, expression).or_else(|| {
            self.custom_directives
                .iter()
                .find(|(name, _)| name == directive)
                .map(|(_, handler)| handler(expression))
        });

        match compiled {
            // Whitespace between the name and following text is only part
            // of the match to allow `@name (args)`; give it back when no
            // argument list was present.
            Some(compiled) if caps.get(3).is_none() => format!("{compiled}{whitespace}"),
            Some(compiled) => compiled,
            // Unknown directives pass through untouched: they may be
            // literal at-sign text that happens to parse as a directive.
            None => full.to_string(),
        }
    }

    fn compile_echos(&self, value: &str) -> String {
        // Raw echoes compile first; the escaped-echo pattern could
        // otherwise misfire on brace sequences near a substituted raw echo.
        let value = self
            .raw_echo_re
            .replace_all(value, |caps: &Captures| format!("<% echo {} %>", &caps[1]));

        self.echo_re
            .replace_all(&value, |caps: &Captures| {
                format!("<% echo escape({}) %>", &caps[1])
            })
            .into_owned()
    }

    /// Register an extension directive.
    ///
    /// Later registration under the same name overwrites the earlier
    /// handler in place; directives are never removed. A name colliding
    /// with a built-in is shadowed by the built-in.
    pub fn directive(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(&str) -> String + Send + Sync + 'static,
    ) {
        let name = name.into();
        let handler: DirectiveHandler = Box::new(handler);

        match self.custom_directives.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = handler,
            None => self.custom_directives.push((name, handler)),
        }
    }

    /// Register a render-time condition predicate together with the three
    /// directives it drives: `@name`, `@elsename` and `@endname`.
    ///
    /// The predicate runs only at render time; compilation merely emits a
    /// call-through to the named predicate lookup.
    pub fn register_condition(
        &mut self,
        name: impl Into<String>,
        predicate: impl Fn(&[Value]) -> bool + Send + Sync + 'static,
    ) {
        let name = name.into();
        let predicate: ConditionFn = Arc::new(predicate);

        match self.conditions.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = predicate,
            None => self.conditions.push((name.clone(), predicate)),
        }

        let open = name.clone();
        self.directive(name.clone(), move |expression| {
            format!("<% if({}) %>", condition_call(&open, expression))
        });

        let chained = name.clone();
        self.directive(format!("else{name}"), move |expression| {
            format!("<% elseif({}) %>", condition_call(&chained, expression))
        });

        self.directive(format!("end{name}"), |_| "<% endif %>".to_string());
    }

    /// Look up a registered condition predicate by name.
    pub fn condition(&self, name: &str) -> Option<ConditionFn> {
        self.conditions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, predicate)| Arc::clone(predicate))
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

fn condition_call(name: &str, expression: &str) -> String {
    if expression.is_empty() {
        format!("condition('{name}')")
    } else {
        format!("condition('{name}', {expression})")
    }
}

#[cfg(test)]
mod tests;
