//! Composition runtime
//!
//! The engine pairs the directive compiler with the render-time state
//! machine that resolves `extends`/`section`/`yield`/`push`/`stack`
//! relationships across template evaluations into one final output string.
//!
//! Long-lived state (locator, cache, compiler, shared data, the evaluator
//! and host seams) lives on [`Engine`]. Everything scoped to one top-level
//! render (sections, stacks, the pending parent link, capture buffers)
//! lives on [`RenderSession`], created fresh per render call and threaded
//! explicitly through every nested evaluation - includes and the
//! extends-triggered parent pass alike.
//!
//! One engine instance must not serve concurrent renders; give each worker
//! its own instance. Shared data is the one cross-render exception: it is
//! registered up front through [`Engine::share`], outside the render path,
//! and only read afterwards.

mod blocks;
pub mod eval;
mod exec;
mod helpers;
pub mod loader;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::compiler::Compiler;
use crate::error::{Result, TrellisError};
use crate::view::View;
use eval::{BasicEvaluator, DefaultHost, Evaluator, Host};
use exec::iterable_entries;
use loader::{CompiledCache, TemplateLocator};

/// Nesting guard for include and extends chains (cycle protection).
const MAX_RENDER_DEPTH: usize = 64;

/// Per-render composition state: completed sections, the section and push
/// stacks, accumulated stack contents, capture buffers and the pending
/// parent link.
///
/// A session covers one top-level render and every template it recursively
/// evaluates; sections persist across the whole extends chain. Create a
/// fresh session per independent render - the engine's own entry points do.
#[derive(Debug, Default)]
pub struct RenderSession {
    sections: HashMap<String, String>,
    section_stack: Vec<String>,
    pushes: HashMap<String, Vec<String>>,
    push_stack: Vec<String>,
    parent: Option<String>,
    captures: Vec<String>,
    depth: usize,
}

impl RenderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route output through the innermost open capture, if any.
    fn write(&mut self, out: &mut String, text: &str) {
        match self.captures.last_mut() {
            Some(capture) => capture.push_str(text),
            None => out.push_str(text),
        }
    }

    fn start_section(&mut self, name: String) {
        self.section_stack.push(name);
        self.captures.push(String::new());
    }

    /// Store a single-expression section directly, no stack interaction.
    fn inline_section(&mut self, name: String, content: String) {
        self.sections.insert(name, content);
    }

    /// Close the innermost open section, capturing everything emitted
    /// since the open. Overwrites any earlier content under the name.
    fn end_section(&mut self) -> Result<String> {
        let name = self
            .section_stack
            .pop()
            .ok_or_else(|| TrellisError::UnbalancedSection("endsection".to_string()))?;
        let content = self.captures.pop().unwrap_or_default();
        self.sections.insert(name.clone(), content);
        Ok(name)
    }

    /// Stored section content, or the default. Reading never consumes.
    pub fn yield_content(&self, name: &str, default: &str) -> String {
        self.sections
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Content already stored under the still-open enclosing section,
    /// read from the stack top without popping.
    fn parent_content(&self) -> String {
        self.section_stack
            .last()
            .and_then(|name| self.sections.get(name))
            .cloned()
            .unwrap_or_default()
    }

    fn start_push(&mut self, name: String) {
        self.push_stack.push(name);
        self.captures.push(String::new());
    }

    fn end_push(&mut self) -> Result<()> {
        let name = self
            .push_stack
            .pop()
            .ok_or_else(|| TrellisError::UnbalancedSection("endpush".to_string()))?;
        let content = self.captures.pop().unwrap_or_default();
        self.pushes.entry(name).or_default().push(content);
        Ok(())
    }

    /// Joined push fragments in registration order. The default applies
    /// only when the name was never pushed to; fragments that join to the
    /// empty string still win over the default.
    pub fn yield_push_content(&self, name: &str, default: &str) -> String {
        match self.pushes.get(name) {
            Some(fragments) => fragments.concat(),
            None => default.to_string(),
        }
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn section_missing(&self, name: &str) -> bool {
        !self.has_section(name)
    }
}

/// The composition runtime.
pub struct Engine {
    locator: TemplateLocator,
    cache: Option<CompiledCache>,
    compiler: Compiler,
    shared: Map<String, Value>,
    evaluator: Arc<dyn Evaluator>,
    host: Arc<dyn Host>,
}

impl Engine {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            locator: TemplateLocator::new(paths),
            cache: None,
            compiler: Compiler::new(),
            shared: Map::new(),
            evaluator: Arc::new(BasicEvaluator),
            host: Arc::new(DefaultHost),
        }
    }

    /// Cache compiled artifacts under `dir` instead of recompiling on
    /// every render.
    pub fn with_cache_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache = Some(CompiledCache::new(dir));
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn with_host(mut self, host: impl Host + 'static) -> Self {
        self.host = Arc::new(host);
        self
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>) {
        self.locator.add_path(path);
    }

    pub fn prepend_path(&mut self, path: impl Into<PathBuf>) {
        self.locator.prepend_path(path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        self.locator.paths()
    }

    /// Whether the locator can resolve a template identifier.
    pub fn exists(&self, view: &str) -> bool {
        self.locator.find(view).is_some()
    }

    /// Register cross-render shared data, merged under every render's own
    /// data context. Call outside the render path.
    pub fn share(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        self.shared.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn shared(&self) -> &Map<String, Value> {
        &self.shared
    }

    /// Register an extension directive (see [`Compiler::directive`]).
    pub fn directive(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(&str) -> String + Send + Sync + 'static,
    ) {
        self.compiler.directive(name, handler);
    }

    /// Register a conditional directive trio
    /// (see [`Compiler::register_condition`]).
    pub fn register_condition(
        &mut self,
        name: impl Into<String>,
        predicate: impl Fn(&[Value]) -> bool + Send + Sync + 'static,
    ) {
        self.compiler.register_condition(name, predicate);
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Compile source text without touching the filesystem.
    pub fn compile_string(&self, source: &str) -> String {
        self.compiler.compile(source)
    }

    /// Build a template handle for fluent data augmentation.
    pub fn make(&self, view: impl Into<String>, data: Map<String, Value>) -> View<'_> {
        View::new(self, view, data)
    }

    /// Render a template against a data context.
    pub fn render(&self, view: &str, data: Map<String, Value>) -> Result<String> {
        let mut session = RenderSession::new();
        self.render_in_session(view, data, &mut session)
    }

    /// Render a template when the condition holds, else the empty string.
    pub fn render_when(
        &self,
        condition: bool,
        view: &str,
        data: Map<String, Value>,
    ) -> Result<String> {
        if condition {
            self.render(view, data)
        } else {
            Ok(String::new())
        }
    }

    pub fn render_unless(
        &self,
        condition: bool,
        view: &str,
        data: Map<String, Value>,
    ) -> Result<String> {
        self.render_when(!condition, view, data)
    }

    /// Render a template once per item, binding `key` and the iterator
    /// name. With no items, `empty` is either a `raw|`-prefixed literal or
    /// the identifier of a fallback template; an empty `empty` renders
    /// nothing.
    pub fn render_each(
        &self,
        view: &str,
        items: &Value,
        iterator: &str,
        empty: &str,
    ) -> Result<String> {
        let mut session = RenderSession::new();
        let empty = (!empty.is_empty()).then_some(empty);
        self.render_each_in_session(view, items.clone(), iterator, empty, &mut session)
    }

    /// Render inside an existing session, sharing its sections, stacks and
    /// pending parent link. The engine's own entry points create a fresh
    /// session; use this directly to inspect composition state afterwards.
    pub fn render_in_session(
        &self,
        view: &str,
        data: Map<String, Value>,
        session: &mut RenderSession,
    ) -> Result<String> {
        if session.depth >= MAX_RENDER_DEPTH {
            return Err(TrellisError::RenderDepthExceeded {
                limit: MAX_RENDER_DEPTH,
            });
        }
        session.depth += 1;

        // The pending-parent link belongs to the evaluation that records
        // it; stash any outer link so a nested render cannot consume it.
        let stashed = session.parent.take();
        let result = self.render_template(view, data, session);
        session.parent = stashed;
        session.depth -= 1;

        result
    }

    pub(crate) fn render_each_in_session(
        &self,
        view: &str,
        items: Value,
        iterator: &str,
        empty: Option<&str>,
        session: &mut RenderSession,
    ) -> Result<String> {
        let entries = iterable_entries(items).ok_or_else(|| TrellisError::BadFragmentArgs {
            op: "each".to_string(),
            reason: "items must be a list or an object".to_string(),
        })?;

        let mut result = String::new();
        if !entries.is_empty() {
            for (key, value) in entries {
                let mut data = Map::new();
                data.insert("key".to_string(), key);
                data.insert(iterator.to_string(), value);
                result.push_str(&self.render_in_session(view, data, session)?);
            }
        } else if let Some(empty) = empty {
            match empty.strip_prefix("raw|") {
                Some(raw) => result.push_str(raw),
                None => result.push_str(&self.render_in_session(empty, Map::new(), session)?),
            }
        }

        Ok(result)
    }

    /// Evaluate one template and resolve its extends chain: each pending
    /// parent is evaluated against the same data, and the child's
    /// non-section output is discarded once a parent takes over.
    fn render_template(
        &self,
        view: &str,
        data: Map<String, Value>,
        session: &mut RenderSession,
    ) -> Result<String> {
        let mut merged = self.shared.clone();
        merged.extend(data);

        let mut current = view.to_string();
        loop {
            let path = self
                .locator
                .find(&current)
                .ok_or_else(|| TrellisError::TemplateNotFound(current.clone()))?;
            debug!(view = %current, path = %path.display(), "rendering template");

            let compiled = self.compiled_contents(&path)?;
            let output = self.evaluate_compiled(&compiled, &merged, session)?;

            match session.parent.take() {
                Some(parent) => current = parent,
                None => return Ok(output),
            }
        }
    }

    /// Compiled text for a source file, via the cache when one is
    /// configured and fresh.
    fn compiled_contents(&self, path: &Path) -> Result<String> {
        match &self.cache {
            None => Ok(self.compiler.compile(&fs::read_to_string(path)?)),
            Some(cache) => {
                if let Some(artifact) = cache.fresh(path)? {
                    return Ok(artifact);
                }
                let compiled = self.compiler.compile(&fs::read_to_string(path)?);
                cache.store(path, &compiled)?;
                Ok(compiled)
            }
        }
    }
}

#[cfg(test)]
mod tests;
