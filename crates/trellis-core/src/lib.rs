//! Directive-templating compiler and composition runtime.
//!
//! Source text annotated with `@` directives and `{{ }}` echoes is compiled
//! into fragment-delimited text, then evaluated against a data context while
//! a per-render session resolves `extends`/`section`/`push` composition into
//! one final output string.
//!
//! The compiler never parses the expression text embedded in directives and
//! echoes; it relocates it verbatim into fragments, and the engine hands it
//! to a pluggable [`Evaluator`] at render time.

// Core modules
pub mod compiler;
pub mod engine;
pub mod error;
pub mod view;

// Re-export commonly used types
pub use compiler::Compiler;
pub use engine::eval::{BasicEvaluator, DefaultHost, EvalError, Evaluator, Host};
pub use engine::loader::{CompiledCache, TemplateLocator};
pub use engine::{Engine, RenderSession};
pub use error::{Result, TrellisError};
pub use view::View;
