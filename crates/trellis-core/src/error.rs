use thiserror::Error;

use crate::engine::eval::EvalError;

#[derive(Error, Debug)]
pub enum TrellisError {
    // Lookup errors
    #[error("TEMPLATE_NOT_FOUND: template '{0}' not found")]
    TemplateNotFound(String),

    // Compiled-fragment structure errors
    #[error("UNCLOSED_FRAGMENT: fragment opened at byte {offset} has no closing marker")]
    UnclosedFragment { offset: usize },

    #[error("UNCLOSED_BLOCK: '{open}' has no matching '{close}'")]
    UnclosedBlock { open: String, close: String },

    #[error("UNMATCHED_BLOCK_OP: '{0}' outside of its enclosing block")]
    UnmatchedBlockOp(String),

    #[error("UNBALANCED_SECTION: '{0}' without a matching open")]
    UnbalancedSection(String),

    #[error("BAD_FRAGMENT_ARGS: {op}: {reason}")]
    BadFragmentArgs { op: String, reason: String },

    #[error("LOOP_LIMIT_EXCEEDED: loop ran past {limit} iterations")]
    LoopLimitExceeded { limit: usize },

    #[error("RENDER_DEPTH_EXCEEDED: template nesting ran past {limit} levels")]
    RenderDepthExceeded { limit: usize },

    #[error("UNKNOWN_CONDITION: no condition registered under '{0}'")]
    UnknownCondition(String),

    // Collaborator errors
    #[error("EVAL_ERROR: {0}")]
    Eval(#[from] EvalError),

    #[error("JSON_ERROR: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrellisError>;
