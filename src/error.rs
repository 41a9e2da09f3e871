// ABOUTME: Error types for evaluation failures in the macro expression evaluator

use crate::ast::SourceSpan;
use std::fmt;
use thiserror::Error;

/// Failure kinds the walker can raise, per spec §7. Every variant carries a
/// message and, where the producing node had one, a [`SourceSpan`].
#[derive(Error, Debug)]
pub enum EvalError {
    /// Operand variants incompatible with the operator or coercion target.
    #[error("type error: {message}")]
    TypeError {
        message: String,
        span: Option<SourceSpan>,
    },

    /// Division/modulo by zero, or a numeric conversion that failed.
    #[error("arithmetic error: {message}")]
    ArithmeticError {
        message: String,
        span: Option<SourceSpan>,
    },

    /// Compound assignment / increment / decrement applied to a name with
    /// no prior (non-null) value.
    #[error("unbound variable in compound operation: {name}")]
    UnboundError {
        name: String,
        span: Option<SourceSpan>,
    },

    /// Lambda parameter name collides with an existing local binding.
    #[error("lambda parameter `{name}` conflicts with an existing local binding")]
    ConflictError {
        name: String,
        span: Option<SourceSpan>,
    },

    /// Lambda invoked with the wrong number of arguments.
    #[error("lambda expected {expected} argument(s), got {actual}")]
    ArityError {
        expected: usize,
        actual: usize,
        span: Option<SourceSpan>,
    },

    /// The host's cancellation token was observed signalled.
    #[error("evaluation cancelled")]
    CancelledError,

    /// Any failure raised from a host capability, propagated as-is.
    #[error("host error: {source}")]
    HostError {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        span: Option<SourceSpan>,
    },
}

impl EvalError {
    pub fn type_error(message: impl Into<String>, span: Option<SourceSpan>) -> Self {
        EvalError::TypeError {
            message: message.into(),
            span,
        }
    }

    pub fn arithmetic_error(message: impl Into<String>, span: Option<SourceSpan>) -> Self {
        EvalError::ArithmeticError {
            message: message.into(),
            span,
        }
    }

    pub fn unbound(name: impl Into<String>, span: Option<SourceSpan>) -> Self {
        EvalError::UnboundError {
            name: name.into(),
            span,
        }
    }

    pub fn conflict(name: impl Into<String>, span: Option<SourceSpan>) -> Self {
        EvalError::ConflictError {
            name: name.into(),
            span,
        }
    }

    pub fn arity(expected: usize, actual: usize, span: Option<SourceSpan>) -> Self {
        EvalError::ArityError {
            expected,
            actual,
            span,
        }
    }

    pub fn host(
        source: impl std::error::Error + Send + Sync + 'static,
        span: Option<SourceSpan>,
    ) -> Self {
        EvalError::HostError {
            source: Box::new(source),
            span,
        }
    }

    pub fn from_host_error(
        source: Box<dyn std::error::Error + Send + Sync>,
        span: Option<SourceSpan>,
    ) -> Self {
        EvalError::HostError { source, span }
    }

    pub fn span(&self) -> Option<SourceSpan> {
        match self {
            EvalError::TypeError { span, .. }
            | EvalError::ArithmeticError { span, .. }
            | EvalError::UnboundError { span, .. }
            | EvalError::ConflictError { span, .. }
            | EvalError::ArityError { span, .. }
            | EvalError::HostError { span, .. } => *span,
            EvalError::CancelledError => None,
        }
    }
}

/// Marker error for the recursion guard described in SPEC_FULL.md §C,
/// wrapped into [`EvalError::HostError`] when the walker's configured
/// `max_call_depth` is exceeded.
#[derive(Debug)]
pub struct RecursionLimitExceeded {
    pub depth: usize,
    pub limit: usize,
}

impl fmt::Display for RecursionLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recursion depth {} exceeded configured limit {}",
            self.depth, self.limit
        )
    }
}

impl std::error::Error for RecursionLimitExceeded {}
