//! The error type shared by every stage of the JIT.
//!
//! Every variant is fatal to the current call. Errors carry enough
//! location information to be rendered as a [`Diagnostic`] against the
//! function source.

use std::path::PathBuf;

use crate::diagnostic::{render_diagnostics, Diagnostic};
use crate::syntax::span::Span;

pub type Result<T, E = JitError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum JitError {
    /// An AST node kind, operator, or callee outside the supported set.
    #[error("unsupported construct: {construct}")]
    UnsupportedConstruct { construct: String, span: Span },

    /// A parameter without an annotation, or one that is not a tensor descriptor.
    #[error("parameter '{param}' needs a tensor annotation: {reason}")]
    MissingAnnotation {
        param: String,
        reason: String,
        span: Span,
    },

    /// A load of a name that was never stored.
    #[error("name '{name}' is not defined")]
    UnboundName { name: String, span: Span },

    /// Target token outside `cpu` / `cuda`.
    #[error("invalid target '{token}': target must be 'cpu' or 'cuda'")]
    InvalidTarget { token: String },

    /// Unknown or malformed accelerator device model.
    #[error("invalid device model '{name}': {reason}")]
    InvalidDeviceModel { name: String, reason: String },

    /// Bound tensor data disagrees with its declared descriptor.
    #[error("binding mismatch: {message}")]
    BindingMismatch { message: String },

    /// Operand shapes or dtypes that cannot be combined.
    #[error("type mismatch: {message}")]
    TypeMismatch { message: String, span: Span },

    /// Any failure inside the pipeline, scheduler, or compiler.
    #[error("{stage} failed: {message}")]
    BackendCompilationFailure { stage: String, message: String },

    /// Lexer or parser diagnostics.
    #[error("syntax error: {}", first_message(.0))]
    Syntax(Vec<Diagnostic>),

    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn first_message(diags: &[Diagnostic]) -> String {
    match diags {
        [] => "unknown".to_string(),
        [only] => only.message.clone(),
        [first, rest @ ..] => format!("{} (and {} more)", first.message, rest.len()),
    }
}

impl JitError {
    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        JitError::UnsupportedConstruct {
            construct: construct.into(),
            span,
        }
    }

    pub fn backend(stage: impl Into<String>, message: impl Into<String>) -> Self {
        JitError::BackendCompilationFailure {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn binding(message: impl Into<String>) -> Self {
        JitError::BindingMismatch {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JitError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            JitError::UnsupportedConstruct { .. } => "UnsupportedConstruct",
            JitError::MissingAnnotation { .. } => "MissingAnnotation",
            JitError::UnboundName { .. } => "UnboundName",
            JitError::InvalidTarget { .. } => "InvalidTarget",
            JitError::InvalidDeviceModel { .. } => "InvalidDeviceModel",
            JitError::BindingMismatch { .. } => "BindingMismatch",
            JitError::TypeMismatch { .. } => "TypeMismatch",
            JitError::BackendCompilationFailure { .. } => "BackendCompilationFailure",
            JitError::Syntax(_) => "Syntax",
            JitError::Io { .. } => "Io",
        }
    }

    /// Convert into diagnostics for rendering against the function source.
    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            JitError::Syntax(diags) => diags.clone(),
            JitError::UnsupportedConstruct { span, .. } => vec![Diagnostic::error(
                self.to_string(),
                *span,
            )
            .with_help(
                "kernel functions support assignments, `+`, `*`, `print`, and `return`".to_string(),
            )],
            JitError::MissingAnnotation { span, .. } => vec![Diagnostic::error(
                self.to_string(),
                *span,
            )
            .with_help("annotate it like `a: Tensor(shape=(2, 3), dtype=\"float32\")`".to_string())],
            JitError::UnboundName { span, .. } | JitError::TypeMismatch { span, .. } => {
                vec![Diagnostic::error(self.to_string(), *span)]
            }
            JitError::InvalidTarget { .. } => vec![Diagnostic::error(
                self.to_string(),
                Span::dummy(),
            )
            .with_help("available targets: cpu, cuda".to_string())],
            JitError::InvalidDeviceModel { .. }
            | JitError::BindingMismatch { .. }
            | JitError::BackendCompilationFailure { .. }
            | JitError::Io { .. } => vec![Diagnostic::error(self.to_string(), Span::dummy())],
        }
    }

    /// Render the error to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        render_diagnostics(&self.to_diagnostics(), filename, source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let e = JitError::unsupported("operator Sub", Span::new(3, 8));
        assert_eq!(e.to_string(), "unsupported construct: operator Sub");
        assert_eq!(e.kind(), "UnsupportedConstruct");

        let e = JitError::InvalidTarget {
            token: "tpu".to_string(),
        };
        assert!(e.to_string().contains("'tpu'"));
    }

    #[test]
    fn test_syntax_error_summarizes_diagnostics() {
        let e = JitError::Syntax(vec![
            Diagnostic::error("expected ':'".to_string(), Span::dummy()),
            Diagnostic::error("expected expression".to_string(), Span::dummy()),
        ]);
        assert_eq!(e.to_string(), "syntax error: expected ':' (and 1 more)");
        assert_eq!(e.to_diagnostics().len(), 2);
    }

    #[test]
    fn test_diagnostics_keep_spans() {
        let e = JitError::UnboundName {
            name: "c".to_string(),
            span: Span::new(20, 21),
        };
        let diags = e.to_diagnostics();
        assert_eq!(diags[0].span, Span::new(20, 21));
        assert_eq!(diags[0].message, "name 'c' is not defined");
    }
}
