pub mod ansi;
pub mod json;
pub mod registry;

use crate::check::SyntaxError;
use crate::compiler::CompileError;
use crate::engine::Error;
use crate::source::Span;
use crate::vm::{EvalError, VmError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into(), is_primary: true });
        self
    }

    pub fn with_secondary_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into(), is_primary: false });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Move every label by `by` bytes, for an expression embedded in a larger file.
    pub fn shifted(mut self, by: usize) -> Self {
        for label in &mut self.labels {
            label.span = label.span.offset(by);
        }
        self
    }
}

// ---- From impls for the error types ----

impl From<&SyntaxError> for Diagnostic {
    fn from(e: &SyntaxError) -> Self {
        let mut d = Diagnostic::error(&e.message).with_code(e.code).with_span(e.span, "here");
        if e.code == "VX-S011" {
            d = d.with_suggestion("separate terms with an operator, or call a function such as max(a, b)");
        }
        d
    }
}

impl From<&CompileError> for Diagnostic {
    fn from(e: &CompileError) -> Self {
        let label = match e {
            CompileError::UnknownIdentifier { .. } => "not a variable or function",
            CompileError::ArityMismatch { .. } => "in this call",
            _ => "here",
        };
        let mut d = Diagnostic::error(e.to_string()).with_code(e.code()).with_span(e.span(), label);
        if let CompileError::UnknownIdentifier { name, .. } = e {
            d = d.with_suggestion(format!("define it first, e.g. `{name} = 0`"));
        }
        d
    }
}

impl From<&VmError> for Diagnostic {
    fn from(e: &VmError) -> Self {
        let d = Diagnostic::error(e.kind.to_string()).with_code(e.kind.code());
        let d = if e.span == Span::UNKNOWN { d } else { d.with_span(e.span, "while evaluating this") };
        match &e.kind {
            EvalError::UnknownVariableSlot { .. } => {
                d.with_note("a variable this expression uses was removed after it was parsed")
            }
            EvalError::TypeMismatch { .. } => d.with_note("vectors combine with vectors; scalars scale vectors"),
            _ => d,
        }
    }
}

impl From<&Error> for Diagnostic {
    fn from(e: &Error) -> Self {
        let d = match e {
            Error::Syntax { source, .. } => Diagnostic::from(source),
            Error::Compile { source, .. } => Diagnostic::from(source),
            Error::Eval { source, .. } => Diagnostic::from(source),
            Error::Conversion { source, .. } => Diagnostic::error(source.to_string()).with_code(e.code()),
            Error::Env(env) => Diagnostic::error(env.to_string()).with_code(env.code()),
            Error::NoProgram => Diagnostic::error(e.to_string()).with_code(e.code()),
        };
        match e.expr() {
            Some(expr) if !d.labels.is_empty() => d.with_source(expr),
            _ => d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::value::ValueKind;

    #[test]
    fn diagnostic_error_builder() {
        let d = Diagnostic::error("something went wrong");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "something went wrong");
        assert!(d.code.is_none());
        assert!(d.labels.is_empty());
        assert!(d.notes.is_empty());
        assert!(d.suggestion.is_none());
    }

    #[test]
    fn diagnostic_with_span() {
        let d = Diagnostic::error("bad token").with_span(Span::new(5, 8), "here");
        assert_eq!(d.labels.len(), 1);
        assert_eq!(d.labels[0].span, Span::new(5, 8));
        assert!(d.labels[0].is_primary);
    }

    #[test]
    fn shifted_moves_labels() {
        let d = Diagnostic::error("bad").with_span(Span::new(1, 2), "").shifted(10);
        assert_eq!(d.labels[0].span, Span::new(11, 12));
    }

    #[test]
    fn from_syntax_error() {
        let e = SyntaxError { code: "VX-S007", message: "unterminated bracket".into(), span: Span::point(4) };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("VX-S007"));
        assert_eq!(d.message, "unterminated bracket");
        assert_eq!(d.labels[0].span.start, 4);
    }

    #[test]
    fn from_compile_error_suggests_definition() {
        let e = CompileError::UnknownIdentifier { name: "zz".into(), span: Span::new(3, 5) };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("VX-C001"));
        assert!(d.message.contains("zz"));
        assert!(d.suggestion.unwrap().contains("zz = 0"));
    }

    #[test]
    fn from_vm_error() {
        let e = VmError {
            kind: EvalError::TypeMismatch { op: "add", left: ValueKind::Scalar, right: ValueKind::Vector },
            span: Span::new(1, 2),
        };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("VX-E004"));
        assert_eq!(d.notes.len(), 1);
    }

    #[test]
    fn from_engine_error_carries_expression() {
        let err = Engine::new().eval::<f64>("1 + (2").unwrap_err();
        let d = Diagnostic::from(&err);
        assert_eq!(d.source.as_deref(), Some("1 + (2"));
        assert_eq!(d.labels[0].span, Span::point(6));
    }

    #[test]
    fn env_errors_have_no_source() {
        let mut e = Engine::new();
        let err = e.remove_variable("ghost").unwrap_err();
        let d = Diagnostic::from(&err);
        assert_eq!(d.code, Some("VX-V002"));
        assert!(d.source.is_none());
    }
}
