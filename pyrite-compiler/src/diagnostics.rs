use std::fmt;

use serde::Serialize;

use crate::ast::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub level: DiagnosticLevel,
    pub file: String,
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
        };
        write!(
            f,
            "{}:{}:{}: {level}: {}",
            self.file, self.line, self.col, self.message
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push_error<S: Into<String>>(&mut self, file: &str, span: SourceSpan, message: S) {
        self.push(DiagnosticLevel::Error, file, span, message);
    }

    pub fn push_warning<S: Into<String>>(&mut self, file: &str, span: SourceSpan, message: S) {
        self.push(DiagnosticLevel::Warning, file, span, message);
    }

    fn push<S: Into<String>>(
        &mut self,
        level: DiagnosticLevel,
        file: &str,
        span: SourceSpan,
        message: S,
    ) {
        self.entries.push(Diagnostic {
            message: message.into(),
            level,
            file: file.to_string(),
            line: span.line,
            col: span.column,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|diagnostic| diagnostic.level == DiagnosticLevel::Error)
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|diagnostic| diagnostic.level == DiagnosticLevel::Error)
            .count()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn messages(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|diagnostic| diagnostic.message.as_str())
            .collect()
    }
}
