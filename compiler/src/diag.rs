// diag.rs — Unified diagnostics model
//
// Shared diagnostic types for host-level failures: link requests the graph
// refuses and graph documents that cannot be loaded. The fill node itself
// never reports through this channel; it absorbs its own failure modes.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0101`, `W0201`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    pub const UNKNOWN_NODE: DiagCode = DiagCode("E0101");
    pub const UNKNOWN_PORT: DiagCode = DiagCode("E0102");
    pub const DIRECTION_MISMATCH: DiagCode = DiagCode("E0103");
    pub const INCOMPATIBLE_KINDS: DiagCode = DiagCode("E0104");
    pub const DUPLICATE_NODE: DiagCode = DiagCode("E0105");
    pub const UNKNOWN_PORT_KIND: DiagCode = DiagCode("E0106");
    pub const INVALID_DOCUMENT: DiagCode = DiagCode("E0107");
    pub const EMPTY_REGISTRY: DiagCode = DiagCode("E0108");
    pub const NOT_A_FILL_NODE: DiagCode = DiagCode("E0109");
    pub const STATE_TYPE_REJECTED: DiagCode = DiagCode("W0201");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A host-level diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    /// What the diagnostic is about, e.g. `node 'fill'`.
    pub subject: Option<String>,
    pub message: String,
    pub hint: Option<String>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, subject, hint, or notes.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            subject: None,
            message: message.into(),
            hint: None,
            notes: Vec::new(),
        }
    }

    pub fn error(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, message).with_code(code)
    }

    pub fn warning(code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, message).with_code(code)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: ", level, code)?;
        } else {
            write!(f, "{}: ", level)?;
        }
        if let Some(subject) = &self.subject {
            write!(f, "{}: ", subject)?;
        }
        write!(f, "{}", self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}
