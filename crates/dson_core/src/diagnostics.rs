//! Recoverable conditions met during import and morph evaluation.
//!
//! None of these stop processing. Each one is logged when recorded and kept
//! so callers can inspect what was skipped or substituted.

use std::fmt;

/// Sentinel pushed by a formula when a referenced value cannot be resolved.
pub const UNRESOLVED_OPERAND_VALUE: f64 = -1.99;

/// A single recoverable event.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// A formula pushed a reference that resolved to nothing; the sentinel
    /// value was used instead.
    UnresolvedFormulaOperand { morph: String, url: String },

    /// A formula could not be evaluated (empty stack, leftover operands).
    MalformedFormula {
        morph: String,
        output: String,
        reason: String,
    },

    /// A formula uses an operation the engine does not implement.
    UnsupportedFormula { morph: String, output: String },

    /// A bone whose center and end point coincide; its end point was nudged.
    DegenerateBone { bone: String },

    /// A skin joint referenced a bone that is not part of the armature.
    UnknownBone { joint: String },

    /// A pose or rest transform targeted a bone missing from the armature.
    MissingBone { bone: String },

    /// A face with fewer than three or repeated vertex indices was skipped.
    MalformedFace { geometry: String, face: usize },

    /// Applying a morph looped back onto itself; the application was undone.
    FormulaCycle { morph: String },
}

impl Diagnostic {
    /// Log level the diagnostic is reported at. A joint without a bone loses
    /// skin influence and is reported as an error.
    pub fn level(&self) -> log::Level {
        match self {
            Diagnostic::UnknownBone { .. } => log::Level::Error,
            _ => log::Level::Warn,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedFormulaOperand { morph, url } => write!(
                f,
                "morph {}: unresolved operand {} (using {})",
                morph, url, UNRESOLVED_OPERAND_VALUE
            ),
            Diagnostic::MalformedFormula {
                morph,
                output,
                reason,
            } => write!(f, "morph {}: formula for {} skipped: {}", morph, output, reason),
            Diagnostic::UnsupportedFormula { morph, output } => {
                write!(f, "morph {}: unsupported formula for {}", morph, output)
            }
            Diagnostic::DegenerateBone { bone } => {
                write!(f, "bone {} has zero length, end point nudged", bone)
            }
            Diagnostic::UnknownBone { joint } => {
                write!(f, "could not find bone {} for skin joint", joint)
            }
            Diagnostic::MissingBone { bone } => write!(f, "bone not found {}", bone),
            Diagnostic::MalformedFace { geometry, face } => {
                write!(f, "geometry {}: skipped malformed face {}", geometry, face)
            }
            Diagnostic::FormulaCycle { morph } => {
                write!(f, "morph {}: formula cycle, application skipped", morph)
            }
        }
    }
}

/// Ordered collection of diagnostics.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        log::log!(diagnostic.level(), "{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
