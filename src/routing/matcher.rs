//! Path segment matching.
//!
//! # Responsibilities
//! - Represent one compiled template segment (literal or variable)
//! - Parse and check variable constraints (`{id:regex=^[0-9]+$}`)
//! - Match a single request path element against a segment
//! - Normalize a raw request path into segments
//!
//! # Design Decisions
//! - Literal matching is case-sensitive
//! - A variable binds exactly one non-empty element that satisfies all of its constraints
//! - Interior empty elements (`//`) are kept so they can never match a variable
//! - Constraint regexes use the `regex` crate, so matching stays linear in the input
//! - Unknown constraint kinds fail compilation instead of being ignored

use std::fmt;
use std::hash::{Hash, Hasher};

use regex::Regex;
use thiserror::Error;

/// Opening delimiter of a variable segment.
pub const VARIABLE_START: char = '{';
/// Closing delimiter of a variable segment.
pub const VARIABLE_END: char = '}';
/// Separates a variable name from its constraints and constraints from each other.
pub const CONSTRAINT_SEPARATOR: char = ':';

/// Why a `kind=value` constraint could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("unknown constraint kind '{0}'")]
    UnknownKind(String),

    #[error("constraint '{0}' has no value")]
    MissingValue(String),

    #[error("'{value}' is not a valid length for '{kind}'")]
    InvalidLength { kind: String, value: String },

    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

/// A check applied to the element a variable would bind.
#[derive(Debug, Clone)]
pub enum VariableConstraint {
    /// At least this many characters.
    MinLength(usize),
    /// At most this many characters.
    MaxLength(usize),
    /// The whole element must match. Keeps the declared source for display.
    Regex { source: String, regex: Regex },
}

impl VariableConstraint {
    /// Parse one `kind=value` constraint: `minlen=3`, `maxlen=8` or `regex=...`.
    pub fn parse(raw: &str) -> Result<Self, ConstraintError> {
        let Some((kind, value)) = raw.split_once('=') else {
            return Err(ConstraintError::MissingValue(raw.to_string()));
        };

        let length = || {
            value.parse::<usize>().map_err(|_| ConstraintError::InvalidLength {
                kind: kind.to_string(),
                value: value.to_string(),
            })
        };

        match kind {
            "minlen" => Ok(Self::MinLength(length()?)),
            "maxlen" => Ok(Self::MaxLength(length()?)),
            "regex" => {
                // Anchored so the constraint applies to the whole element
                let regex = Regex::new(&format!("^(?:{value})$")).map_err(|e| {
                    ConstraintError::InvalidRegex {
                        pattern: value.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Self::Regex {
                    source: value.to_string(),
                    regex,
                })
            }
            other => Err(ConstraintError::UnknownKind(other.to_string())),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::MinLength(min) => candidate.chars().count() >= *min,
            Self::MaxLength(max) => candidate.chars().count() <= *max,
            Self::Regex { regex, .. } => regex.is_match(candidate),
        }
    }
}

impl fmt::Display for VariableConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinLength(n) => write!(f, "minlen={n}"),
            Self::MaxLength(n) => write!(f, "maxlen={n}"),
            Self::Regex { source, .. } => write!(f, "regex={source}"),
        }
    }
}

// `Regex` has no equality; constraints compare by their declared form.
impl PartialEq for VariableConstraint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::MinLength(a), Self::MinLength(b)) | (Self::MaxLength(a), Self::MaxLength(b)) => {
                a == b
            }
            (Self::Regex { source: a, .. }, Self::Regex { source: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for VariableConstraint {}

impl Hash for VariableConstraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::MinLength(n) | Self::MaxLength(n) => n.hash(state),
            Self::Regex { source, .. } => source.hash(state),
        }
    }
}

/// One segment of a compiled path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegmentSpec {
    /// Matches the element verbatim.
    Literal(String),
    /// Binds a non-empty element to `name` if every constraint accepts it.
    Variable {
        name: String,
        constraints: Vec<VariableConstraint>,
    },
}

impl PathSegmentSpec {
    /// Unconstrained variable.
    pub fn variable(name: impl Into<String>) -> Self {
        PathSegmentSpec::Variable {
            name: name.into(),
            constraints: Vec::new(),
        }
    }

    /// Returns true if `candidate` satisfies this segment.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            PathSegmentSpec::Literal(text) => text == candidate,
            PathSegmentSpec::Variable { constraints, .. } => {
                !candidate.is_empty() && constraints.iter().all(|c| c.matches(candidate))
            }
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, PathSegmentSpec::Variable { .. })
    }

    /// Literal text or variable name.
    pub fn name(&self) -> &str {
        match self {
            PathSegmentSpec::Literal(text) => text,
            PathSegmentSpec::Variable { name, .. } => name,
        }
    }
}

impl fmt::Display for PathSegmentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegmentSpec::Literal(text) => f.write_str(text),
            PathSegmentSpec::Variable { name, constraints } => {
                write!(f, "{VARIABLE_START}{name}")?;
                for constraint in constraints {
                    write!(f, "{CONSTRAINT_SEPARATOR}{constraint}")?;
                }
                write!(f, "{VARIABLE_END}")
            }
        }
    }
}

/// Split a raw request path into its elements.
///
/// One leading and one trailing slash are trimmed; repeated interior
/// slashes produce empty elements.
pub fn split_path(raw_path: &str) -> Vec<&str> {
    let trimmed = raw_path.strip_prefix('/').unwrap_or(raw_path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.split('/').collect()
}
