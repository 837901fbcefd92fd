//! Path template compilation.
//!
//! Templates use the wire syntax `/segment/{variable}/segment2`. A variable may
//! carry constraints after a colon, e.g. `{id:regex=[0-9]+:maxlen=6}`. A
//! template is compiled once at registration time into an ordered list of
//! [`PathSegmentSpec`]s and then matched against normalized request paths.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::http::method::HttpMethod;
use crate::routing::matcher::{
    ConstraintError, PathSegmentSpec, VariableConstraint, CONSTRAINT_SEPARATOR, VARIABLE_END,
    VARIABLE_START,
};

/// Variables extracted by a successful match, in template declaration order.
pub type PathVariables = IndexMap<String, String>;

/// Errors raised while compiling a path template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidPathTemplateError {
    /// The pattern has no segments at all.
    #[error("path template is empty")]
    Empty,

    /// A segment between two slashes is empty.
    #[error("path template '{pattern}' has an empty segment at position {index}")]
    EmptySegment { pattern: String, index: usize },

    /// A `{}` segment.
    #[error("path template '{pattern}' declares a variable without a name")]
    EmptyVariableName { pattern: String },

    /// The same variable name appears twice.
    #[error("path template '{pattern}' declares variable '{name}' more than once")]
    DuplicateVariable { pattern: String, name: String },

    /// A brace that does not delimit a whole segment.
    #[error("path template '{pattern}' has malformed braces in segment '{segment}'")]
    MalformedBraces { pattern: String, segment: String },

    /// A variable constraint that does not parse.
    #[error("path template '{pattern}' has an invalid constraint on '{variable}': {source}")]
    InvalidConstraint {
        pattern: String,
        variable: String,
        source: ConstraintError,
    },
}

/// A compiled `(method, segments)` pattern.
///
/// Equality and hashing use the compiled segments, so `/a/{b}/` and `a/{b}`
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathTemplate {
    method: HttpMethod,
    segments: Vec<PathSegmentSpec>,
}

impl PathTemplate {
    /// Compile a raw pattern.
    pub fn compile(method: HttpMethod, raw: &str) -> Result<Self, InvalidPathTemplateError> {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(InvalidPathTemplateError::Empty);
        }

        let mut segments = Vec::new();
        for (index, part) in trimmed.split('/').enumerate() {
            if part.is_empty() {
                return Err(InvalidPathTemplateError::EmptySegment {
                    pattern: raw.to_string(),
                    index,
                });
            }

            let segment = parse_segment(raw, part)?;
            if segment.is_variable() {
                let name = segment.name();
                let duplicate = segments
                    .iter()
                    .any(|s: &PathSegmentSpec| s.is_variable() && s.name() == name);
                if duplicate {
                    return Err(InvalidPathTemplateError::DuplicateVariable {
                        pattern: raw.to_string(),
                        name: name.to_string(),
                    });
                }
            }
            segments.push(segment);
        }

        Ok(Self { method, segments })
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn segments(&self) -> &[PathSegmentSpec] {
        &self.segments
    }

    /// Names of all variable segments, in declaration order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .filter(|s| s.is_variable())
            .map(|s| s.name())
    }

    /// Match normalized path elements against this template.
    ///
    /// Returns the bound variables on success. Counts must agree exactly;
    /// there are no wildcard or suffix segments.
    pub fn matches(&self, path_segments: &[&str]) -> Option<PathVariables> {
        if path_segments.len() != self.segments.len() {
            return None;
        }

        let mut variables = PathVariables::new();
        for (spec, candidate) in self.segments.iter().zip(path_segments) {
            if !spec.matches(candidate) {
                return None;
            }
            if spec.is_variable() {
                variables.insert(spec.name().to_string(), (*candidate).to_string());
            }
        }
        Some(variables)
    }
}

fn parse_segment(pattern: &str, part: &str) -> Result<PathSegmentSpec, InvalidPathTemplateError> {
    let malformed = || InvalidPathTemplateError::MalformedBraces {
        pattern: pattern.to_string(),
        segment: part.to_string(),
    };

    if let Some(inner) = part
        .strip_prefix(VARIABLE_START)
        .and_then(|p| p.strip_suffix(VARIABLE_END))
    {
        // Braces are allowed inside constraints (`\d{3}`), never in the name.
        let (name, constraints) = match inner.split_once(CONSTRAINT_SEPARATOR) {
            Some((name, rest)) => (name, Some(rest)),
            None => (inner, None),
        };
        if name.contains([VARIABLE_START, VARIABLE_END]) {
            return Err(malformed());
        }
        if name.is_empty() {
            return Err(InvalidPathTemplateError::EmptyVariableName {
                pattern: pattern.to_string(),
            });
        }

        let constraints = constraints
            .into_iter()
            .flat_map(|rest| rest.split(CONSTRAINT_SEPARATOR))
            .map(VariableConstraint::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| InvalidPathTemplateError::InvalidConstraint {
                pattern: pattern.to_string(),
                variable: name.to_string(),
                source,
            })?;

        return Ok(PathSegmentSpec::Variable {
            name: name.to_string(),
            constraints,
        });
    }

    if part.contains([VARIABLE_START, VARIABLE_END]) {
        return Err(malformed());
    }
    Ok(PathSegmentSpec::Literal(part.to_string()))
}

/// Renders the normalized URL form, e.g. `/orders/{orderId}`.
impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
