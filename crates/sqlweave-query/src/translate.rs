//! Pieces shared by the native error translators.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use sqlweave_core::{
    ConstraintKind, DataArgumentError, DataConflictError, DataConstraintError, Error, QueryError,
};

/// A message pattern compiled on first use.
///
/// Usable in a `static`; a pattern that fails to compile logs a warning
/// once and never matches.
pub struct MessagePattern {
    pattern: &'static str,
    compiled: OnceLock<Option<Regex>>,
}

impl MessagePattern {
    pub const fn new(pattern: &'static str) -> Self {
        Self {
            pattern,
            compiled: OnceLock::new(),
        }
    }

    fn regex(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| match Regex::new(self.pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!(pattern = self.pattern, error = %e, "Invalid error message pattern");
                    None
                }
            })
            .as_ref()
    }

    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.regex()?.captures(text)
    }

    /// Text of the named group, if the pattern matches.
    pub fn group(&self, text: &str, name: &str) -> Option<String> {
        self.captures(text)?
            .name(name)
            .map(|m| m.as_str().to_string())
    }
}

/// The native error inside `error`, when it is one.
pub fn native(error: &Error) -> Option<&QueryError> {
    match error {
        Error::Query(query) => Some(query),
        _ => None,
    }
}

pub fn data_argument(query: &QueryError, field: Option<String>) -> Error {
    Error::DataArgument(DataArgumentError {
        field,
        message: query.message.clone(),
        code: query.code,
    })
}

pub fn data_conflict(query: &QueryError) -> Error {
    Error::DataConflict(DataConflictError {
        code: query.code,
        sqlstate: query.sqlstate.clone(),
        message: query.message.clone(),
    })
}

/// A unique or primary-key violation.
pub struct Violation {
    pub kind: ConstraintKind,
    pub key: String,
    pub value: Option<String>,
    pub table: Option<String>,
    pub fields: Vec<String>,
}

impl Violation {
    pub fn into_error(self, code: Option<i32>) -> Error {
        Error::DataConstraint(DataConstraintError {
            kind: self.kind,
            key: self.key,
            value: self.value,
            table: self.table,
            fields: self.fields,
            code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static COLUMN: MessagePattern = MessagePattern::new(r"column '(?P<column>[^']+)'");
    static BROKEN: MessagePattern = MessagePattern::new(r"(unclosed");

    #[test]
    fn test_named_group() {
        assert_eq!(
            COLUMN.group("Data too long for column 'name' at row 1", "column").as_deref(),
            Some("name")
        );
        assert_eq!(COLUMN.group("no match", "column"), None);
    }

    #[test]
    fn test_broken_pattern_never_matches() {
        assert!(BROKEN.captures("(unclosed").is_none());
    }

    #[test]
    fn test_conflict_keeps_native_details() {
        let query = QueryError::native(Some(1213), Some("40001"), "Deadlock found");
        let Error::DataConflict(conflict) = data_conflict(&query) else {
            panic!("expected conflict");
        };
        assert_eq!(conflict.code, Some(1213));
        assert_eq!(conflict.sqlstate.as_deref(), Some("40001"));
    }
}
