//! Dialect policy.
//!
//! A dialect is a pure, stateless policy object: how identifiers, aliases
//! and literals are quoted, which operators render as functions, how the
//! canonical types and functions are spelled, and what a placeholder looks
//! like. Structural differences between engines live in statement visitors,
//! not here.

use std::fmt;

use sqlweave_core::{DataType, DialectErrorKind, Error, Result};

use crate::ir::{AggregateFunction, BinaryOp, MethodKind, Paging, SequenceMethod, TypeSpec};
use crate::script::GeneratedValue;

/// How a binary operator is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// `left OP right`
    Infix(&'static str),
    /// `FN(left, right)`
    Function(&'static str),
}

/// Engine spelling rules.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Quote a table or column identifier.
    fn identifier(&self, name: &str) -> String;

    /// Quote a generated alias.
    fn alias(&self, name: &str) -> String {
        self.identifier(name)
    }

    /// Quote a string literal.
    fn literal(&self, text: &str) -> String {
        quote_with('\'', text)
    }

    fn symbol(&self, op: BinaryOp) -> Symbol {
        Symbol::Infix(op.as_str())
    }

    /// Column type for a canonical type and its facets.
    fn data_type(&self, spec: &TypeSpec) -> Result<String>;

    /// Destination type of a conversion.
    fn convert_type(&self, spec: &TypeSpec) -> Result<String> {
        self.data_type(spec)
    }

    /// Native name of a function, aggregate or sequence accessor.
    fn method_name(&self, kind: &MethodKind) -> Result<String>;

    /// Placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String {
        let _ = index;
        "?".to_string()
    }

    /// ` LIMIT n OFFSET m` tail; empty when `paging` is empty.
    fn paging(&self, paging: &Paging) -> String {
        let mut out = String::new();
        if let Some(limit) = paging.limit {
            out.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = paging.offset {
            out.push_str(&format!(" OFFSET {}", offset));
        }
        out
    }

    /// Name of the engine sequence backing an auto-generated column.
    fn sequence_name(&self, table: &str, column: &str) -> String {
        format!("{}_{}_seq", table, column)
    }

    /// Column clause marking an engine-generated key.
    fn identity_clause(&self) -> Option<&'static str> {
        None
    }

    /// How an insert reads back an engine-generated key.
    fn generated_value(&self, column: &str) -> Option<GeneratedValue> {
        Some(GeneratedValue::Returning {
            column: column.to_string(),
        })
    }

    /// Type name attached to bound parameters.
    fn native_type(&self, spec: &TypeSpec) -> Option<String> {
        self.data_type(spec).ok()
    }
}

/// Wrap `text` in `quote`, doubling embedded quote characters.
pub fn quote_with(quote: char, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

/// Case-insensitive lookup in a `(canonical, native)` table.
pub fn lookup_function<'a>(table: &[(&str, &'a str)], name: &str) -> Option<&'a str> {
    table
        .iter()
        .find(|(canonical, _)| canonical.eq_ignore_ascii_case(name))
        .map(|(_, native)| *native)
}

/// `UnsupportedFunction` / `UnsupportedAggregate` / `UnsupportedSequenceOperation`
/// for a method kind the dialect does not map.
pub fn unsupported_method(dialect: &'static str, kind: &MethodKind) -> Error {
    match kind {
        MethodKind::Function(name) => {
            Error::dialect(DialectErrorKind::UnsupportedFunction, dialect, name.clone())
        }
        MethodKind::Aggregate(function) => Error::dialect(
            DialectErrorKind::UnsupportedAggregate,
            dialect,
            function.name(),
        ),
        MethodKind::Sequence(method) => Error::dialect(
            DialectErrorKind::UnsupportedSequenceOperation,
            dialect,
            match method {
                SequenceMethod::Current => "current",
                SequenceMethod::Next => "next",
            },
        ),
    }
}

/// `UnsupportedType` for `spec`.
pub fn unsupported_type(dialect: &'static str, spec: &TypeSpec) -> Error {
    Error::dialect(
        DialectErrorKind::UnsupportedType,
        dialect,
        spec.data_type.name(),
    )
}

/// Standard SQL, used when no engine is targeted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiDialect;

const ANSI_FUNCTIONS: &[(&str, &str)] = &[
    ("lower", "LOWER"),
    ("upper", "UPPER"),
    ("length", "CHAR_LENGTH"),
    ("trim", "TRIM"),
    ("substring", "SUBSTRING"),
    ("abs", "ABS"),
    ("ceiling", "CEILING"),
    ("floor", "FLOOR"),
    ("coalesce", "COALESCE"),
];

impl Dialect for AnsiDialect {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn identifier(&self, name: &str) -> String {
        quote_with('"', name)
    }

    fn data_type(&self, spec: &TypeSpec) -> Result<String> {
        let text = match spec.data_type {
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Byte | DataType::SByte | DataType::Int16 => "SMALLINT".to_string(),
            DataType::UInt16 | DataType::Int32 => "INTEGER".to_string(),
            DataType::UInt32 | DataType::Int64 => "BIGINT".to_string(),
            DataType::UInt64 => "DECIMAL(20, 0)".to_string(),
            DataType::Single => "REAL".to_string(),
            DataType::Double => "DOUBLE PRECISION".to_string(),
            DataType::Decimal | DataType::Currency => format!(
                "DECIMAL({}, {})",
                spec.precision.unwrap_or(18),
                spec.scale.unwrap_or(2)
            ),
            DataType::String | DataType::AnsiString => match spec.length {
                Some(n) => format!("VARCHAR({})", n),
                None => "VARCHAR(255)".to_string(),
            },
            DataType::StringFixedLength | DataType::AnsiStringFixedLength => {
                format!("CHAR({})", spec.length.unwrap_or(1))
            }
            DataType::Binary => "BLOB".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME".to_string(),
            DataType::DateTime | DataType::Timestamp => "TIMESTAMP".to_string(),
            DataType::DateTimeOffset => "TIMESTAMP WITH TIME ZONE".to_string(),
            DataType::Guid | DataType::Json => return Err(unsupported_type(self.name(), spec)),
        };
        Ok(text)
    }

    fn method_name(&self, kind: &MethodKind) -> Result<String> {
        let native = match kind {
            MethodKind::Function(name) => lookup_function(ANSI_FUNCTIONS, name),
            MethodKind::Aggregate(function) => match function {
                AggregateFunction::Count => Some("COUNT"),
                AggregateFunction::Sum => Some("SUM"),
                AggregateFunction::Average => Some("AVG"),
                AggregateFunction::Max => Some("MAX"),
                AggregateFunction::Min => Some("MIN"),
                AggregateFunction::StdDev => Some("STDDEV_POP"),
                AggregateFunction::Variance => Some("VAR_POP"),
                AggregateFunction::First | AggregateFunction::Last | AggregateFunction::Spread => {
                    None
                }
            },
            MethodKind::Sequence(_) => None,
        };
        native
            .map(str::to_string)
            .ok_or_else(|| unsupported_method(self.name(), kind))
    }

    fn generated_value(&self, _column: &str) -> Option<GeneratedValue> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_doubles_embedded_quotes() {
        assert_eq!(quote_with('"', "name"), "\"name\"");
        assert_eq!(quote_with('"', "a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_with('`', "a`b"), "`a``b`");
        assert_eq!(AnsiDialect.literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_function_lookup_is_case_insensitive() {
        assert_eq!(
            AnsiDialect
                .method_name(&MethodKind::Function("LoWeR".to_string()))
                .unwrap(),
            "LOWER"
        );
        let err = AnsiDialect
            .method_name(&MethodKind::Function("soundex".to_string()))
            .unwrap_err();
        assert_eq!(err.dialect_kind(), Some(DialectErrorKind::UnsupportedFunction));
    }

    #[test]
    fn test_unsupported_aggregate_and_sequence() {
        let err = AnsiDialect
            .method_name(&MethodKind::Aggregate(AggregateFunction::Spread))
            .unwrap_err();
        assert_eq!(err.dialect_kind(), Some(DialectErrorKind::UnsupportedAggregate));

        let err = AnsiDialect
            .method_name(&MethodKind::Sequence(SequenceMethod::Current))
            .unwrap_err();
        assert_eq!(
            err.dialect_kind(),
            Some(DialectErrorKind::UnsupportedSequenceOperation)
        );
    }

    #[test]
    fn test_data_type_facets() {
        let spec = TypeSpec::new(DataType::Decimal).precision(10, 4);
        assert_eq!(AnsiDialect.data_type(&spec).unwrap(), "DECIMAL(10, 4)");
        let spec = TypeSpec::new(DataType::String).length(40);
        assert_eq!(AnsiDialect.data_type(&spec).unwrap(), "VARCHAR(40)");
        let err = AnsiDialect
            .data_type(&TypeSpec::new(DataType::Json))
            .unwrap_err();
        assert_eq!(err.dialect_kind(), Some(DialectErrorKind::UnsupportedType));
    }
}
