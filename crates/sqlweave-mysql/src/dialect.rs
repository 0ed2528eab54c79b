//! MySQL spelling rules.

use sqlweave_core::Result;
use sqlweave_query::dialect::{lookup_function, quote_with, unsupported_method};
use sqlweave_query::ir::{AggregateFunction, BinaryOp, MethodKind, Paging, TypeSpec};
use sqlweave_query::{Dialect, GeneratedValue, Symbol};

use crate::types::{FieldType, column_type, convert_type};

/// Statement that reads back an `AUTO_INCREMENT` value on the same connection.
pub const LAST_INSERT_ID: &str = "SELECT LAST_INSERT_ID()";

/// `LIMIT` used when only an offset is requested; MySQL has no bare `OFFSET`.
const UNBOUNDED_LIMIT: u64 = u64::MAX;

const FUNCTIONS: &[(&str, &str)] = &[
    ("lower", "LOWER"),
    ("upper", "UPPER"),
    ("length", "CHAR_LENGTH"),
    ("trim", "TRIM"),
    ("substring", "SUBSTRING"),
    ("abs", "ABS"),
    ("ceiling", "CEILING"),
    ("floor", "FLOOR"),
    ("coalesce", "COALESCE"),
    ("concat", "CONCAT"),
    ("now", "NOW"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

/// Quote a string literal with MySQL's backslash escapes.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier(&self, name: &str) -> String {
        quote_with('`', name)
    }

    fn literal(&self, text: &str) -> String {
        escape_literal(text)
    }

    fn symbol(&self, op: BinaryOp) -> Symbol {
        match op {
            BinaryOp::Concat => Symbol::Function("CONCAT"),
            other => Symbol::Infix(other.as_str()),
        }
    }

    fn data_type(&self, spec: &TypeSpec) -> Result<String> {
        column_type(spec)
    }

    fn convert_type(&self, spec: &TypeSpec) -> Result<String> {
        convert_type(spec)
    }

    fn method_name(&self, kind: &MethodKind) -> Result<String> {
        let native = match kind {
            MethodKind::Function(name) => lookup_function(FUNCTIONS, name),
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

    fn paging(&self, paging: &Paging) -> String {
        match (paging.limit, paging.offset) {
            (None, None) => String::new(),
            (Some(limit), None) => format!(" LIMIT {}", limit),
            (limit, Some(offset)) => format!(
                " LIMIT {} OFFSET {}",
                limit.unwrap_or(UNBOUNDED_LIMIT),
                offset
            ),
        }
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    fn generated_value(&self, column: &str) -> Option<GeneratedValue> {
        Some(GeneratedValue::FollowUp {
            column: column.to_string(),
            sql: LAST_INSERT_ID.to_string(),
        })
    }

    fn native_type(&self, spec: &TypeSpec) -> Option<String> {
        Some(FieldType::of(spec.data_type).name().to_string())
    }
}
