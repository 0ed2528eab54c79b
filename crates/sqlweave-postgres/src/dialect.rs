//! PostgreSQL spelling rules.

use sqlweave_core::Result;
use sqlweave_query::Dialect;
use sqlweave_query::dialect::{lookup_function, quote_with, unsupported_method};
use sqlweave_query::ir::{AggregateFunction, MethodKind, SequenceMethod, TypeSpec};

use crate::types::{column_type, oid_of, type_name};

const FUNCTIONS: &[(&str, &str)] = &[
    ("lower", "lower"),
    ("upper", "upper"),
    ("length", "char_length"),
    ("trim", "btrim"),
    ("substring", "substr"),
    ("abs", "abs"),
    ("ceiling", "ceil"),
    ("floor", "floor"),
    ("coalesce", "coalesce"),
    ("concat", "concat"),
    ("now", "now"),
];

/// Longest identifier PostgreSQL keeps (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER: usize = 63;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn identifier(&self, name: &str) -> String {
        quote_with('"', name)
    }

    fn data_type(&self, spec: &TypeSpec) -> Result<String> {
        column_type(spec)
    }

    fn method_name(&self, kind: &MethodKind) -> Result<String> {
        let native = match kind {
            MethodKind::Function(name) => lookup_function(FUNCTIONS, name),
            MethodKind::Aggregate(function) => match function {
                AggregateFunction::Count => Some("count"),
                AggregateFunction::Sum => Some("sum"),
                AggregateFunction::Average => Some("avg"),
                AggregateFunction::Max => Some("max"),
                AggregateFunction::Min => Some("min"),
                AggregateFunction::StdDev => Some("stddev_pop"),
                AggregateFunction::Variance => Some("var_pop"),
                AggregateFunction::First | AggregateFunction::Last | AggregateFunction::Spread => {
                    None
                }
            },
            MethodKind::Sequence(SequenceMethod::Next) => Some("nextval"),
            MethodKind::Sequence(SequenceMethod::Current) => Some("currval"),
        };
        native
            .map(str::to_string)
            .ok_or_else(|| unsupported_method(self.name(), kind))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    /// `{table}_{column}_seq`, truncated the way the server truncates it.
    fn sequence_name(&self, table: &str, column: &str) -> String {
        let mut name = format!("{}_{}_seq", table, column);
        if name.len() > MAX_IDENTIFIER {
            let mut end = MAX_IDENTIFIER;
            while !name.is_char_boundary(end) {
                end -= 1;
            }
            name.truncate(end);
        }
        name
    }

    fn identity_clause(&self) -> Option<&'static str> {
        Some("GENERATED BY DEFAULT AS IDENTITY")
    }

    fn native_type(&self, spec: &TypeSpec) -> Option<String> {
        Some(type_name(oid_of(spec.data_type)).to_string())
    }
}
