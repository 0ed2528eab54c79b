//! TDengine spelling rules.

use sqlweave_core::Result;
use sqlweave_query::dialect::{lookup_function, quote_with, unsupported_method};
use sqlweave_query::ir::{AggregateFunction, BinaryOp, MethodKind, Paging, TypeSpec};
use sqlweave_query::{Dialect, GeneratedValue, Symbol};

use crate::types::{TsdbType, column_type};

pub const NAME: &str = "tdengine";

/// `LIMIT` used when only an offset is requested.
const UNBOUNDED_LIMIT: i64 = i64::MAX;

const FUNCTIONS: &[(&str, &str)] = &[
    ("lower", "LOWER"),
    ("upper", "UPPER"),
    ("length", "CHAR_LENGTH"),
    ("ltrim", "LTRIM"),
    ("rtrim", "RTRIM"),
    ("substring", "SUBSTR"),
    ("abs", "ABS"),
    ("ceiling", "CEIL"),
    ("floor", "FLOOR"),
    ("concat", "CONCAT"),
    ("now", "NOW"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct TdengineDialect;

impl Dialect for TdengineDialect {
    fn name(&self) -> &'static str {
        NAME
    }

    fn identifier(&self, name: &str) -> String {
        quote_with('`', name)
    }

    fn literal(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('\'');
        for c in text.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
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

    fn method_name(&self, kind: &MethodKind) -> Result<String> {
        let native = match kind {
            MethodKind::Function(name) => lookup_function(FUNCTIONS, name),
            MethodKind::Aggregate(function) => match function {
                AggregateFunction::Count => Some("COUNT"),
                AggregateFunction::Sum => Some("SUM"),
                AggregateFunction::Average => Some("AVG"),
                AggregateFunction::Max => Some("MAX"),
                AggregateFunction::Min => Some("MIN"),
                AggregateFunction::StdDev => Some("STDDEV"),
                AggregateFunction::First => Some("FIRST"),
                AggregateFunction::Last => Some("LAST"),
                AggregateFunction::Spread => Some("SPREAD"),
                AggregateFunction::Variance => None,
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
            (limit, Some(offset)) => match limit {
                Some(limit) => format!(" LIMIT {} OFFSET {}", limit, offset),
                None => format!(" LIMIT {} OFFSET {}", UNBOUNDED_LIMIT, offset),
            },
        }
    }

    fn generated_value(&self, _column: &str) -> Option<GeneratedValue> {
        None
    }

    fn native_type(&self, spec: &TypeSpec) -> Option<String> {
        TsdbType::of(spec.data_type).map(|ty| ty.name().to_string())
    }
}
