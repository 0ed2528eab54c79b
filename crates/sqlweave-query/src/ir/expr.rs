//! Expressions of the statement IR.
//!
//! Conditions, values and calls are one tree. Field references name the
//! table occurrence they read from by [`TableId`]; the visitor turns that
//! into an alias. Nothing here knows about a dialect.

use sqlweave_core::{DataType, SimplexProperty, Value};

use super::Select;
use super::table::TableId;

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column of a table occurrence
    Field { table: TableId, column: String },

    /// Bound parameter
    Parameter(Param),

    /// Inline literal
    Constant(Value),

    /// `*`, as in `COUNT(*)`
    Star,

    /// Binary operation (comparison, arithmetic, concatenation)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Conjunction; an empty list renders as a tautology
    And(Vec<Expr>),

    /// Disjunction; an empty list renders as a contradiction
    Or(Vec<Expr>),

    Not(Box<Expr>),

    /// IN list
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },

    /// LIKE pattern
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// EXISTS / NOT EXISTS sub-select
    Exists { query: Box<Select>, negated: bool },

    /// Function, aggregate or sequence accessor
    Method(MethodCall),

    /// Type conversion
    Convert { expr: Box<Expr>, target: TypeSpec },

    /// Named placeholder filled after rendering
    Slot(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Comparison
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,

    // Arithmetic
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// Division (/)
    Div,
    /// Modulo (%)
    Mod,

    // String
    /// String concatenation (||)
    Concat,
}

impl BinaryOp {
    /// The generic SQL spelling of this operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => "||",
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// A canonical type plus its size facets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeSpec {
    pub data_type: DataType,
    pub length: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
}

impl TypeSpec {
    pub const fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            length: None,
            precision: None,
            scale: None,
        }
    }

    pub const fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub const fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// The declared type of a simplex property.
    pub fn of(property: &SimplexProperty) -> Self {
        Self {
            data_type: property.data_type,
            length: property.length,
            precision: property.precision,
            scale: property.scale,
        }
    }
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSource {
    /// Supplied by the caller
    Input,
    /// Pending: drawn from an external counter before execution
    Sequence {
        name: String,
        seed: i64,
        interval: i64,
    },
}

/// A parameter node.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub spec: TypeSpec,
    pub value: Value,
    pub source: ParameterSource,
}

impl Param {
    /// A caller-supplied value.
    pub fn input(name: impl Into<String>, spec: TypeSpec, value: Value) -> Self {
        Self {
            name: name.into(),
            spec,
            value,
            source: ParameterSource::Input,
        }
    }

    /// A value drawn from an external sequence at execution time.
    pub fn pending(name: impl Into<String>, spec: TypeSpec, source: ParameterSource) -> Self {
        Self {
            name: name.into(),
            spec,
            value: Value::Null,
            source,
        }
    }
}

/// Canonical aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Average,
    Max,
    Min,
    StdDev,
    Variance,
    /// First value in time order (time-series engines)
    First,
    /// Last value in time order (time-series engines)
    Last,
    /// Max minus min (time-series engines)
    Spread,
}

impl AggregateFunction {
    pub const fn name(self) -> &'static str {
        match self {
            AggregateFunction::Count => "Count",
            AggregateFunction::Sum => "Sum",
            AggregateFunction::Average => "Average",
            AggregateFunction::Max => "Max",
            AggregateFunction::Min => "Min",
            AggregateFunction::StdDev => "StdDev",
            AggregateFunction::Variance => "Variance",
            AggregateFunction::First => "First",
            AggregateFunction::Last => "Last",
            AggregateFunction::Spread => "Spread",
        }
    }
}

/// Sequence accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceMethod {
    Current,
    Next,
}

/// What a method call invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodKind {
    /// Canonical scalar function name, matched case-insensitively
    Function(String),
    Aggregate(AggregateFunction),
    /// Sequence accessor; the argument is the sequence name
    Sequence(SequenceMethod),
}

/// A method call node.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub kind: MethodKind,
    pub args: Vec<Expr>,
    pub distinct: bool,
}

impl MethodCall {
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            kind: MethodKind::Function(name.into()),
            args,
            distinct: false,
        }
    }

    pub fn aggregate(function: AggregateFunction, arg: Expr) -> Self {
        Self {
            kind: MethodKind::Aggregate(function),
            args: vec![arg],
            distinct: false,
        }
    }

    pub fn sequence(method: SequenceMethod, name: impl Into<String>) -> Self {
        Self {
            kind: MethodKind::Sequence(method),
            args: vec![Expr::Constant(Value::Text(name.into()))],
            distinct: false,
        }
    }
}

impl Expr {
    pub fn field(table: TableId, column: impl Into<String>) -> Self {
        Expr::Field {
            table,
            column: column.into(),
        }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Equal to (=)
    pub fn eq(self, other: Expr) -> Self {
        Expr::binary(self, BinaryOp::Eq, other)
    }

    /// Logical NOT
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Conjoin, flattening nested conjunctions and dropping tautologies.
    pub fn all(items: impl IntoIterator<Item = Expr>) -> Self {
        let mut out = Vec::new();
        for item in items {
            match item {
                Expr::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        if out.len() == 1 {
            out.remove(0)
        } else {
            Expr::And(out)
        }
    }

    /// True for an empty conjunction.
    pub fn is_tautology(&self) -> bool {
        matches!(self, Expr::And(items) if items.is_empty())
    }

    /// Whether the tree contains an EXISTS node outside nested sub-selects.
    pub fn contains_exists(&self) -> bool {
        match self {
            Expr::Exists { .. } => true,
            Expr::Binary { left, right, .. } => left.contains_exists() || right.contains_exists(),
            Expr::And(items) | Expr::Or(items) => items.iter().any(Expr::contains_exists),
            Expr::Not(inner) => inner.contains_exists(),
            Expr::In { expr, list, .. } => {
                expr.contains_exists() || list.iter().any(Expr::contains_exists)
            }
            Expr::Like { expr, pattern, .. } => expr.contains_exists() || pattern.contains_exists(),
            Expr::IsNull { expr, .. } | Expr::Convert { expr, .. } => expr.contains_exists(),
            Expr::Method(call) => call.args.iter().any(Expr::contains_exists),
            Expr::Field { .. }
            | Expr::Parameter(_)
            | Expr::Constant(_)
            | Expr::Star
            | Expr::Slot(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_flattens_and_unwraps() {
        let a = Expr::field(TableId(0), "A");
        let b = Expr::field(TableId(0), "B");
        let c = Expr::field(TableId(1), "C");

        let nested = Expr::all([Expr::And(vec![a.clone(), b.clone()]), c.clone()]);
        assert_eq!(nested, Expr::And(vec![a.clone(), b, c]));

        assert_eq!(Expr::all([a.clone()]), a);
        assert!(Expr::all(Vec::new()).is_tautology());
    }

    #[test]
    fn test_operator_spelling() {
        assert_eq!(BinaryOp::Ne.as_str(), "<>");
        assert_eq!(BinaryOp::Concat.as_str(), "||");
        assert!(BinaryOp::Ge.is_comparison());
        assert!(!BinaryOp::Add.is_comparison());
    }

    #[test]
    fn test_sequence_call_carries_name_argument() {
        let call = MethodCall::sequence(SequenceMethod::Next, "orders_Id_seq");
        assert_eq!(
            call.args,
            vec![Expr::Constant(Value::Text("orders_Id_seq".to_string()))]
        );
    }
}
