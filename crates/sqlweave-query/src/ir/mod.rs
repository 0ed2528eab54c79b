//! Statement IR.
//!
//! One node per statement kind, composed of table references, joins,
//! condition trees, method calls, conversions and named slots. Instances
//! are built per call by the statement builder and rendered by a
//! [`Visitor`](crate::visitor::Visitor); they carry no dialect knowledge.

pub mod expr;
pub mod table;

use std::fmt;

pub use expr::{
    AggregateFunction, BinaryOp, Expr, MethodCall, MethodKind, Param, ParameterSource,
    SequenceMethod, TypeSpec,
};
pub use table::{
    JoinClause, JoinKind, OrderBy, OrderDirection, Paging, Source, TableId, TableName, TableRef,
};

/// The nine statement kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatementKind {
    TableDefinition,
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
    Aggregate,
    Exist,
    Execution,
}

impl StatementKind {
    pub const ALL: [StatementKind; 9] = [
        StatementKind::TableDefinition,
        StatementKind::Select,
        StatementKind::Insert,
        StatementKind::Update,
        StatementKind::Delete,
        StatementKind::Upsert,
        StatementKind::Aggregate,
        StatementKind::Exist,
        StatementKind::Execution,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            StatementKind::TableDefinition => "table definition",
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Upsert => "upsert",
            StatementKind::Aggregate => "aggregate",
            StatementKind::Exist => "exist",
            StatementKind::Execution => "execution",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A projected expression with an optional output name.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl Projection {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// `column = value` in INSERT/UPDATE/UPSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
    /// Tag column on engines with supertables
    pub tag: bool,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: Expr) -> Self {
        Self {
            column: column.into(),
            value,
            tag: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub projection: Vec<Projection>,
    pub source: Source,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderBy>,
    pub paging: Paging,
    pub distinct: bool,
}

impl Select {
    pub fn new(source: Source) -> Self {
        Self {
            projection: Vec::new(),
            source,
            filter: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            paging: Paging::default(),
            distinct: false,
        }
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection.push(projection);
        self
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: TableRef,
    pub assignments: Vec<Assignment>,
    /// Column whose engine-generated value the statement asks for
    pub generated: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub source: Source,
    pub assignments: Vec<Assignment>,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub source: Source,
    pub filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    pub table: TableRef,
    pub assignments: Vec<Assignment>,
    /// Conflict target columns
    pub keys: Vec<String>,
    /// Columns overwritten on conflict
    pub updates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub source: Source,
    pub group_by: Vec<Projection>,
    pub aggregates: Vec<Projection>,
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub paging: Paging,
}

impl Aggregate {
    /// The equivalent grouped SELECT.
    pub fn to_select(&self) -> Select {
        let mut projection = self.group_by.clone();
        projection.extend(self.aggregates.iter().cloned());
        Select {
            projection,
            source: self.source.clone(),
            filter: self.filter.clone(),
            group_by: self.group_by.iter().map(|p| p.expr.clone()).collect(),
            order_by: self.order_by.clone(),
            paging: self.paging,
            distinct: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exist {
    pub query: Select,
}

/// Raw statement text.
///
/// `{name}` in `text` marks the parameter of that name; `{{` and `}}` are
/// literal braces.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub text: String,
    pub parameters: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub spec: TypeSpec,
    pub required: bool,
    pub tag: bool,
    /// Engine-generated value (auto-increment / identity)
    pub identity: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub keys: Vec<String>,
    pub if_not_exists: bool,
}

/// A statement of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    TableDefinition(TableDefinition),
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Upsert(Upsert),
    Aggregate(Aggregate),
    Exist(Exist),
    Execution(Execution),
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::TableDefinition(_) => StatementKind::TableDefinition,
            Statement::Select(_) => StatementKind::Select,
            Statement::Insert(_) => StatementKind::Insert,
            Statement::Update(_) => StatementKind::Update,
            Statement::Delete(_) => StatementKind::Delete,
            Statement::Upsert(_) => StatementKind::Upsert,
            Statement::Aggregate(_) => StatementKind::Aggregate,
            Statement::Exist(_) => StatementKind::Exist,
            Statement::Execution(_) => StatementKind::Execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlweave_core::Value;

    #[test]
    fn test_aggregate_to_select_projects_groups_first() {
        let t0 = TableId(0);
        let aggregate = Aggregate {
            source: Source::new(TableRef::named("orders", t0)),
            group_by: vec![Projection::new(Expr::field(t0, "CustomerId"))],
            aggregates: vec![
                Projection::new(Expr::Method(MethodCall::aggregate(
                    AggregateFunction::Sum,
                    Expr::field(t0, "Total"),
                )))
                .alias("Total"),
            ],
            filter: Some(Expr::field(t0, "Total").eq(Expr::Constant(Value::Int(0)))),
            order_by: Vec::new(),
            paging: Paging::limit(5),
        };
        let select = aggregate.to_select();
        assert_eq!(select.projection.len(), 2);
        assert_eq!(select.projection[0].expr, Expr::field(t0, "CustomerId"));
        assert_eq!(select.group_by, vec![Expr::field(t0, "CustomerId")]);
        assert_eq!(select.paging.limit, Some(5));
    }

    #[test]
    fn test_statement_kind() {
        let select = Statement::Select(Select::new(Source::new(TableRef::named(
            "orders",
            TableId(0),
        ))));
        assert_eq!(select.kind(), StatementKind::Select);
        assert_eq!(StatementKind::ALL.len(), 9);
        assert_eq!(StatementKind::TableDefinition.to_string(), "table definition");
    }
}
