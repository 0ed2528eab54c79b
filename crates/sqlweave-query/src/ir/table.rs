//! Table sources, joins, ordering and paging.

use std::fmt;

use super::expr::Expr;

/// Identity of one table occurrence inside a statement.
///
/// Rendered as the alias `t{n}`; the builder allocates ids in walk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Where a table's name comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableName {
    /// Physical table name
    Named(String),
    /// Placeholder filled after rendering (e.g. a TDengine sub-table)
    Slot(String),
}

/// A table occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: TableName,
    pub id: TableId,
}

impl TableRef {
    pub fn named(name: impl Into<String>, id: TableId) -> Self {
        Self {
            name: TableName::Named(name.into()),
            id,
        }
    }

    pub fn slot(name: impl Into<String>, id: TableId) -> Self {
        Self {
            name: TableName::Slot(name.into()),
            id,
        }
    }

    /// The physical name, if not a slot.
    pub fn table_name(&self) -> Option<&str> {
        match &self.name {
            TableName::Named(n) => Some(n),
            TableName::Slot(_) => None,
        }
    }
}

/// Types of SQL joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }

    pub const fn is_outer(&self) -> bool {
        !matches!(self, JoinKind::Inner)
    }
}

/// A JOIN clause: target table and ON condition.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Expr,
}

impl JoinClause {
    /// Create an INNER JOIN.
    pub fn inner(table: TableRef, on: Expr) -> Self {
        Self {
            kind: JoinKind::Inner,
            table,
            on,
        }
    }

    /// Create a LEFT JOIN.
    pub fn left(table: TableRef, on: Expr) -> Self {
        Self {
            kind: JoinKind::Left,
            table,
            on,
        }
    }
}

/// Root table plus its joins.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub table: TableRef,
    pub joins: Vec<JoinClause>,
}

impl Source {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            joins: Vec::new(),
        }
    }

    pub fn join(mut self, join: JoinClause) -> Self {
        self.joins.push(join);
        self
    }

    pub fn has_outer_joins(&self) -> bool {
        self.joins.iter().any(|j| j.kind.is_outer())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order by clause.
    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Desc,
        }
    }
}

/// LIMIT / OFFSET pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Paging {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Paging {
    pub fn limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }
}
