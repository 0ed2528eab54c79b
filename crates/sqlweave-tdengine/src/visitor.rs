//! TDengine statement shapes.
//!
//! A supertable holds data columns plus tag columns; rows live in
//! sub-tables that are created on first insert from the supertable and a
//! set of tag values:
//!
//! ```sql
//! INSERT INTO {subtable} USING `meters` (`location`) TAGS (?) (`ts`, `current`) VALUES (?, ?)
//! ```
//!
//! The sub-table name is left as a slot; callers bind it per tag group.
//! There is no in-place UPDATE, no multi-table DELETE and no EXISTS
//! sub-select.

use std::sync::Arc;

use sqlweave_core::{Error, Result, Value};
use sqlweave_query::import::SUBTABLE_SLOT;
use sqlweave_query::ir::{
    Assignment, ColumnDef, Expr, Paging, Projection, Select, Statement, StatementKind, TableRef,
};
use sqlweave_query::visitor::kind_mismatch;
use sqlweave_query::{ExpressionVisitor, RenderContext, StatementVisitor, Visitor};

use crate::dialect::{NAME, TdengineDialect};
use crate::types::TsdbType;

fn write_insert(
    visitor: &Visitor,
    table: &TableRef,
    assignments: &[Assignment],
    cx: &mut RenderContext,
) -> Result<()> {
    let (tags, data): (Vec<Assignment>, Vec<Assignment>) =
        assignments.iter().cloned().partition(|a| a.tag);
    cx.write("INSERT INTO ");
    if tags.is_empty() {
        visitor.write_table_name(table, cx);
        cx.write(" ");
        return visitor.write_values(&data, cx);
    }

    let dialect = visitor.dialect();
    cx.write_slot(SUBTABLE_SLOT);
    cx.write(" USING ");
    visitor.write_table_name(table, cx);
    let columns: Vec<String> = tags.iter().map(|t| dialect.identifier(&t.column)).collect();
    cx.write(" (");
    cx.write(&columns.join(", "));
    cx.write(") TAGS (");
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            cx.write(", ");
        }
        visitor.visit_value(&tag.value, cx)?;
    }
    cx.write(")");
    if data.is_empty() {
        return Ok(());
    }
    cx.write(" ");
    visitor.write_values(&data, cx)
}

/// Supertable-aware INSERT.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdengineInsertVisitor;

impl StatementVisitor for TdengineInsertVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let Statement::Insert(insert) = statement else {
            return Err(kind_mismatch(StatementKind::Insert, statement));
        };
        write_insert(visitor, &insert.table, &insert.assignments, cx)
    }
}

/// Upsert as a plain insert: a row with an existing timestamp replaces the
/// stored one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdengineUpsertVisitor;

impl StatementVisitor for TdengineUpsertVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let Statement::Upsert(upsert) = statement else {
            return Err(kind_mismatch(StatementKind::Upsert, statement));
        };
        write_insert(visitor, &upsert.table, &upsert.assignments, cx)
    }
}

/// `DELETE FROM t WHERE ...` with unqualified columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdengineDeleteVisitor;

impl StatementVisitor for TdengineDeleteVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let Statement::Delete(delete) = statement else {
            return Err(kind_mismatch(StatementKind::Delete, statement));
        };
        if !delete.source.joins.is_empty() {
            return Err(Error::unsupported(NAME, "joined DELETE"));
        }
        let outer = cx.bare_columns();
        cx.set_bare_columns(true);
        cx.write("DELETE FROM ");
        visitor.write_table(&delete.source.table, cx);
        let result = visitor.write_where(delete.filter.as_ref(), cx);
        cx.set_bare_columns(outer);
        result
    }
}

/// `SELECT 1 FROM ... LIMIT 1`; a returned row means the match exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdengineExistVisitor;

impl StatementVisitor for TdengineExistVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let Statement::Exist(exist) = statement else {
            return Err(kind_mismatch(StatementKind::Exist, statement));
        };
        let check = Select {
            projection: vec![Projection::new(Expr::Constant(Value::Int(1)))],
            order_by: Vec::new(),
            paging: Paging::limit(1),
            ..exist.query.clone()
        };
        visitor.write_select(&check, cx)
    }
}

/// `CREATE STABLE t (data...) TAGS (tags...)`, or `CREATE TABLE` without
/// tag columns.
///
/// The first data column must be the timestamp; TDengine has no NOT NULL
/// or PRIMARY KEY clauses.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdengineTableDefinitionVisitor;

impl StatementVisitor for TdengineTableDefinitionVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let Statement::TableDefinition(definition) = statement else {
            return Err(kind_mismatch(StatementKind::TableDefinition, statement));
        };
        let dialect = visitor.dialect();
        let (tags, data): (Vec<&ColumnDef>, Vec<&ColumnDef>) =
            definition.columns.iter().partition(|c| c.tag);
        match data.first() {
            Some(first) if TsdbType::of(first.spec.data_type) == Some(TsdbType::Timestamp) => {}
            _ => {
                return Err(Error::unsupported(
                    NAME,
                    format!("table '{}' whose first column is not a timestamp", definition.table),
                ));
            }
        }

        let render = |columns: &[&ColumnDef]| -> Result<String> {
            let items = columns
                .iter()
                .map(|c| {
                    Ok(format!(
                        "{} {}",
                        dialect.identifier(&c.name),
                        dialect.data_type(&c.spec)?
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(items.join(", "))
        };

        cx.write(if tags.is_empty() { "CREATE TABLE " } else { "CREATE STABLE " });
        if definition.if_not_exists {
            cx.write("IF NOT EXISTS ");
        }
        cx.write(&dialect.identifier(&definition.table));
        cx.write(" (");
        cx.write(&render(&data)?);
        cx.write(")");
        if !tags.is_empty() {
            cx.write(" TAGS (");
            cx.write(&render(&tags)?);
            cx.write(")");
        }
        Ok(())
    }
}

/// TDengine has no correlated sub-selects.
#[derive(Debug, Clone, Copy, Default)]
pub struct TdengineExpressions;

impl ExpressionVisitor for TdengineExpressions {
    fn visit_exists(
        &self,
        _visitor: &Visitor,
        _query: &Select,
        negated: bool,
        _cx: &mut RenderContext,
    ) -> Result<()> {
        Err(Error::unsupported(
            NAME,
            if negated { "NOT EXISTS sub-select" } else { "EXISTS sub-select" },
        ))
    }
}

/// The generic matrix with TDengine's kinds swapped in and UPDATE removed.
pub fn tdengine_visitor() -> Visitor {
    Visitor::new(Arc::new(TdengineDialect))
        .with_statement(StatementKind::Insert, Arc::new(TdengineInsertVisitor))
        .with_statement(StatementKind::Upsert, Arc::new(TdengineUpsertVisitor))
        .with_statement(StatementKind::Delete, Arc::new(TdengineDeleteVisitor))
        .with_statement(StatementKind::Exist, Arc::new(TdengineExistVisitor))
        .with_statement(
            StatementKind::TableDefinition,
            Arc::new(TdengineTableDefinitionVisitor),
        )
        .without_statement(StatementKind::Update)
        .with_expressions(Arc::new(TdengineExpressions))
}
