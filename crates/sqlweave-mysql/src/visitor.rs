//! MySQL statement shapes and expression overrides.
//!
//! MySQL differs from the generic visitors in four places:
//!
//! - `UPDATE` names every joined table in its target clause and moves the
//!   inner-join conditions into `WHERE`;
//! - `DELETE` names its target alias before `FROM`;
//! - upserts are `ON DUPLICATE KEY UPDATE`;
//! - an `EXISTS` inside a data-modifying statement is wrapped in a derived
//!   table, since MySQL refuses a sub-select that reads the table being
//!   modified.

use std::sync::Arc;

use sqlweave_core::{Error, Result, Value};
use sqlweave_query::ir::{Expr, JoinKind, Param, Select, Statement, StatementKind, TypeSpec};
use sqlweave_query::visitor::{hoisted_filter, kind_mismatch};
use sqlweave_query::{ExpressionVisitor, RenderContext, StatementVisitor, Visitor};

use crate::config::MysqlOptions;
use crate::dialect::MysqlDialect;

/// `UPDATE t AS t0, t1 AS t1 SET t0.c = v WHERE filter AND join...`
///
/// With an outer join present, the whole source stays in join syntax so
/// the outer semantics survive.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlUpdateVisitor;

impl StatementVisitor for MysqlUpdateVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let Statement::Update(update) = statement else {
            return Err(kind_mismatch(StatementKind::Update, statement));
        };
        let source = &update.source;
        cx.write("UPDATE ");
        visitor.write_table(&source.table, cx);

        let filter = if source.has_outer_joins() {
            visitor.write_joins(&source.joins, cx)?;
            update.filter.clone()
        } else {
            for join in &source.joins {
                cx.write(", ");
                visitor.write_table(&join.table, cx);
            }
            if !source.joins.is_empty() {
                tracing::debug!(tables = source.joins.len() + 1, "Hoisted join conditions into multi-table update");
            }
            hoisted_filter(update.filter.as_ref(), &source.joins)
        };

        cx.write(" SET ");
        visitor.write_assignments(&update.assignments, Some(source.table.id), cx)?;
        visitor.write_where(filter.as_ref(), cx)
    }
}

/// `DELETE t0 FROM t AS t0 [JOIN ...] [WHERE filter]`
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDeleteVisitor;

impl StatementVisitor for MysqlDeleteVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let Statement::Delete(delete) = statement else {
            return Err(kind_mismatch(StatementKind::Delete, statement));
        };
        let dialect = visitor.dialect();
        cx.write("DELETE ");
        cx.write(&dialect.alias(&delete.source.table.id.to_string()));
        cx.write(" FROM ");
        visitor.write_table(&delete.source.table, cx);
        visitor.write_joins(&delete.source.joins, cx)?;
        visitor.write_where(delete.filter.as_ref(), cx)
    }
}

/// `INSERT ... ON DUPLICATE KEY UPDATE c = VALUES(c)`
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlUpsertVisitor;

impl StatementVisitor for MysqlUpsertVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let Statement::Upsert(upsert) = statement else {
            return Err(kind_mismatch(StatementKind::Upsert, statement));
        };
        let dialect = visitor.dialect();
        if upsert.keys.is_empty() {
            return Err(Error::unsupported(dialect.name(), "upsert without conflict keys"));
        }
        cx.write("INSERT INTO ");
        visitor.write_table_name(&upsert.table, cx);
        cx.write(" ");
        visitor.write_values(&upsert.assignments, cx)?;
        cx.write(" ON DUPLICATE KEY UPDATE ");
        // Nothing to overwrite: a self-assignment of the first key keeps
        // the existing row without turning other errors into warnings.
        let columns = if upsert.updates.is_empty() {
            &upsert.keys[..upsert.keys.len().min(1)]
        } else {
            &upsert.updates[..]
        };
        let sets: Vec<String> = columns
            .iter()
            .map(|c| {
                let column = dialect.identifier(c);
                if upsert.updates.is_empty() {
                    format!("{} = {}", column, column)
                } else {
                    format!("{} = VALUES({})", column, column)
                }
            })
            .collect();
        cx.write(&sets.join(", "));
        Ok(())
    }
}

/// Parameter collation, EXISTS shell and `CONVERT`.
#[derive(Debug, Clone, Default)]
pub struct MysqlExpressions {
    collation: Option<String>,
}

impl MysqlExpressions {
    pub fn new(collation: Option<String>) -> Self {
        Self { collation }
    }
}

/// Whether a parameter needs an explicit collation.
///
/// Only ANSI-typed parameters carrying non-ASCII text inside a predicate
/// qualify; everywhere else the column's own collation applies.
fn needs_collation(param: &Param, cx: &RenderContext) -> bool {
    cx.in_condition() && param.spec.data_type.is_ansi() && param.value.has_non_ascii_text()
}

impl ExpressionVisitor for MysqlExpressions {
    fn visit_parameter(&self, visitor: &Visitor, param: &Param, cx: &mut RenderContext) -> Result<()> {
        visitor.write_parameter(param, cx)?;
        if let Some(collation) = &self.collation {
            if needs_collation(param, cx) {
                cx.write(" COLLATE ");
                cx.write(collation);
            }
        }
        Ok(())
    }

    fn visit_exists(
        &self,
        visitor: &Visitor,
        query: &Select,
        negated: bool,
        cx: &mut RenderContext,
    ) -> Result<()> {
        let reads_only = matches!(
            cx.root_kind(),
            None | Some(StatementKind::Select | StatementKind::Aggregate | StatementKind::Exist)
        );
        if reads_only {
            return visitor.write_exists(query, negated, cx);
        }
        let alias = cx.next_shell_alias();
        tracing::trace!(shell = %alias, "Wrapped EXISTS in derived table");
        cx.write(if negated { "NOT EXISTS (SELECT * FROM (" } else { "EXISTS (SELECT * FROM (" });
        visitor.write_select(query, cx)?;
        cx.write(") AS ");
        cx.write(&visitor.dialect().alias(&alias));
        cx.write(")");
        Ok(())
    }

    fn visit_convert(
        &self,
        visitor: &Visitor,
        expr: &Expr,
        target: &TypeSpec,
        cx: &mut RenderContext,
    ) -> Result<()> {
        cx.write("CONVERT(");
        visitor.visit_expr(expr, cx)?;
        cx.write(", ");
        cx.write(&visitor.dialect().convert_type(target)?);
        cx.write(")");
        Ok(())
    }
}

/// The MySQL visitor matrix.
pub fn mysql_visitor(options: &MysqlOptions) -> Visitor {
    Visitor::new(Arc::new(MysqlDialect))
        .with_statement(StatementKind::Update, Arc::new(MysqlUpdateVisitor))
        .with_statement(StatementKind::Delete, Arc::new(MysqlDeleteVisitor))
        .with_statement(StatementKind::Upsert, Arc::new(MysqlUpsertVisitor))
        .with_expressions(Arc::new(MysqlExpressions::new(
            options.condition_collation.clone(),
        )))
}
