//! Generic per-kind statement visitors.
//!
//! These spell each kind in the form Postgres and standard SQL share:
//! `UPDATE ... FROM`, `DELETE ... USING`, `ON CONFLICT ... DO UPDATE`.
//! Drivers replace individual kinds where their engine differs.

use sqlweave_core::{DataArgumentError, Error, Result};

use super::{RenderContext, StatementVisitor, Visitor, kind_mismatch};
use crate::ir::{Expr, JoinClause, Source, Statement, StatementKind};
use crate::script::GeneratedValue;

macro_rules! expect_kind {
    ($statement:expr, $variant:ident) => {
        match $statement {
            Statement::$variant(inner) => inner,
            other => return Err(kind_mismatch(StatementKind::$variant, other)),
        }
    };
}

/// Inner-join conditions conjoined after the statement's own filter.
pub fn hoisted_filter(filter: Option<&Expr>, joins: &[JoinClause]) -> Option<Expr> {
    let mut parts: Vec<Expr> = filter.cloned().into_iter().collect();
    parts.extend(joins.iter().map(|j| j.on.clone()));
    if parts.is_empty() {
        None
    } else {
        Some(Expr::all(parts))
    }
}

fn reject_outer_joins(visitor: &Visitor, source: &Source, kind: StatementKind) -> Result<()> {
    if source.has_outer_joins() {
        return Err(Error::unsupported(
            visitor.dialect().name(),
            format!("outer join in {}", kind),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectVisitor;

impl StatementVisitor for SelectVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let select = expect_kind!(statement, Select);
        visitor.write_select(select, cx)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateVisitor;

impl StatementVisitor for AggregateVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let aggregate = expect_kind!(statement, Aggregate);
        visitor.write_select(&aggregate.to_select(), cx)
    }
}

/// `SELECT EXISTS (<select>)`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExistVisitor;

impl StatementVisitor for ExistVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let exist = expect_kind!(statement, Exist);
        cx.write("SELECT EXISTS (");
        visitor.write_select(&exist.query, cx)?;
        cx.write(")");
        Ok(())
    }
}

/// `INSERT INTO t (...) VALUES (...) [RETURNING c]`
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertVisitor;

impl StatementVisitor for InsertVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let insert = expect_kind!(statement, Insert);
        cx.write("INSERT INTO ");
        visitor.write_table_name(&insert.table, cx);
        if insert.assignments.is_empty() {
            cx.write(" DEFAULT VALUES");
        } else {
            cx.write(" ");
            visitor.write_values(&insert.assignments, cx)?;
        }
        if let Some(column) = &insert.generated {
            match visitor.dialect().generated_value(column) {
                Some(GeneratedValue::Returning { column }) => {
                    cx.write(" RETURNING ");
                    cx.write(&visitor.dialect().identifier(&column));
                    cx.set_generated(GeneratedValue::Returning { column });
                }
                Some(follow_up) => cx.set_generated(follow_up),
                None => {}
            }
        }
        Ok(())
    }
}

/// `UPDATE t AS t0 SET c = v [FROM t1, ...] [WHERE filter AND join...]`
///
/// Joined tables move to FROM and their conditions to WHERE, which only
/// preserves inner-join semantics; outer joins are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateVisitor;

impl StatementVisitor for UpdateVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let update = expect_kind!(statement, Update);
        reject_outer_joins(visitor, &update.source, StatementKind::Update)?;
        cx.write("UPDATE ");
        visitor.write_table(&update.source.table, cx);
        cx.write(" SET ");
        visitor.write_assignments(&update.assignments, None, cx)?;
        for (i, join) in update.source.joins.iter().enumerate() {
            cx.write(if i == 0 { " FROM " } else { ", " });
            visitor.write_table(&join.table, cx);
        }
        let filter = hoisted_filter(update.filter.as_ref(), &update.source.joins);
        visitor.write_where(filter.as_ref(), cx)
    }
}

/// `DELETE FROM t AS t0 [USING t1, ...] [WHERE filter AND join...]`
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteVisitor;

impl StatementVisitor for DeleteVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let delete = expect_kind!(statement, Delete);
        reject_outer_joins(visitor, &delete.source, StatementKind::Delete)?;
        cx.write("DELETE FROM ");
        visitor.write_table(&delete.source.table, cx);
        for (i, join) in delete.source.joins.iter().enumerate() {
            cx.write(if i == 0 { " USING " } else { ", " });
            visitor.write_table(&join.table, cx);
        }
        let filter = hoisted_filter(delete.filter.as_ref(), &delete.source.joins);
        visitor.write_where(filter.as_ref(), cx)
    }
}

/// `INSERT ... ON CONFLICT (keys) DO UPDATE SET c = EXCLUDED.c`
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertVisitor;

impl StatementVisitor for UpsertVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let upsert = expect_kind!(statement, Upsert);
        let dialect = visitor.dialect();
        if upsert.keys.is_empty() {
            return Err(Error::unsupported(dialect.name(), "upsert without conflict keys"));
        }
        cx.write("INSERT INTO ");
        visitor.write_table_name(&upsert.table, cx);
        cx.write(" ");
        visitor.write_values(&upsert.assignments, cx)?;
        cx.write(" ON CONFLICT (");
        let keys: Vec<String> = upsert.keys.iter().map(|k| dialect.identifier(k)).collect();
        cx.write(&keys.join(", "));
        cx.write(")");
        if upsert.updates.is_empty() {
            cx.write(" DO NOTHING");
            return Ok(());
        }
        cx.write(" DO UPDATE SET ");
        let sets: Vec<String> = upsert
            .updates
            .iter()
            .map(|c| {
                let column = dialect.identifier(c);
                format!("{} = EXCLUDED.{}", column, column)
            })
            .collect();
        cx.write(&sets.join(", "));
        Ok(())
    }
}

/// Raw text with `{name}` parameter markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionVisitor;

fn bad_execution(field: Option<String>, message: String) -> Error {
    Error::DataArgument(DataArgumentError {
        field,
        message,
        code: None,
    })
}

impl StatementVisitor for ExecutionVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let execution = expect_kind!(statement, Execution);
        let mut chars = execution.text.chars().peekable();
        let mut text = String::new();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(n) => name.push(n),
                            None => {
                                return Err(bad_execution(
                                    None,
                                    format!("unterminated parameter marker '{{{}'", name),
                                ));
                            }
                        }
                    }
                    let param = execution
                        .parameters
                        .iter()
                        .find(|p| p.name == name)
                        .ok_or_else(|| {
                            bad_execution(
                                Some(name.clone()),
                                format!("no parameter named '{}'", name),
                            )
                        })?;
                    cx.write(&text);
                    text.clear();
                    visitor.visit_value(&Expr::Parameter(param.clone()), cx)?;
                }
                other => text.push(other),
            }
        }
        cx.write(&text);
        Ok(())
    }
}

/// `CREATE TABLE [IF NOT EXISTS] t (columns..., PRIMARY KEY (...))`
#[derive(Debug, Clone, Copy, Default)]
pub struct TableDefinitionVisitor;

impl StatementVisitor for TableDefinitionVisitor {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let definition = expect_kind!(statement, TableDefinition);
        let dialect = visitor.dialect();
        let mut items = Vec::with_capacity(definition.columns.len() + 1);
        for column in &definition.columns {
            let mut item = format!(
                "{} {}",
                dialect.identifier(&column.name),
                dialect.data_type(&column.spec)?
            );
            if column.required || column.identity {
                item.push_str(" NOT NULL");
            }
            if column.identity {
                if let Some(identity) = dialect.identity_clause() {
                    item.push(' ');
                    item.push_str(identity);
                }
            }
            items.push(item);
        }
        if !definition.keys.is_empty() {
            let keys: Vec<String> = definition.keys.iter().map(|k| dialect.identifier(k)).collect();
            items.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }
        cx.write("CREATE TABLE ");
        if definition.if_not_exists {
            cx.write("IF NOT EXISTS ");
        }
        cx.write(&dialect.identifier(&definition.table));
        cx.write(" (");
        cx.write(&items.join(", "));
        cx.write(")");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sqlweave_core::{DataType, Value};

    use super::*;
    use crate::dialect::AnsiDialect;
    use crate::ir::{
        Assignment, ColumnDef, Delete, Execution, Param, TableDefinition, TableId, TableRef,
        TypeSpec, Update, Upsert,
    };

    fn visitor() -> Visitor {
        Visitor::new(Arc::new(AnsiDialect))
    }

    fn int(name: &str, value: i64) -> Expr {
        Expr::Parameter(Param::input(
            name,
            TypeSpec::new(DataType::Int64),
            Value::BigInt(value),
        ))
    }

    fn joined_source() -> Source {
        let (t0, t1) = (TableId(0), TableId(1));
        Source::new(TableRef::named("orders", t0)).join(JoinClause::inner(
            TableRef::named("customers", t1),
            Expr::field(t0, "CustomerId").eq(Expr::field(t1, "Id")),
        ))
    }

    #[test]
    fn test_update_moves_joins_to_from_and_where() {
        let update = Update {
            source: joined_source(),
            assignments: vec![Assignment::new("Total", int("Total", 0))],
            filter: Some(Expr::field(TableId(1), "Id").eq(int("Id", 7))),
        };
        let script = visitor().render(&Statement::Update(update)).unwrap();
        assert_eq!(
            script.text(),
            "UPDATE \"orders\" AS \"t0\" SET \"Total\" = ? FROM \"customers\" AS \"t1\" \
             WHERE \"t1\".\"Id\" = ? AND \"t0\".\"CustomerId\" = \"t1\".\"Id\""
        );
        assert_eq!(script.parameters().len(), 2);
        assert_eq!(script.parameters()[0].name, "Total");
    }

    #[test]
    fn test_update_rejects_outer_join() {
        let mut source = joined_source();
        source.joins[0].kind = crate::ir::JoinKind::Left;
        let update = Update {
            source,
            assignments: vec![Assignment::new("Total", int("Total", 0))],
            filter: None,
        };
        let err = visitor().render(&Statement::Update(update)).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_delete_uses_using() {
        let delete = Delete {
            source: joined_source(),
            filter: None,
        };
        let script = visitor().render(&Statement::Delete(delete)).unwrap();
        assert_eq!(
            script.text(),
            "DELETE FROM \"orders\" AS \"t0\" USING \"customers\" AS \"t1\" \
             WHERE \"t0\".\"CustomerId\" = \"t1\".\"Id\""
        );
    }

    #[test]
    fn test_upsert_on_conflict() {
        let upsert = Upsert {
            table: TableRef::named("orders", TableId(0)),
            assignments: vec![
                Assignment::new("Id", int("Id", 1)),
                Assignment::new("Total", int("Total", 9)),
            ],
            keys: vec!["Id".to_string()],
            updates: vec!["Total".to_string()],
        };
        let script = visitor().render(&Statement::Upsert(upsert)).unwrap();
        assert_eq!(
            script.text(),
            "INSERT INTO \"orders\" (\"Id\", \"Total\") VALUES (?, ?) \
             ON CONFLICT (\"Id\") DO UPDATE SET \"Total\" = EXCLUDED.\"Total\""
        );
    }

    #[test]
    fn test_upsert_without_keys_is_unsupported() {
        let upsert = Upsert {
            table: TableRef::named("orders", TableId(0)),
            assignments: vec![Assignment::new("Total", int("Total", 9))],
            keys: Vec::new(),
            updates: Vec::new(),
        };
        let err = visitor().render(&Statement::Upsert(upsert)).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_execution_markers() {
        let execution = Execution {
            text: "SELECT {{1}} FROM x WHERE a = {a} AND b = {a}".to_string(),
            parameters: vec![Param::input("a", TypeSpec::new(DataType::Int32), Value::Int(4))],
        };
        let script = visitor().render(&Statement::Execution(execution)).unwrap();
        assert_eq!(script.text(), "SELECT {1} FROM x WHERE a = ? AND b = ?");
        assert_eq!(script.parameters().len(), 2);

        let missing = Execution {
            text: "SELECT {nope}".to_string(),
            parameters: Vec::new(),
        };
        let err = visitor().render(&Statement::Execution(missing)).unwrap_err();
        assert!(matches!(err, Error::DataArgument(ref a) if a.field.as_deref() == Some("nope")));
    }

    #[test]
    fn test_table_definition() {
        let definition = TableDefinition {
            table: "orders".to_string(),
            columns: vec![
                ColumnDef {
                    name: "Id".to_string(),
                    spec: TypeSpec::new(DataType::Int64),
                    required: false,
                    tag: false,
                    identity: true,
                },
                ColumnDef {
                    name: "Note".to_string(),
                    spec: TypeSpec::new(DataType::String).length(40),
                    required: false,
                    tag: false,
                    identity: false,
                },
            ],
            keys: vec!["Id".to_string()],
            if_not_exists: true,
        };
        let script = visitor()
            .render(&Statement::TableDefinition(definition))
            .unwrap();
        assert_eq!(
            script.text(),
            "CREATE TABLE IF NOT EXISTS \"orders\" (\"Id\" BIGINT NOT NULL, \
             \"Note\" VARCHAR(40), PRIMARY KEY (\"Id\"))"
        );
    }
}
