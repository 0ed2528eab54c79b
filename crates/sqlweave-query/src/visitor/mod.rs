//! The visitor engine.
//!
//! A [`Visitor`] binds a [`Dialect`] to a registry of per-kind
//! [`StatementVisitor`]s and one [`ExpressionVisitor`]. Drivers start from
//! the generic registry and replace the kinds their engine spells
//! differently; the expression hooks cover the remaining per-node
//! differences (parameters, EXISTS, method calls, conversions).
//!
//! Rendering is pure: the same statement always yields the same script.
//! Table aliases come from the statement's [`TableId`]s (`t0`, `t1`, ...)
//! and shell aliases from a per-render counter (`s0`, `s1`, ...).

mod statements;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use sqlweave_core::{Error, Result, Value};

pub use statements::{
    AggregateVisitor, DeleteVisitor, ExecutionVisitor, ExistVisitor, InsertVisitor,
    SelectVisitor, TableDefinitionVisitor, UpdateVisitor, UpsertVisitor, hoisted_filter,
};

use crate::dialect::{Dialect, Symbol};
use crate::ir::{
    Assignment, Expr, JoinClause, MethodCall, MethodKind, OrderBy, OrderDirection, Paging, Param,
    Select, Statement, StatementKind, TableId, TableName, TableRef, TypeSpec,
};
use crate::script::{BoundParameter, GeneratedValue, Script};

/// Renders one statement kind.
pub trait StatementVisitor: Send + Sync {
    fn visit(&self, visitor: &Visitor, statement: &Statement, cx: &mut RenderContext)
    -> Result<()>;
}

/// Per-node hooks shared by every statement kind.
pub trait ExpressionVisitor: Send + Sync {
    fn visit_parameter(
        &self,
        visitor: &Visitor,
        param: &Param,
        cx: &mut RenderContext,
    ) -> Result<()> {
        visitor.write_parameter(param, cx)
    }

    fn visit_exists(
        &self,
        visitor: &Visitor,
        query: &Select,
        negated: bool,
        cx: &mut RenderContext,
    ) -> Result<()> {
        visitor.write_exists(query, negated, cx)
    }

    fn visit_method(
        &self,
        visitor: &Visitor,
        call: &MethodCall,
        cx: &mut RenderContext,
    ) -> Result<()> {
        visitor.write_method(call, cx)
    }

    fn visit_convert(
        &self,
        visitor: &Visitor,
        expr: &Expr,
        target: &TypeSpec,
        cx: &mut RenderContext,
    ) -> Result<()> {
        cx.write("CAST(");
        visitor.visit_expr(expr, cx)?;
        cx.write(" AS ");
        cx.write(&visitor.dialect().convert_type(target)?);
        cx.write(")");
        Ok(())
    }
}

/// The generic hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExpressions;

impl ExpressionVisitor for DefaultExpressions {}

/// Mutable state of one render.
#[derive(Debug, Default)]
pub struct RenderContext {
    script: Script,
    kinds: Vec<StatementKind>,
    in_condition: bool,
    shells: u32,
    bare_columns: bool,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, text: &str) {
        self.script.push_text(text);
    }

    pub fn write_slot(&mut self, name: &str) {
        self.script.push_slot(name);
    }

    /// Register a parameter; returns its 1-based placeholder index.
    pub fn bind(&mut self, parameter: BoundParameter) -> usize {
        self.script.push_parameter(parameter)
    }

    pub fn set_generated(&mut self, generated: GeneratedValue) {
        self.script.set_generated(generated);
    }

    /// Kind of the outermost statement being rendered.
    pub fn root_kind(&self) -> Option<StatementKind> {
        self.kinds.first().copied()
    }

    pub fn current_kind(&self) -> Option<StatementKind> {
        self.kinds.last().copied()
    }

    /// True while rendering WHERE, ON or another predicate position.
    pub fn in_condition(&self) -> bool {
        self.in_condition
    }

    /// Next generated shell alias: `s0`, `s1`, ...
    pub fn next_shell_alias(&mut self) -> String {
        let alias = format!("s{}", self.shells);
        self.shells += 1;
        alias
    }

    /// Render fields without their table alias, and tables without one.
    pub fn set_bare_columns(&mut self, bare: bool) {
        self.bare_columns = bare;
    }

    pub fn bare_columns(&self) -> bool {
        self.bare_columns
    }

    fn into_script(self) -> Script {
        self.script
    }
}

/// Error for a statement handed to the wrong kind visitor.
pub fn kind_mismatch(expected: StatementKind, statement: &Statement) -> Error {
    Error::Custom(format!(
        "{} visitor cannot render a {} statement",
        expected,
        statement.kind()
    ))
}

/// Dialect plus statement and expression visitors.
#[derive(Clone)]
pub struct Visitor {
    dialect: Arc<dyn Dialect>,
    statements: BTreeMap<StatementKind, Arc<dyn StatementVisitor>>,
    expressions: Arc<dyn ExpressionVisitor>,
}

impl fmt::Debug for Visitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Visitor")
            .field("dialect", &self.dialect.name())
            .field("statements", &self.statements.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Visitor {
    /// Generic visitors for all nine kinds.
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        let mut statements: BTreeMap<StatementKind, Arc<dyn StatementVisitor>> = BTreeMap::new();
        statements.insert(StatementKind::TableDefinition, Arc::new(TableDefinitionVisitor));
        statements.insert(StatementKind::Select, Arc::new(SelectVisitor));
        statements.insert(StatementKind::Insert, Arc::new(InsertVisitor));
        statements.insert(StatementKind::Update, Arc::new(UpdateVisitor));
        statements.insert(StatementKind::Delete, Arc::new(DeleteVisitor));
        statements.insert(StatementKind::Upsert, Arc::new(UpsertVisitor));
        statements.insert(StatementKind::Aggregate, Arc::new(AggregateVisitor));
        statements.insert(StatementKind::Exist, Arc::new(ExistVisitor));
        statements.insert(StatementKind::Execution, Arc::new(ExecutionVisitor));
        Self {
            dialect,
            statements,
            expressions: Arc::new(DefaultExpressions),
        }
    }

    /// Replace the visitor for one kind.
    pub fn with_statement(mut self, kind: StatementKind, visitor: Arc<dyn StatementVisitor>) -> Self {
        self.statements.insert(kind, visitor);
        self
    }

    /// Remove a kind; rendering it fails with `Unsupported`.
    pub fn without_statement(mut self, kind: StatementKind) -> Self {
        self.statements.remove(&kind);
        self
    }

    pub fn with_expressions(mut self, expressions: Arc<dyn ExpressionVisitor>) -> Self {
        self.expressions = expressions;
        self
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn supports(&self, kind: StatementKind) -> bool {
        self.statements.contains_key(&kind)
    }

    /// Render a statement to text and bound parameters.
    #[tracing::instrument(level = "trace", skip(self, statement), fields(kind = %statement.kind(), dialect = self.dialect.name()))]
    pub fn render(&self, statement: &Statement) -> Result<Script> {
        let mut cx = RenderContext::new();
        self.visit_statement(statement, &mut cx)?;
        let script = cx.into_script();
        tracing::trace!(sql = %script.text(), parameters = script.parameters().len(), "Rendered statement");
        Ok(script)
    }

    /// Dispatch to the registered visitor for the statement's kind.
    pub fn visit_statement(&self, statement: &Statement, cx: &mut RenderContext) -> Result<()> {
        let kind = statement.kind();
        let visitor = self
            .statements
            .get(&kind)
            .ok_or_else(|| Error::unsupported(self.dialect.name(), kind.name()))?;
        cx.kinds.push(kind);
        let result = visitor.visit(self, statement, cx);
        cx.kinds.pop();
        result
    }

    /// Render an expression in a predicate position.
    pub fn visit_condition(&self, expr: &Expr, cx: &mut RenderContext) -> Result<()> {
        let outer = cx.in_condition;
        cx.in_condition = true;
        let result = self.visit_expr(expr, cx);
        cx.in_condition = outer;
        result
    }

    /// Render an expression outside a predicate position.
    pub fn visit_value(&self, expr: &Expr, cx: &mut RenderContext) -> Result<()> {
        let outer = cx.in_condition;
        cx.in_condition = false;
        let result = self.visit_expr(expr, cx);
        cx.in_condition = outer;
        result
    }

    pub fn visit_expr(&self, expr: &Expr, cx: &mut RenderContext) -> Result<()> {
        match expr {
            Expr::Field { table, column } => {
                self.write_field(*table, column, cx);
                Ok(())
            }
            Expr::Parameter(param) => self.expressions.visit_parameter(self, param, cx),
            Expr::Constant(value) => {
                self.write_value(value, cx);
                Ok(())
            }
            Expr::Star => {
                cx.write("*");
                Ok(())
            }
            Expr::Binary { left, op, right } => match self.dialect.symbol(*op) {
                Symbol::Infix(symbol) => {
                    self.write_operand(left, cx)?;
                    cx.write(" ");
                    cx.write(symbol);
                    cx.write(" ");
                    self.write_operand(right, cx)
                }
                Symbol::Function(name) => {
                    cx.write(name);
                    cx.write("(");
                    self.visit_expr(left, cx)?;
                    cx.write(", ");
                    self.visit_expr(right, cx)?;
                    cx.write(")");
                    Ok(())
                }
            },
            Expr::And(items) => self.write_junction(items, " AND ", "1 = 1", cx),
            Expr::Or(items) => self.write_junction(items, " OR ", "1 = 0", cx),
            Expr::Not(inner) => {
                cx.write("NOT (");
                self.visit_expr(inner, cx)?;
                cx.write(")");
                Ok(())
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                if list.is_empty() {
                    cx.write(if *negated { "1 = 1" } else { "1 = 0" });
                    return Ok(());
                }
                self.visit_expr(expr, cx)?;
                cx.write(if *negated { " NOT IN (" } else { " IN (" });
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        cx.write(", ");
                    }
                    self.visit_expr(item, cx)?;
                }
                cx.write(")");
                Ok(())
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                self.visit_expr(expr, cx)?;
                cx.write(if *negated { " NOT LIKE " } else { " LIKE " });
                self.visit_expr(pattern, cx)
            }
            Expr::IsNull { expr, negated } => {
                self.visit_expr(expr, cx)?;
                cx.write(if *negated { " IS NOT NULL" } else { " IS NULL" });
                Ok(())
            }
            Expr::Exists { query, negated } => {
                self.expressions.visit_exists(self, query, *negated, cx)
            }
            Expr::Method(call) => self.expressions.visit_method(self, call, cx),
            Expr::Convert { expr, target } => self.expressions.visit_convert(self, expr, target, cx),
            Expr::Slot(name) => {
                cx.write_slot(name);
                Ok(())
            }
        }
    }

    fn write_operand(&self, expr: &Expr, cx: &mut RenderContext) -> Result<()> {
        if matches!(expr, Expr::Binary { .. }) {
            cx.write("(");
            self.visit_expr(expr, cx)?;
            cx.write(")");
            Ok(())
        } else {
            self.visit_expr(expr, cx)
        }
    }

    fn write_junction(
        &self,
        items: &[Expr],
        separator: &str,
        empty: &str,
        cx: &mut RenderContext,
    ) -> Result<()> {
        if items.is_empty() {
            cx.write(empty);
            return Ok(());
        }
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                cx.write(separator);
            }
            if matches!(item, Expr::And(_) | Expr::Or(_)) {
                cx.write("(");
                self.visit_expr(item, cx)?;
                cx.write(")");
            } else {
                self.visit_expr(item, cx)?;
            }
        }
        Ok(())
    }

    /// `alias.column`, or the bare column when the context asks for it.
    pub fn write_field(&self, table: TableId, column: &str, cx: &mut RenderContext) {
        if !cx.bare_columns {
            cx.write(&self.dialect.alias(&table.to_string()));
            cx.write(".");
        }
        cx.write(&self.dialect.identifier(column));
    }

    /// Inline literal.
    pub fn write_value(&self, value: &Value, cx: &mut RenderContext) {
        let text = match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::TinyInt(_)
            | Value::SmallInt(_)
            | Value::Int(_)
            | Value::BigInt(_)
            | Value::Float(_)
            | Value::Double(_)
            | Value::Decimal(_) => value.to_plain_text().unwrap_or_else(|| "NULL".to_string()),
            Value::Text(text) => self.dialect.literal(text),
            other => match other.to_plain_text() {
                Some(text) => self.dialect.literal(&text),
                None => "NULL".to_string(),
            },
        };
        cx.write(&text);
    }

    /// Register a parameter and write its placeholder.
    pub fn write_parameter(&self, param: &Param, cx: &mut RenderContext) -> Result<()> {
        let index = cx.bind(BoundParameter {
            name: param.name.clone(),
            data_type: param.spec.data_type,
            native_type: self.dialect.native_type(&param.spec),
            value: param.value.clone(),
            source: param.source.clone(),
        });
        cx.write(&self.dialect.placeholder(index));
        Ok(())
    }

    /// `EXISTS (<select>)` / `NOT EXISTS (<select>)`.
    pub fn write_exists(&self, query: &Select, negated: bool, cx: &mut RenderContext) -> Result<()> {
        cx.write(if negated { "NOT EXISTS (" } else { "EXISTS (" });
        self.write_select(query, cx)?;
        cx.write(")");
        Ok(())
    }

    /// `NAME(args)` with the dialect's native name.
    pub fn write_method(&self, call: &MethodCall, cx: &mut RenderContext) -> Result<()> {
        let name = self.dialect.method_name(&call.kind)?;
        cx.write(&name);
        cx.write("(");
        if call.distinct {
            cx.write("DISTINCT ");
        }
        for (i, arg) in call.args.iter().enumerate() {
            if i > 0 {
                cx.write(", ");
            }
            match (&call.kind, arg) {
                (MethodKind::Sequence(_), Expr::Constant(Value::Text(sequence))) => {
                    cx.write(&self.dialect.literal(sequence));
                }
                _ => self.visit_expr(arg, cx)?,
            }
        }
        cx.write(")");
        Ok(())
    }

    /// Table name only.
    pub fn write_table_name(&self, table: &TableRef, cx: &mut RenderContext) {
        match &table.name {
            TableName::Named(name) => cx.write(&self.dialect.identifier(name)),
            TableName::Slot(slot) => cx.write_slot(slot),
        }
    }

    /// `name AS alias`, or the bare name when the context asks for it.
    pub fn write_table(&self, table: &TableRef, cx: &mut RenderContext) {
        self.write_table_name(table, cx);
        if !cx.bare_columns {
            cx.write(" AS ");
            cx.write(&self.dialect.alias(&table.id.to_string()));
        }
    }

    /// ` KIND JOIN table AS alias ON cond` for each join.
    pub fn write_joins(&self, joins: &[JoinClause], cx: &mut RenderContext) -> Result<()> {
        for join in joins {
            cx.write(" ");
            cx.write(join.kind.as_str());
            cx.write(" ");
            self.write_table(&join.table, cx);
            cx.write(" ON ");
            self.visit_condition(&join.on, cx)?;
        }
        Ok(())
    }

    /// ` WHERE cond` when a condition is present.
    pub fn write_where(&self, filter: Option<&Expr>, cx: &mut RenderContext) -> Result<()> {
        if let Some(filter) = filter {
            if filter.is_tautology() {
                return Ok(());
            }
            cx.write(" WHERE ");
            self.visit_condition(filter, cx)?;
        }
        Ok(())
    }

    pub fn write_order_by(&self, order_by: &[OrderBy], cx: &mut RenderContext) -> Result<()> {
        if order_by.is_empty() {
            return Ok(());
        }
        cx.write(" ORDER BY ");
        for (i, item) in order_by.iter().enumerate() {
            if i > 0 {
                cx.write(", ");
            }
            self.visit_value(&item.expr, cx)?;
            cx.write(match item.direction {
                OrderDirection::Asc => " ASC",
                OrderDirection::Desc => " DESC",
            });
        }
        Ok(())
    }

    pub fn write_paging(&self, paging: &Paging, cx: &mut RenderContext) {
        cx.write(&self.dialect.paging(paging));
    }

    /// `(c1, c2) VALUES (v1, v2)`.
    pub fn write_values(&self, assignments: &[Assignment], cx: &mut RenderContext) -> Result<()> {
        cx.write("(");
        for (i, assignment) in assignments.iter().enumerate() {
            if i > 0 {
                cx.write(", ");
            }
            cx.write(&self.dialect.identifier(&assignment.column));
        }
        cx.write(") VALUES (");
        for (i, assignment) in assignments.iter().enumerate() {
            if i > 0 {
                cx.write(", ");
            }
            self.visit_value(&assignment.value, cx)?;
        }
        cx.write(")");
        Ok(())
    }

    /// `c1 = v1, c2 = v2`, columns qualified with `table` when given.
    pub fn write_assignments(
        &self,
        assignments: &[Assignment],
        table: Option<TableId>,
        cx: &mut RenderContext,
    ) -> Result<()> {
        for (i, assignment) in assignments.iter().enumerate() {
            if i > 0 {
                cx.write(", ");
            }
            match table {
                Some(id) => self.write_field(id, &assignment.column, cx),
                None => cx.write(&self.dialect.identifier(&assignment.column)),
            }
            cx.write(" = ");
            self.visit_value(&assignment.value, cx)?;
        }
        Ok(())
    }

    /// A complete SELECT.
    ///
    /// Order: projection, table, joins, where, group by, order by, paging.
    pub fn write_select(&self, select: &Select, cx: &mut RenderContext) -> Result<()> {
        cx.write("SELECT ");
        if select.distinct {
            cx.write("DISTINCT ");
        }
        if select.projection.is_empty() {
            cx.write("*");
        }
        for (i, projection) in select.projection.iter().enumerate() {
            if i > 0 {
                cx.write(", ");
            }
            self.visit_value(&projection.expr, cx)?;
            if let Some(alias) = &projection.alias {
                cx.write(" AS ");
                cx.write(&self.dialect.alias(alias));
            }
        }
        cx.write(" FROM ");
        self.write_table(&select.source.table, cx);
        self.write_joins(&select.source.joins, cx)?;
        self.write_where(select.filter.as_ref(), cx)?;
        if !select.group_by.is_empty() {
            cx.write(" GROUP BY ");
            for (i, expr) in select.group_by.iter().enumerate() {
                if i > 0 {
                    cx.write(", ");
                }
                self.visit_value(expr, cx)?;
            }
        }
        self.write_order_by(&select.order_by, cx)?;
        self.write_paging(&select.paging, cx);
        Ok(())
    }
}
