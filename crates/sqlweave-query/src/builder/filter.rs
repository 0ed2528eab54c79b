//! The logical filter language and its compilation to IR conditions.

use sqlweave_core::{
    DataArgumentError, EntityKey, EntitySet, Error, Hop, MetadataErrorKind, Property,
    PropertyPath, Result, SimplexProperty, Value,
};

use crate::ir::{
    BinaryOp, Expr, JoinClause, JoinKind, Param, Projection, Select, Source, TableId, TableRef,
    TypeSpec,
};

/// Comparison operators of the filter language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    const fn binary(self) -> BinaryOp {
        match self {
            CompareOp::Eq => BinaryOp::Eq,
            CompareOp::Ne => BinaryOp::Ne,
            CompareOp::Lt => BinaryOp::Lt,
            CompareOp::Le => BinaryOp::Le,
            CompareOp::Gt => BinaryOp::Gt,
            CompareOp::Ge => BinaryOp::Ge,
        }
    }
}

/// A condition over property paths of one entity.
///
/// Paths are dotted and resolved against the metadata set at build time.
/// Navigations through `One` properties become joins; navigations through
/// `Many` properties are only allowed as the path of [`Filter::any`] or
/// [`Filter::none`], whose nested filter is relative to the target entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        path: String,
        op: CompareOp,
        value: Value,
    },
    Like {
        path: String,
        pattern: String,
    },
    In {
        path: String,
        values: Vec<Value>,
    },
    IsNull {
        path: String,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Related rows exist (or, negated, do not)
    Exists {
        path: String,
        filter: Option<Box<Filter>>,
        negated: bool,
    },
}

impl Filter {
    fn compare(path: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Filter::Compare {
            path: path.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Eq, value)
    }

    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Ne, value)
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Lt, value)
    }

    pub fn le(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Le, value)
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Gt, value)
    }

    pub fn ge(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Ge, value)
    }

    pub fn like(path: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Like {
            path: path.into(),
            pattern: pattern.into(),
        }
    }

    pub fn in_list<V: Into<Value>>(path: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In {
            path: path.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(path: impl Into<String>) -> Self {
        Filter::IsNull { path: path.into() }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Some related row through `path` matches `filter`.
    pub fn any(path: impl Into<String>, filter: Option<Filter>) -> Self {
        Filter::Exists {
            path: path.into(),
            filter: filter.map(Box::new),
            negated: false,
        }
    }

    /// No related row through `path` matches `filter`.
    pub fn none(path: impl Into<String>, filter: Option<Filter>) -> Self {
        Filter::Exists {
            path: path.into(),
            filter: filter.map(Box::new),
            negated: true,
        }
    }
}

/// Allocates table ids in walk order.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    next: u32,
}

impl Tables {
    pub(crate) fn alloc(&mut self) -> TableId {
        let id = TableId(self.next);
        self.next += 1;
        id
    }
}

/// One SELECT level: its entity, root table and accumulated joins.
#[derive(Debug)]
pub(crate) struct Scope {
    pub(crate) entity: EntityKey,
    pub(crate) table: TableId,
    pub(crate) joins: Vec<JoinClause>,
    /// Path prefix -> joined table
    index: Vec<(String, TableId)>,
}

impl Scope {
    pub(crate) fn new(entity: EntityKey, table: TableId) -> Self {
        Self {
            entity,
            table,
            joins: Vec::new(),
            index: Vec::new(),
        }
    }

    /// Join every hop once and return the table of the last far entity.
    ///
    /// A hop first joined LEFT becomes INNER once a top-level filter
    /// conjunct needs it; a hop already INNER stays INNER.
    pub(crate) fn join_hops(
        &mut self,
        set: &EntitySet,
        tables: &mut Tables,
        hops: &[Hop],
        kind: JoinKind,
    ) -> Result<TableId> {
        let mut current = self.table;
        let mut prefix = String::new();
        for hop in hops {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(&hop.property.name);

            if let Some((_, id)) = self.index.iter().find(|(p, _)| p.eq_ignore_ascii_case(&prefix)) {
                let id = *id;
                if kind == JoinKind::Inner {
                    if let Some(join) = self.joins.iter_mut().find(|j| j.table.id == id) {
                        join.kind = JoinKind::Inner;
                    }
                }
                current = id;
                continue;
            }

            let id = tables.alloc();
            self.joins.push(JoinClause {
                kind,
                table: TableRef::named(table_name(set, &hop.join.far)?, id),
                on: join_condition(hop, current, id),
            });
            self.index.push((prefix.clone(), id));
            current = id;
        }
        Ok(current)
    }
}

pub(crate) fn table_name(set: &EntitySet, key: &EntityKey) -> Result<String> {
    set.entity(key)
        .map(|e| e.table_name())
        .ok_or_else(|| unknown_entity(key))
}

pub(crate) fn unknown_entity(key: &EntityKey) -> Error {
    Error::metadata(
        MetadataErrorKind::UnknownMember,
        Some(key.to_string()),
        None,
        format!("unknown entity '{}'", key),
    )
}

fn join_condition(hop: &Hop, near: TableId, far: TableId) -> Expr {
    Expr::all(
        hop.join
            .columns
            .iter()
            .map(|(n, f)| Expr::field(near, n.clone()).eq(Expr::field(far, f.clone()))),
    )
}

/// The simplex property a path ends in.
pub(crate) fn simplex_of<'p>(path: &'p PropertyPath, text: &str) -> Result<&'p SimplexProperty> {
    match &path.property {
        Property::Simplex(s) => Ok(s),
        Property::Complex(_) => Err(Error::metadata(
            MetadataErrorKind::UnknownMember,
            Some(path.root.to_string()),
            Some(text.to_string()),
            format!("'{}' of '{}' is a navigation, not a column", text, path.root),
        )),
    }
}

/// Reject navigation through `Many` outside any/none.
pub(crate) fn single_valued(driver: &'static str, path: &PropertyPath, text: &str) -> Result<()> {
    if path.crosses_many() {
        return Err(Error::unsupported(
            driver,
            format!(
                "path '{}' crosses a collection; use any/none to filter through it",
                text
            ),
        ));
    }
    Ok(())
}

/// Coerce a filter or assignment value to a property's type.
pub(crate) fn typed_value(property: &SimplexProperty, value: &Value) -> Result<Value> {
    value.clone().coerce(property.data_type).map_err(|e| match e {
        Error::Type(t) => Error::DataArgument(DataArgumentError {
            field: Some(property.name.clone()),
            message: format!(
                "value for '{}' does not fit {}: expected {}, got {}",
                property.name,
                property.data_type.name(),
                t.expected,
                t.actual
            ),
            code: None,
        }),
        other => other,
    })
}

/// How a path with hops is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinMode {
    /// Joined into the current scope
    Join,
    /// Joined when required by a top-level conjunct, correlated otherwise
    JoinConjuncts,
    /// Wrapped in a correlated EXISTS against the current scope's table
    Correlated,
}

/// Compiles [`Filter`]s into IR conditions.
pub(crate) struct FilterCompiler<'a> {
    pub(crate) set: &'a EntitySet,
    pub(crate) tables: &'a mut Tables,
    pub(crate) mode: JoinMode,
    pub(crate) driver: &'static str,
}

impl FilterCompiler<'_> {
    pub(crate) fn compile(&mut self, scope: &mut Scope, filter: &Filter) -> Result<Expr> {
        self.compile_under(scope, filter, JoinKind::Inner)
    }

    /// Compile `filter`, joining navigations with `kind`.
    ///
    /// Only top-level conjuncts may drop rows without a navigation target,
    /// so everything under `Or` or `Not` joins LEFT.
    fn compile_under(&mut self, scope: &mut Scope, filter: &Filter, kind: JoinKind) -> Result<Expr> {
        match filter {
            Filter::Compare { path, op, value } => self.leaf(scope, path, kind, |field, property| {
                let value = typed_value(property, value)?;
                Ok(Expr::binary(field, op.binary(), parameter(path, property, value)))
            }),
            Filter::Like { path, pattern } => self.leaf(scope, path, kind, |field, property| {
                Ok(Expr::Like {
                    expr: Box::new(field),
                    pattern: Box::new(parameter(path, property, Value::Text(pattern.clone()))),
                    negated: false,
                })
            }),
            Filter::In { path, values } => self.leaf(scope, path, kind, |field, property| {
                let list = values
                    .iter()
                    .map(|v| Ok(parameter(path, property, typed_value(property, v)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expr::In {
                    expr: Box::new(field),
                    list,
                    negated: false,
                })
            }),
            Filter::IsNull { path } => self.leaf(scope, path, kind, |field, _| {
                Ok(Expr::IsNull {
                    expr: Box::new(field),
                    negated: false,
                })
            }),
            Filter::And(items) => Ok(Expr::all(
                items
                    .iter()
                    .map(|f| self.compile_under(scope, f, kind))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Filter::Or(items) => Ok(Expr::Or(
                items
                    .iter()
                    .map(|f| self.compile_under(scope, f, JoinKind::Left))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Filter::Not(inner) => Ok(self.compile_under(scope, inner, JoinKind::Left)?.not()),
            Filter::Exists {
                path,
                filter,
                negated,
            } => self.exists(scope, path, filter.as_deref(), *negated),
        }
    }

    fn leaf(
        &mut self,
        scope: &mut Scope,
        text: &str,
        kind: JoinKind,
        build: impl FnOnce(Expr, &SimplexProperty) -> Result<Expr>,
    ) -> Result<Expr> {
        let path = self.set.find(&scope.entity, text)?;
        single_valued(self.driver, &path, text)?;
        let property = simplex_of(&path, text)?;

        let joined = match self.mode {
            JoinMode::Join => true,
            JoinMode::JoinConjuncts => kind == JoinKind::Inner,
            JoinMode::Correlated => false,
        };
        if path.hops.is_empty() || joined {
            let table = scope.join_hops(self.set, self.tables, &path.hops, kind)?;
            return build(Expr::field(table, property.column.clone()), property);
        }

        // Correlated: the hops live in a sub-select tied to the outer row.
        let (mut sub, correlation) = self.sub_scope(scope, &path.hops)?;
        let table = sub.table;
        let condition = build(Expr::field(table, property.column.clone()), property)?;
        let root = sub.joins.remove(0);
        Ok(Expr::Exists {
            query: Box::new(sub_select(root.table, sub.joins, Expr::all([correlation, condition]))),
            negated: false,
        })
    }

    /// A sub-select scope over `hops`, rooted at the first hop's far table.
    ///
    /// Returns the scope (whose first join entry is the sub-select's root,
    /// to be removed by the caller) and the correlation condition.
    fn sub_scope(&mut self, outer: &Scope, hops: &[Hop]) -> Result<(Scope, Expr)> {
        let mut ids = Vec::with_capacity(hops.len());
        let mut joins = Vec::with_capacity(hops.len());
        let mut correlation = Expr::all(Vec::new());
        let mut current = outer.table;
        for (i, hop) in hops.iter().enumerate() {
            let id = self.tables.alloc();
            let on = join_condition(hop, current, id);
            if i == 0 {
                correlation = on.clone();
            }
            joins.push(JoinClause::inner(
                TableRef::named(table_name(self.set, &hop.join.far)?, id),
                on,
            ));
            ids.push(id);
            current = id;
        }
        let last = hops.last().map(|h| h.join.far.clone()).ok_or_else(|| {
            Error::Custom("sub-select needs at least one navigation".to_string())
        })?;
        let mut scope = Scope::new(last, current);
        scope.joins = joins;
        Ok((scope, correlation))
    }

    fn exists(
        &mut self,
        scope: &mut Scope,
        text: &str,
        filter: Option<&Filter>,
        negated: bool,
    ) -> Result<Expr> {
        let path = self.set.find(&scope.entity, text)?;
        let Property::Complex(complex) = &path.property else {
            return Err(Error::metadata(
                MetadataErrorKind::UnknownMember,
                Some(scope.entity.to_string()),
                Some(text.to_string()),
                format!("'{}' of '{}' is not a navigation", text, scope.entity),
            ));
        };
        let mut hops = path.hops.clone();
        hops.push(Hop {
            entity: path.owner.clone(),
            property: complex.clone(),
            join: self.set.resolve_complex(&path.owner, &complex.name)?,
        });

        let (mut sub, correlation) = self.sub_scope(scope, &hops)?;
        let mut conditions = vec![correlation];
        if let Some(filter) = filter {
            let mut nested = FilterCompiler {
                set: self.set,
                tables: self.tables,
                mode: JoinMode::Join,
                driver: self.driver,
            };
            conditions.push(nested.compile(&mut sub, filter)?);
        }
        let root = sub.joins.remove(0);
        Ok(Expr::Exists {
            query: Box::new(sub_select(root.table, sub.joins, Expr::all(conditions))),
            negated,
        })
    }
}

fn parameter(name: &str, property: &SimplexProperty, value: Value) -> Expr {
    Expr::Parameter(Param::input(name, TypeSpec::of(property), value))
}

fn sub_select(table: TableRef, joins: Vec<JoinClause>, filter: Expr) -> Select {
    let mut select = Select::new(Source { table, joins })
        .project(Projection::new(Expr::Constant(Value::Int(1))));
    select.filter = Some(filter);
    select
}
