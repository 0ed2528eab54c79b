//! Statement builder: logical requests to statement IR.
//!
//! The builder consults the metadata set to resolve property paths into
//! joins, columns into typed parameters and sequences into generated or
//! pending values. Every metadata failure surfaces here, before any SQL is
//! rendered.
//!
//! Drivers compose [`CommonBuilder`], rejecting the kinds their engine has
//! no form for.

mod filter;
mod request;

pub use filter::{CompareOp, Filter};
pub use request::{
    AggregateItem, AggregateRequest, DeleteRequest, ExecutionRequest, ExistRequest,
    InsertRequest, Order, Request, SelectRequest, TableDefinitionRequest, UpdateRequest,
    UpsertRequest,
};

use std::collections::BTreeSet;
use std::sync::Arc;

use sqlweave_core::{
    DataArgumentError, Entity, EntityKey, EntitySet, Error, Property, Record, Result,
    SequenceKind, SimplexProperty, Value,
};

use crate::driver::Features;
use crate::ir::{
    Aggregate, Assignment, ColumnDef, Delete, Exist, Execution, Expr, Insert, JoinKind,
    MethodCall, OrderBy, Param, ParameterSource, Projection, Select, Source, Statement,
    StatementKind, TableDefinition, TableId, TableRef, TypeSpec, Update, Upsert,
};
use filter::{
    simplex_of, single_valued, typed_value, unknown_entity, FilterCompiler, JoinMode,
    Scope, Tables,
};

/// Builds statement IR, one method per kind.
pub trait StatementBuilder: Send + Sync {
    fn build_table_definition(
        &self,
        set: &EntitySet,
        request: &TableDefinitionRequest,
    ) -> Result<Statement>;

    fn build_select(&self, set: &EntitySet, request: &SelectRequest) -> Result<Statement>;

    fn build_insert(&self, set: &EntitySet, request: &InsertRequest) -> Result<Statement>;

    fn build_update(&self, set: &EntitySet, request: &UpdateRequest) -> Result<Statement>;

    fn build_delete(&self, set: &EntitySet, request: &DeleteRequest) -> Result<Statement>;

    fn build_upsert(&self, set: &EntitySet, request: &UpsertRequest) -> Result<Statement>;

    fn build_aggregate(&self, set: &EntitySet, request: &AggregateRequest) -> Result<Statement>;

    fn build_exist(&self, set: &EntitySet, request: &ExistRequest) -> Result<Statement>;

    fn build_execution(&self, set: &EntitySet, request: &ExecutionRequest) -> Result<Statement>;
}

impl Request {
    /// Dispatch to the builder method for this request's kind.
    pub fn build(&self, builder: &dyn StatementBuilder, set: &EntitySet) -> Result<Statement> {
        match self {
            Request::TableDefinition(r) => builder.build_table_definition(set, r),
            Request::Select(r) => builder.build_select(set, r),
            Request::Insert(r) => builder.build_insert(set, r),
            Request::Update(r) => builder.build_update(set, r),
            Request::Delete(r) => builder.build_delete(set, r),
            Request::Upsert(r) => builder.build_upsert(set, r),
            Request::Aggregate(r) => builder.build_aggregate(set, r),
            Request::Exist(r) => builder.build_exist(set, r),
            Request::Execution(r) => builder.build_execution(set, r),
        }
    }
}

/// The builder every driver starts from.
#[derive(Debug, Clone)]
pub struct CommonBuilder {
    driver: &'static str,
    features: Features,
    rejected: BTreeSet<StatementKind>,
}

impl CommonBuilder {
    pub fn new(driver: &'static str, features: Features) -> Self {
        Self {
            driver,
            features,
            rejected: BTreeSet::new(),
        }
    }

    /// Refuse a statement kind with `Unsupported`.
    pub fn reject(mut self, kind: StatementKind) -> Self {
        self.rejected.insert(kind);
        self
    }

    pub fn driver(&self) -> &'static str {
        self.driver
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn supports(&self, kind: StatementKind) -> bool {
        !self.rejected.contains(&kind)
    }

    fn check(&self, kind: StatementKind) -> Result<()> {
        if self.supports(kind) {
            Ok(())
        } else {
            Err(Error::unsupported(self.driver, format!("{} statements", kind)))
        }
    }

    fn check_mutable(&self, entity: &Entity, kind: StatementKind) -> Result<()> {
        if entity.immutable {
            return Err(Error::unsupported(
                self.driver,
                format!("{} of immutable entity '{}'", kind, entity.key),
            ));
        }
        Ok(())
    }

    /// Resolve a single-valued column path, joining its hops with `kind`.
    fn column(
        &self,
        set: &EntitySet,
        tables: &mut Tables,
        scope: &mut Scope,
        path: &str,
        kind: JoinKind,
    ) -> Result<(Expr, SimplexProperty, bool)> {
        let resolved = set.find(&scope.entity, path)?;
        single_valued(self.driver, &resolved, path)?;
        let property = simplex_of(&resolved, path)?.clone();
        let table = scope.join_hops(set, tables, &resolved.hops, kind)?;
        Ok((
            Expr::field(table, property.column.clone()),
            property,
            !resolved.hops.is_empty(),
        ))
    }

    fn projection(
        &self,
        set: &EntitySet,
        tables: &mut Tables,
        scope: &mut Scope,
        path: &str,
    ) -> Result<Projection> {
        let (expr, property, joined) = self.column(set, tables, scope, path, JoinKind::Left)?;
        let projection = Projection::new(expr);
        Ok(if joined {
            projection.alias(path)
        } else if property.column != property.name {
            projection.alias(property.name)
        } else {
            projection
        })
    }

    fn condition(
        &self,
        set: &EntitySet,
        tables: &mut Tables,
        scope: &mut Scope,
        filter: Option<&Filter>,
        mode: JoinMode,
    ) -> Result<Option<Expr>> {
        let Some(filter) = filter else {
            return Ok(None);
        };
        let mut compiler = FilterCompiler {
            set,
            tables,
            mode,
            driver: self.driver,
        };
        Ok(Some(compiler.compile(scope, filter)?))
    }

    fn order(
        &self,
        set: &EntitySet,
        tables: &mut Tables,
        scope: &mut Scope,
        order: &[Order],
    ) -> Result<Vec<OrderBy>> {
        order
            .iter()
            .map(|o| {
                let (expr, _, _) = self.column(set, tables, scope, &o.path, JoinKind::Left)?;
                Ok(order_by(expr, o.descending))
            })
            .collect()
    }

    /// Insert assignments plus the column whose value the engine generates.
    fn insert_assignments(
        &self,
        set: &EntitySet,
        entity: &Entity,
        values: &Record,
    ) -> Result<(Vec<Assignment>, Option<String>)> {
        let properties = set.effective_properties(&entity.key)?;
        for (name, _) in values.iter() {
            if !properties.iter().any(|p| p.is_named(name)) {
                return Err(Error::unknown_member(entity.key.to_string(), name));
            }
        }

        let mut assignments = Vec::new();
        let mut generated = None;
        for property in properties.iter().filter_map(Property::as_simplex) {
            let value = lookup(values, &property.name);
            if let Some(value) = value.filter(|v| !v.is_null()) {
                assignments.push(assignment(property, input(property, typed_value(property, value)?)));
                continue;
            }
            if let Some(sequence) = &property.sequence {
                let spec = sequence.resolve(set)?;
                match spec.kind {
                    SequenceKind::Builtin => {
                        if generated.is_none() {
                            generated = Some(property.column.clone());
                        }
                    }
                    SequenceKind::External => {
                        let source = ParameterSource::Sequence {
                            name: spec.name.clone(),
                            seed: spec.seed,
                            interval: spec.interval,
                        };
                        assignments.push(assignment(
                            property,
                            Expr::Parameter(Param::pending(
                                property.name.clone(),
                                TypeSpec::of(property),
                                source,
                            )),
                        ));
                    }
                }
                continue;
            }
            if property.required {
                return Err(required(entity, property));
            }
            if value.is_some() {
                assignments.push(assignment(property, input(property, Value::Null)));
            }
        }
        Ok((assignments, generated))
    }
}

fn lookup<'r>(values: &'r Record, name: &str) -> Option<&'r Value> {
    values
        .get(name)
        .or_else(|| {
            values
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
}

fn input(property: &SimplexProperty, value: Value) -> Expr {
    Expr::Parameter(Param::input(
        property.name.clone(),
        TypeSpec::of(property),
        value,
    ))
}

fn assignment(property: &SimplexProperty, value: Expr) -> Assignment {
    Assignment {
        column: property.column.clone(),
        value,
        tag: property.tag,
    }
}

fn required(entity: &Entity, property: &SimplexProperty) -> Error {
    Error::DataArgument(DataArgumentError {
        field: Some(property.name.clone()),
        message: format!("'{}' of '{}' requires a value", property.name, entity.key),
        code: None,
    })
}

fn order_by(expr: Expr, descending: bool) -> OrderBy {
    if descending {
        OrderBy::desc(expr)
    } else {
        OrderBy::asc(expr)
    }
}

fn entity_of(set: &EntitySet, key: &EntityKey) -> Result<Arc<Entity>> {
    set.entity(key).ok_or_else(|| unknown_entity(key))
}

fn root(tables: &mut Tables, entity: &Entity) -> (TableRef, Scope) {
    let id = tables.alloc();
    (
        TableRef::named(entity.table_name(), id),
        Scope::new(entity.key.clone(), id),
    )
}

impl StatementBuilder for CommonBuilder {
    #[tracing::instrument(level = "debug", skip(self, set, request), fields(driver = self.driver, entity = %request.entity))]
    fn build_table_definition(
        &self,
        set: &EntitySet,
        request: &TableDefinitionRequest,
    ) -> Result<Statement> {
        self.check(StatementKind::TableDefinition)?;
        let entity = entity_of(set, &request.entity)?;
        let keys: Vec<String> = set
            .effective_keys(&entity.key)?
            .into_iter()
            .map(|k| k.column)
            .collect();

        let mut columns = Vec::new();
        for property in set
            .effective_properties(&entity.key)?
            .iter()
            .filter_map(Property::as_simplex)
        {
            let identity = match &property.sequence {
                Some(sequence) => sequence.resolve(set)?.kind == SequenceKind::Builtin,
                None => false,
            };
            columns.push(ColumnDef {
                name: property.column.clone(),
                spec: TypeSpec::of(property),
                required: property.required || keys.contains(&property.column),
                tag: property.tag,
                identity,
            });
        }

        Ok(Statement::TableDefinition(TableDefinition {
            table: entity.table_name(),
            columns,
            keys,
            if_not_exists: request.if_not_exists,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self, set, request), fields(driver = self.driver, entity = %request.entity))]
    fn build_select(&self, set: &EntitySet, request: &SelectRequest) -> Result<Statement> {
        self.check(StatementKind::Select)?;
        let entity = entity_of(set, &request.entity)?;
        let mut tables = Tables::default();
        let (table, mut scope) = root(&mut tables, &entity);

        let projection = if request.fields.is_empty() {
            set.effective_properties(&entity.key)?
                .iter()
                .filter_map(Property::as_simplex)
                .map(|p| {
                    let projection = Projection::new(Expr::field(table.id, p.column.clone()));
                    if p.column != p.name {
                        projection.alias(p.name.clone())
                    } else {
                        projection
                    }
                })
                .collect()
        } else {
            request
                .fields
                .iter()
                .map(|path| self.projection(set, &mut tables, &mut scope, path))
                .collect::<Result<Vec<_>>>()?
        };
        let filter = self.condition(
            set,
            &mut tables,
            &mut scope,
            request.filter.as_ref(),
            JoinMode::Join,
        )?;
        let order_by = self.order(set, &mut tables, &mut scope, &request.order)?;

        Ok(Statement::Select(Select {
            projection,
            source: Source {
                table,
                joins: scope.joins,
            },
            filter,
            group_by: Vec::new(),
            order_by,
            paging: request.paging,
            distinct: request.distinct,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self, set, request), fields(driver = self.driver, entity = %request.entity))]
    fn build_insert(&self, set: &EntitySet, request: &InsertRequest) -> Result<Statement> {
        self.check(StatementKind::Insert)?;
        let entity = entity_of(set, &request.entity)?;
        let (assignments, generated) = self.insert_assignments(set, &entity, &request.values)?;
        Ok(Statement::Insert(Insert {
            table: TableRef::named(entity.table_name(), TableId(0)),
            assignments,
            generated,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self, set, request), fields(driver = self.driver, entity = %request.entity))]
    fn build_update(&self, set: &EntitySet, request: &UpdateRequest) -> Result<Statement> {
        self.check(StatementKind::Update)?;
        let entity = entity_of(set, &request.entity)?;
        self.check_mutable(&entity, StatementKind::Update)?;

        let mut assignments = Vec::new();
        for (name, value) in request.values.iter() {
            let property = set.effective_property(&entity.key, name)?;
            let Some(property) = property.as_simplex() else {
                return Err(Error::unknown_member(entity.key.to_string(), name));
            };
            if value.is_null() && property.required {
                return Err(required(&entity, property));
            }
            assignments.push(assignment(property, input(property, typed_value(property, value)?)));
        }
        if assignments.is_empty() {
            return Err(Error::DataArgument(DataArgumentError {
                field: None,
                message: format!("update of '{}' assigns no properties", entity.key),
                code: None,
            }));
        }

        let mode = if self.features.multi_table_update {
            JoinMode::JoinConjuncts
        } else {
            JoinMode::Correlated
        };
        let mut tables = Tables::default();
        let (table, mut scope) = root(&mut tables, &entity);
        let filter = self.condition(set, &mut tables, &mut scope, request.filter.as_ref(), mode)?;

        Ok(Statement::Update(Update {
            source: Source {
                table,
                joins: scope.joins,
            },
            assignments,
            filter,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self, set, request), fields(driver = self.driver, entity = %request.entity))]
    fn build_delete(&self, set: &EntitySet, request: &DeleteRequest) -> Result<Statement> {
        self.check(StatementKind::Delete)?;
        let entity = entity_of(set, &request.entity)?;
        self.check_mutable(&entity, StatementKind::Delete)?;

        let mode = if self.features.multi_table_delete {
            JoinMode::JoinConjuncts
        } else {
            JoinMode::Correlated
        };
        let mut tables = Tables::default();
        let (table, mut scope) = root(&mut tables, &entity);
        let filter = self.condition(set, &mut tables, &mut scope, request.filter.as_ref(), mode)?;

        Ok(Statement::Delete(Delete {
            source: Source {
                table,
                joins: scope.joins,
            },
            filter,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self, set, request), fields(driver = self.driver, entity = %request.entity))]
    fn build_upsert(&self, set: &EntitySet, request: &UpsertRequest) -> Result<Statement> {
        self.check(StatementKind::Upsert)?;
        let entity = entity_of(set, &request.entity)?;
        self.check_mutable(&entity, StatementKind::Upsert)?;
        if !self.features.upsert {
            return Err(Error::unsupported(self.driver, "upsert"));
        }

        let (assignments, _) = self.insert_assignments(set, &entity, &request.values)?;
        let assigned = |column: &str| assignments.iter().any(|a| a.column == column);

        let key_properties = set.effective_keys(&entity.key)?;
        if key_properties.is_empty() {
            return Err(Error::unsupported(
                self.driver,
                format!("upsert of '{}', which declares no key", entity.key),
            ));
        }
        for key in &key_properties {
            if !assigned(&key.column) {
                return Err(required(&entity, key));
            }
        }
        let keys: Vec<String> = key_properties.iter().map(|k| k.column.clone()).collect();

        let updates = if request.updates.is_empty() {
            assignments
                .iter()
                .map(|a| a.column.clone())
                .filter(|c| !keys.contains(c))
                .collect()
        } else {
            let mut updates = Vec::with_capacity(request.updates.len());
            for name in &request.updates {
                let property = set.effective_property(&entity.key, name)?;
                let Some(property) = property.as_simplex() else {
                    return Err(Error::unknown_member(entity.key.to_string(), name));
                };
                if !assigned(&property.column) {
                    return Err(Error::DataArgument(DataArgumentError {
                        field: Some(property.name.clone()),
                        message: format!(
                            "'{}' is updated on conflict but has no value",
                            property.name
                        ),
                        code: None,
                    }));
                }
                updates.push(property.column.clone());
            }
            updates
        };

        Ok(Statement::Upsert(Upsert {
            table: TableRef::named(entity.table_name(), TableId(0)),
            assignments,
            keys,
            updates,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self, set, request), fields(driver = self.driver, entity = %request.entity))]
    fn build_aggregate(&self, set: &EntitySet, request: &AggregateRequest) -> Result<Statement> {
        self.check(StatementKind::Aggregate)?;
        let entity = entity_of(set, &request.entity)?;
        let mut tables = Tables::default();
        let (table, mut scope) = root(&mut tables, &entity);

        let group_by = request
            .group_by
            .iter()
            .map(|path| self.projection(set, &mut tables, &mut scope, path))
            .collect::<Result<Vec<_>>>()?;

        let mut aggregates = Vec::with_capacity(request.aggregates.len());
        for item in &request.aggregates {
            let arg = match &item.path {
                Some(path) => self.column(set, &mut tables, &mut scope, path, JoinKind::Left)?.0,
                None if item.function == crate::ir::AggregateFunction::Count => Expr::Star,
                None => {
                    return Err(Error::DataArgument(DataArgumentError {
                        field: Some(item.alias.clone()),
                        message: format!("{} needs a property path", item.function.name()),
                        code: None,
                    }));
                }
            };
            let mut call = MethodCall::aggregate(item.function, arg);
            call.distinct = item.distinct;
            aggregates.push(Projection::new(Expr::Method(call)).alias(item.alias.clone()));
        }

        let filter = self.condition(
            set,
            &mut tables,
            &mut scope,
            request.filter.as_ref(),
            JoinMode::Join,
        )?;

        let mut order_by = Vec::with_capacity(request.order.len());
        for order in &request.order {
            let by_alias = aggregates
                .iter()
                .find(|p| matches!(&p.alias, Some(a) if a.eq_ignore_ascii_case(&order.path)));
            let expr = match by_alias {
                Some(projection) => projection.expr.clone(),
                None => self.column(set, &mut tables, &mut scope, &order.path, JoinKind::Left)?.0,
            };
            order_by.push(self::order_by(expr, order.descending));
        }

        Ok(Statement::Aggregate(Aggregate {
            source: Source {
                table,
                joins: scope.joins,
            },
            group_by,
            aggregates,
            filter,
            order_by,
            paging: request.paging,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self, set, request), fields(driver = self.driver, entity = %request.entity))]
    fn build_exist(&self, set: &EntitySet, request: &ExistRequest) -> Result<Statement> {
        self.check(StatementKind::Exist)?;
        let entity = entity_of(set, &request.entity)?;
        let mut tables = Tables::default();
        let (table, mut scope) = root(&mut tables, &entity);
        let filter = self.condition(
            set,
            &mut tables,
            &mut scope,
            request.filter.as_ref(),
            JoinMode::Join,
        )?;

        let mut query = Select::new(Source {
            table,
            joins: scope.joins,
        })
        .project(Projection::new(Expr::Constant(Value::Int(1))));
        query.filter = filter;
        Ok(Statement::Exist(Exist { query }))
    }

    #[tracing::instrument(level = "debug", skip(self, _set, request), fields(driver = self.driver))]
    fn build_execution(&self, _set: &EntitySet, request: &ExecutionRequest) -> Result<Statement> {
        self.check(StatementKind::Execution)?;
        let parameters = request
            .parameters
            .iter()
            .map(|(name, value, data_type)| {
                Ok(Param::input(
                    name.clone(),
                    TypeSpec::new(*data_type),
                    value.clone().coerce(*data_type)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Statement::Execution(Execution {
            text: request.text.clone(),
            parameters,
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dialect::AnsiDialect;
    use crate::visitor::Visitor;
    use sqlweave_core::{
        ComplexDef, DataType, DialectErrorKind, EntityDef, Metadata, MetadataErrorKind,
        Multiplicity, SimplexDef, StaticProvider,
    };

    pub(crate) fn shop() -> Arc<EntitySet> {
        let provider = StaticProvider::default()
            .entity(
                EntityDef::new("Customer")
                    .namespace("Sales")
                    .key("Id")
                    .property(SimplexDef::new("Id", DataType::Int64).sequence("customer_id"))
                    .property(SimplexDef::new("Name", DataType::String).length(100).required())
                    .property(SimplexDef::new("Email", DataType::AnsiString).length(200))
                    .property(
                        ComplexDef::new("Orders", "Order", Multiplicity::Many).foreign("Customer"),
                    ),
            )
            .entity(
                EntityDef::new("Order")
                    .namespace("Sales")
                    .alias("orders")
                    .key("Id")
                    .property(SimplexDef::new("Id", DataType::Int64).sequence("#order_no:1000"))
                    .property(
                        SimplexDef::new("CustomerId", DataType::Int64)
                            .column("customer_id")
                            .required(),
                    )
                    .property(ComplexDef::new("Customer", "Customer", Multiplicity::One))
                    .property(SimplexDef::new("Total", DataType::Decimal).precision(18, 2))
                    .property(ComplexDef::new("Lines", "Line", Multiplicity::Many).foreign("Order")),
            )
            .entity(
                EntityDef::new("Line")
                    .namespace("Sales")
                    .key("Id")
                    .property(SimplexDef::new("Id", DataType::Int64))
                    .property(SimplexDef::new("OrderId", DataType::Int64))
                    .property(ComplexDef::new("Order", "Order", Multiplicity::One))
                    .property(SimplexDef::new("Sku", DataType::AnsiString).length(32)),
            )
            .entity(
                EntityDef::new("Ledger")
                    .key("Id")
                    .immutable()
                    .property(SimplexDef::new("Id", DataType::Int64)),
            );
        Metadata::load(&[&provider])
            .expect("load shop metadata")
            .snapshot()
    }

    pub(crate) fn key(name: &str) -> EntityKey {
        EntityKey::new("Sales", name)
    }

    fn builder() -> CommonBuilder {
        CommonBuilder::new("ansi", Features::default())
    }

    fn render(statement: &Statement) -> String {
        Visitor::new(Arc::new(AnsiDialect))
            .render(statement)
            .expect("render")
            .text()
    }

    #[test]
    fn test_select_all_columns() {
        let set = shop();
        let statement = builder()
            .build_select(&set, &SelectRequest::new(key("Order")))
            .unwrap();
        assert_eq!(
            render(&statement),
            "SELECT \"t0\".\"Id\", \"t0\".\"customer_id\" AS \"CustomerId\", \"t0\".\"Total\" \
             FROM \"orders\" AS \"t0\""
        );
    }

    #[test]
    fn test_projection_left_joins_and_filter_upgrades_to_inner() {
        let set = shop();
        let request = SelectRequest::new(key("Line"))
            .field("Sku")
            .field("Order.Customer.Name")
            .filter(Filter::eq("Order.Customer.Name", "Ada"));
        let Statement::Select(select) = builder().build_select(&set, &request).unwrap() else {
            panic!("expected select");
        };
        assert_eq!(select.source.joins.len(), 2);
        assert_eq!(select.source.joins[0].kind, JoinKind::Inner);
        assert_eq!(select.source.joins[1].kind, JoinKind::Inner);
        assert_eq!(
            select.projection[1].alias.as_deref(),
            Some("Order.Customer.Name")
        );
    }

    #[test]
    fn test_projection_only_join_stays_left() {
        let set = shop();
        let request = SelectRequest::new(key("Order")).field("Customer.Name");
        let sql = render(&builder().build_select(&set, &request).unwrap());
        assert_eq!(
            sql,
            "SELECT \"t1\".\"Name\" AS \"Customer.Name\" FROM \"orders\" AS \"t0\" \
             LEFT JOIN \"Sales_Customer\" AS \"t1\" ON \"t0\".\"customer_id\" = \"t1\".\"Id\""
        );
    }

    #[test]
    fn test_filter_through_many_needs_any() {
        let set = shop();
        let request = SelectRequest::new(key("Customer")).filter(Filter::eq("Orders.Total", 5));
        let err = builder().build_select(&set, &request).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_any_builds_correlated_exists() {
        let set = shop();
        let request = SelectRequest::new(key("Customer"))
            .field("Name")
            .filter(Filter::any("Orders", Some(Filter::gt("Total", 100))));
        let sql = render(&builder().build_select(&set, &request).unwrap());
        assert_eq!(
            sql,
            "SELECT \"t0\".\"Name\" FROM \"Sales_Customer\" AS \"t0\" WHERE EXISTS (SELECT 1 \
             FROM \"orders\" AS \"t1\" WHERE \"t0\".\"Id\" = \"t1\".\"customer_id\" AND \
             \"t1\".\"Total\" > ?)"
        );
    }

    #[test]
    fn test_none_negates() {
        let set = shop();
        let request = ExistRequest::new(key("Customer")).filter(Filter::none("Orders", None));
        let Statement::Exist(exist) = builder().build_exist(&set, &request).unwrap() else {
            panic!("expected exist");
        };
        assert!(matches!(
            exist.query.filter,
            Some(Expr::Exists { negated: true, .. })
        ));
    }

    #[test]
    fn test_filter_value_is_coerced() {
        let set = shop();
        let request = SelectRequest::new(key("Order")).filter(Filter::eq("Total", vec![1_u8, 2]));
        let err = builder().build_select(&set, &request).unwrap_err();
        match err {
            Error::DataArgument(e) => assert_eq!(e.field.as_deref(), Some("Total")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_path_fails_at_build() {
        let set = shop();
        let request = SelectRequest::new(key("Order")).field("Customer.Nope");
        let err = builder().build_select(&set, &request).unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::UnknownMember));
    }

    #[test]
    fn test_insert_builtin_sequence_is_generated() {
        let set = shop();
        let request = InsertRequest::new(key("Customer"), Record::new().with("Name", "Ada"));
        let Statement::Insert(insert) = builder().build_insert(&set, &request).unwrap() else {
            panic!("expected insert");
        };
        assert_eq!(insert.generated.as_deref(), Some("Id"));
        let columns: Vec<_> = insert.assignments.iter().map(|a| a.column.as_str()).collect();
        assert_eq!(columns, vec!["Name"]);
    }

    #[test]
    fn test_insert_external_sequence_is_pending() {
        let set = shop();
        let request = InsertRequest::new(key("Order"), Record::new().with("CustomerId", 7_i64));
        let Statement::Insert(insert) = builder().build_insert(&set, &request).unwrap() else {
            panic!("expected insert");
        };
        let Expr::Parameter(id) = &insert.assignments[0].value else {
            panic!("expected parameter");
        };
        assert_eq!(
            id.source,
            ParameterSource::Sequence {
                name: "order_no".to_string(),
                seed: 1000,
                interval: 1,
            }
        );
        assert!(insert.generated.is_none());
    }

    #[test]
    fn test_insert_missing_required_value() {
        let set = shop();
        let request = InsertRequest::new(key("Order"), Record::new().with("Total", 3_i64));
        match builder().build_insert(&set, &request).unwrap_err() {
            Error::DataArgument(e) => assert_eq!(e.field.as_deref(), Some("CustomerId")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_insert_unknown_field() {
        let set = shop();
        let request = InsertRequest::new(
            key("Customer"),
            Record::new().with("Name", "Ada").with("Shoe", 1_i64),
        );
        let err = builder().build_insert(&set, &request).unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::UnknownMember));
    }

    #[test]
    fn test_update_without_multi_table_support_correlates() {
        let set = shop();
        let request = UpdateRequest::new(key("Order"))
            .set("Total", 0_i64)
            .filter(Filter::eq("Customer.Name", "Ada"));
        let Statement::Update(update) = builder().build_update(&set, &request).unwrap() else {
            panic!("expected update");
        };
        assert!(update.source.joins.is_empty());
        assert!(matches!(update.filter, Some(Expr::Exists { .. })));
    }

    #[test]
    fn test_update_with_multi_table_support_joins() {
        let set = shop();
        let features = Features {
            multi_table_update: true,
            ..Features::default()
        };
        let request = UpdateRequest::new(key("Order"))
            .set("Total", 0_i64)
            .filter(Filter::eq("Customer.Name", "Ada"));
        let Statement::Update(update) = CommonBuilder::new("ansi", features)
            .build_update(&set, &request)
            .unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(update.source.joins.len(), 1);
    }

    #[test]
    fn test_update_needs_assignments() {
        let set = shop();
        let err = builder()
            .build_update(&set, &UpdateRequest::new(key("Order")))
            .unwrap_err();
        assert!(matches!(err, Error::DataArgument(_)));
    }

    #[test]
    fn test_immutable_entity_rejects_mutation() {
        let set = shop();
        let ledger = EntityKey::global("Ledger");
        let err = builder()
            .build_delete(&set, &DeleteRequest::new(ledger.clone()))
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        let err = builder()
            .build_update(&set, &UpdateRequest::new(ledger).set("Id", 1_i64))
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_upsert_requires_feature_and_keys() {
        let set = shop();
        let values = Record::new().with("CustomerId", 1_i64).with("Total", 2_i64);
        let err = builder()
            .build_upsert(&set, &UpsertRequest::new(key("Order"), values.clone()))
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        let upserting = CommonBuilder::new(
            "ansi",
            Features {
                upsert: true,
                ..Features::default()
            },
        );
        let Statement::Upsert(upsert) = upserting
            .build_upsert(
                &set,
                &UpsertRequest::new(key("Order"), values.with("Id", 9_i64)),
            )
            .unwrap()
        else {
            panic!("expected upsert");
        };
        assert_eq!(upsert.keys, vec!["Id"]);
        assert_eq!(upsert.updates, vec!["customer_id", "Total"]);
    }

    #[test]
    fn test_rejected_kind_is_unsupported() {
        let set = shop();
        let builder = builder().reject(StatementKind::Update);
        let err = builder
            .build_update(&set, &UpdateRequest::new(key("Order")).set("Total", 1_i64))
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert!(!builder.supports(StatementKind::Update));
    }

    #[test]
    fn test_aggregate_groups_and_orders_by_alias() {
        let set = shop();
        let request = AggregateRequest::new(key("Order"))
            .group_by("Customer.Name")
            .aggregate(AggregateItem::count("orders"))
            .aggregate(AggregateItem::of(
                crate::ir::AggregateFunction::Sum,
                "Total",
                "total",
            ))
            .order(Order::desc("total"));
        let sql = render(&builder().build_aggregate(&set, &request).unwrap());
        assert_eq!(
            sql,
            "SELECT \"t1\".\"Name\" AS \"Customer.Name\", COUNT(*) AS \"orders\", \
             SUM(\"t0\".\"Total\") AS \"total\" FROM \"orders\" AS \"t0\" LEFT JOIN \
             \"Sales_Customer\" AS \"t1\" ON \"t0\".\"customer_id\" = \"t1\".\"Id\" \
             GROUP BY \"t1\".\"Name\" ORDER BY SUM(\"t0\".\"Total\") DESC"
        );
    }

    #[test]
    fn test_unmapped_aggregate_fails_at_render() {
        let set = shop();
        let request = AggregateRequest::new(key("Order")).aggregate(AggregateItem::of(
            crate::ir::AggregateFunction::Spread,
            "Total",
            "spread",
        ));
        let statement = builder().build_aggregate(&set, &request).unwrap();
        let err = Visitor::new(Arc::new(AnsiDialect))
            .render(&statement)
            .unwrap_err();
        assert_eq!(err.dialect_kind(), Some(DialectErrorKind::UnsupportedAggregate));
    }

    #[test]
    fn test_table_definition_marks_keys_and_identity() {
        let set = shop();
        let Statement::TableDefinition(table) = builder()
            .build_table_definition(&set, &TableDefinitionRequest::new(key("Customer")))
            .unwrap()
        else {
            panic!("expected table definition");
        };
        assert_eq!(table.table, "Sales_Customer");
        assert_eq!(table.keys, vec!["Id"]);
        assert!(table.columns[0].identity && table.columns[0].required);
        assert!(!table.columns[2].required);
    }

    #[test]
    fn test_build_is_idempotent() {
        let set = shop();
        let request: Request = SelectRequest::new(key("Line"))
            .field("Order.Customer.Name")
            .filter(Filter::and([
                Filter::like("Sku", "A%"),
                Filter::any("Order.Lines", None),
            ]))
            .into();
        let builder = builder();
        let first = request.build(&builder, &set).unwrap();
        let second = request.build(&builder, &set).unwrap();
        assert_eq!(first, second);
        assert_eq!(render(&first), render(&second));
    }
}
