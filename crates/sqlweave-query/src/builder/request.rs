//! Logical, driver-independent operation requests.

use sqlweave_core::{DataType, EntityKey, EntitySet, Host, Record, Result, Value};

use super::filter::Filter;
use crate::ir::{AggregateFunction, Paging, StatementKind};

/// One ORDER BY item over a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub path: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            descending: false,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            descending: true,
        }
    }
}

/// Read rows of an entity.
///
/// With no fields, every effective column of the entity is projected.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectRequest {
    pub entity: EntityKey,
    pub fields: Vec<String>,
    pub filter: Option<Filter>,
    pub order: Vec<Order>,
    pub paging: Paging,
    pub distinct: bool,
}

impl SelectRequest {
    pub fn new(entity: EntityKey) -> Self {
        Self {
            entity,
            fields: Vec::new(),
            filter: None,
            order: Vec::new(),
            paging: Paging::default(),
            distinct: false,
        }
    }

    pub fn field(mut self, path: impl Into<String>) -> Self {
        self.fields.push(path.into());
        self
    }

    pub fn fields<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.fields.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.paging.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.paging.offset = Some(offset);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// Insert one row.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRequest {
    pub entity: EntityKey,
    pub values: Record,
}

impl InsertRequest {
    pub fn new(entity: EntityKey, values: Record) -> Self {
        Self { entity, values }
    }

    /// Read the row from a host object through its property tokens.
    pub fn from_host<H: Host>(set: &EntitySet, entity: EntityKey, host: &H) -> Result<Self> {
        let tokens = set.get_tokens::<H>(&entity)?;
        Ok(Self {
            values: tokens.to_record(host),
            entity,
        })
    }
}

/// Update the rows matching a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub entity: EntityKey,
    pub values: Record,
    pub filter: Option<Filter>,
}

impl UpdateRequest {
    pub fn new(entity: EntityKey) -> Self {
        Self {
            entity,
            values: Record::new(),
            filter: None,
        }
    }

    pub fn set(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(property, value);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Delete the rows matching a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub entity: EntityKey,
    pub filter: Option<Filter>,
}

impl DeleteRequest {
    pub fn new(entity: EntityKey) -> Self {
        Self {
            entity,
            filter: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Insert a row, or update it when its key already exists.
///
/// `updates` names the properties overwritten on conflict; when empty,
/// every assigned non-key column is.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRequest {
    pub entity: EntityKey,
    pub values: Record,
    pub updates: Vec<String>,
}

impl UpsertRequest {
    pub fn new(entity: EntityKey, values: Record) -> Self {
        Self {
            entity,
            values,
            updates: Vec::new(),
        }
    }

    pub fn update(mut self, property: impl Into<String>) -> Self {
        self.updates.push(property.into());
        self
    }
}

/// One aggregate output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateItem {
    pub function: AggregateFunction,
    /// Property path; `None` aggregates rows (`COUNT(*)`)
    pub path: Option<String>,
    pub alias: String,
    pub distinct: bool,
}

impl AggregateItem {
    pub fn count(alias: impl Into<String>) -> Self {
        Self {
            function: AggregateFunction::Count,
            path: None,
            alias: alias.into(),
            distinct: false,
        }
    }

    pub fn of(function: AggregateFunction, path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            function,
            path: Some(path.into()),
            alias: alias.into(),
            distinct: false,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// Grouped aggregation.
///
/// Order paths may name an aggregate alias as well as a property path.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRequest {
    pub entity: EntityKey,
    pub group_by: Vec<String>,
    pub aggregates: Vec<AggregateItem>,
    pub filter: Option<Filter>,
    pub order: Vec<Order>,
    pub paging: Paging,
}

impl AggregateRequest {
    pub fn new(entity: EntityKey) -> Self {
        Self {
            entity,
            group_by: Vec::new(),
            aggregates: Vec::new(),
            filter: None,
            order: Vec::new(),
            paging: Paging::default(),
        }
    }

    pub fn group_by(mut self, path: impl Into<String>) -> Self {
        self.group_by.push(path.into());
        self
    }

    pub fn aggregate(mut self, item: AggregateItem) -> Self {
        self.aggregates.push(item);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.paging.limit = Some(limit);
        self
    }
}

/// Whether any row matches.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistRequest {
    pub entity: EntityKey,
    pub filter: Option<Filter>,
}

impl ExistRequest {
    pub fn new(entity: EntityKey) -> Self {
        Self {
            entity,
            filter: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Raw statement text with `{name}` parameter markers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub text: String,
    pub parameters: Vec<(String, Value, DataType)>,
}

impl ExecutionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    pub fn parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        data_type: DataType,
    ) -> Self {
        self.parameters.push((name.into(), value.into(), data_type));
        self
    }
}

/// Create the table of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinitionRequest {
    pub entity: EntityKey,
    pub if_not_exists: bool,
}

impl TableDefinitionRequest {
    pub fn new(entity: EntityKey) -> Self {
        Self {
            entity,
            if_not_exists: false,
        }
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }
}

/// A request of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    TableDefinition(TableDefinitionRequest),
    Select(SelectRequest),
    Insert(InsertRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
    Upsert(UpsertRequest),
    Aggregate(AggregateRequest),
    Exist(ExistRequest),
    Execution(ExecutionRequest),
}

impl Request {
    pub fn kind(&self) -> StatementKind {
        match self {
            Request::TableDefinition(_) => StatementKind::TableDefinition,
            Request::Select(_) => StatementKind::Select,
            Request::Insert(_) => StatementKind::Insert,
            Request::Update(_) => StatementKind::Update,
            Request::Delete(_) => StatementKind::Delete,
            Request::Upsert(_) => StatementKind::Upsert,
            Request::Aggregate(_) => StatementKind::Aggregate,
            Request::Exist(_) => StatementKind::Exist,
            Request::Execution(_) => StatementKind::Execution,
        }
    }

    /// Target entity; raw execution has none.
    pub fn entity(&self) -> Option<&EntityKey> {
        match self {
            Request::TableDefinition(r) => Some(&r.entity),
            Request::Select(r) => Some(&r.entity),
            Request::Insert(r) => Some(&r.entity),
            Request::Update(r) => Some(&r.entity),
            Request::Delete(r) => Some(&r.entity),
            Request::Upsert(r) => Some(&r.entity),
            Request::Aggregate(r) => Some(&r.entity),
            Request::Exist(r) => Some(&r.entity),
            Request::Execution(_) => None,
        }
    }
}

macro_rules! impl_from_request {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Request {
                fn from(request: $ty) -> Self {
                    Request::$variant(request)
                }
            }
        )*
    };
}

impl_from_request! {
    TableDefinition => TableDefinitionRequest,
    Select => SelectRequest,
    Insert => InsertRequest,
    Update => UpdateRequest,
    Delete => DeleteRequest,
    Upsert => UpsertRequest,
    Aggregate => AggregateRequest,
    Exist => ExistRequest,
    Execution => ExecutionRequest,
}
