//! sqlweave - a metadata-driven SQL statement compiler.
//!
//! Describe a data operation once, against an entity model, and get
//! dialect-correct SQL text plus bound parameters for MySQL, PostgreSQL or
//! TDengine:
//!
//! - Entities, properties, navigation paths and sequences come from a
//!   metadata provider (in code or JSON)
//! - Requests (select, insert, update, delete, upsert, aggregate, exist,
//!   raw execution, table definition) are built into a statement IR
//! - Each driver renders the IR with its own visitors and translates its
//!   native errors into one structured taxonomy
//! - Bulk imports use the engine's fastest path: flat-file loads for MySQL
//!   and PostgreSQL, grouped prepared inserts into TDengine sub-tables
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlweave::prelude::*;
//!
//! let provider = StaticProvider::default().entity(
//!     EntityDef::new("Customer")
//!         .key("Id")
//!         .property(SimplexDef::new("Id", DataType::Int64).sequence("customer_id"))
//!         .property(SimplexDef::new("Name", DataType::String).length(100)),
//! );
//! let metadata = Arc::new(Metadata::load(&[&provider])?);
//!
//! let db = Database::builder()
//!     .driver(Arc::new(MysqlDriver::default()))
//!     .factory(factory)
//!     .metadata(metadata)
//!     .build()?;
//!
//! let request = Request::from(
//!     SelectRequest::new(EntityKey::global("Customer")).filter(Filter::like("Name", "A%")),
//! );
//! let rows = db.query(&mut *db.connect()?, &request)?;
//! ```
//!
//! # Features
//!
//! - `mysql`, `postgres`, `tdengine` (all default): the driver crates

pub use sqlweave_core::{
    // asupersync re-exports
    Cx,
    Outcome,
    // Collaborators
    Command,
    CommandKind,
    Connection,
    ConnectionFactory,
    DefaultParameterSetter,
    Parameter,
    ParameterSetter,
    // Errors
    Error,
    Result,
    // Metadata
    ComplexDef,
    EntityDef,
    EntityKey,
    EntitySet,
    Host,
    JsonProvider,
    Metadata,
    MetadataProvider,
    Multiplicity,
    Record,
    SimplexDef,
    StaticProvider,
    // Values
    DataType,
    Row,
    Value,
};

pub use sqlweave_macros::Host;

pub use sqlweave_query::{
    AggregateFunction, AggregateItem, AggregateRequest, DeleteRequest, Dialect, Driver,
    ExecutionRequest, ExistRequest, Features, Filter, ImportOptions, Importer, InsertRequest,
    Order, Request, Script, SelectRequest, SequenceSource, TableDefinitionRequest, UpdateRequest,
    UpsertRequest,
};

#[cfg(feature = "mysql")]
pub use sqlweave_mysql::{MysqlDriver, MysqlOptions};
#[cfg(feature = "postgres")]
pub use sqlweave_postgres::{PostgresDriver, PostgresOptions};
#[cfg(feature = "tdengine")]
pub use sqlweave_tdengine::{TdengineDriver, TdengineOptions};

pub mod config;
pub mod database;

pub use config::{DatabaseConfig, DriverConfig};
pub use database::{Database, DatabaseBuilder, Inserted};

/// Everything needed to describe entities and run requests.
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::{
        AggregateFunction, AggregateItem, AggregateRequest, Connection, ConnectionFactory, Cx,
        DataType, Database, DatabaseConfig, DeleteRequest, Driver, EntityDef, EntityKey, Error,
        ExecutionRequest, ExistRequest, Filter, Host, InsertRequest, Metadata, Outcome, Record,
        Request, Result, Row, SelectRequest, SimplexDef, StaticProvider, TableDefinitionRequest,
        UpdateRequest, UpsertRequest, Value,
    };

    #[cfg(feature = "mysql")]
    pub use crate::MysqlDriver;
    #[cfg(feature = "postgres")]
    pub use crate::PostgresDriver;
    #[cfg(feature = "tdengine")]
    pub use crate::TdengineDriver;
}
