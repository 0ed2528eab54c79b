//! Executing compiled statements.
//!
//! A [`Database`] ties a driver to a connection factory and a metadata
//! container. Each operation compiles its request against the current
//! metadata snapshot, draws pending sequence values, binds parameters
//! through the driver's setter and runs one command on a caller-supplied
//! connection. Native failures are translated once, through
//! [`Driver::on_error`], with the connection still available for schema
//! introspection.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlweave::prelude::*;
//!
//! let db = Database::builder()
//!     .driver(Arc::new(PostgresDriver::default()))
//!     .factory(factory)
//!     .metadata(metadata)
//!     .connection_string("host=localhost dbname=shop")
//!     .build()?;
//!
//! let mut conn = db.connect()?;
//! let inserted = db.insert(&mut *conn, InsertRequest::new(customer, row))?;
//! println!("new id: {:?}", inserted.generated);
//! ```

use std::fmt;
use std::sync::Arc;

use sqlweave_core::{
    Command, CommandKind, ConfigError, Connection, ConnectionFactory, Cx, EntityKey, EntitySet,
    Error, Host, Metadata, Outcome, Parameter, Record, Result, Row, Value,
};
use sqlweave_query::ir::ParameterSource;
use sqlweave_query::{
    Driver, ErrorContext, GeneratedValue, InsertRequest, MemorySequences, Request, Script,
    SequenceSource, rows_from_hosts,
};

use crate::config::DatabaseConfig;

/// Result of [`Database::insert`].
#[derive(Debug, Clone, PartialEq)]
pub struct Inserted {
    pub affected: u64,
    /// Key produced by the engine or drawn from an external sequence
    pub generated: Option<Value>,
}

/// A driver bound to a connection factory and metadata.
pub struct Database {
    driver: Arc<dyn Driver>,
    factory: Arc<dyn ConnectionFactory>,
    metadata: Arc<Metadata>,
    connection_string: String,
    sequences: Arc<dyn SequenceSource>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("driver", &self.driver.name())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl Database {
    #[must_use]
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Create a database from a parsed configuration.
    pub fn from_config(
        config: DatabaseConfig,
        factory: Arc<dyn ConnectionFactory>,
        metadata: Arc<Metadata>,
    ) -> Self {
        Self {
            driver: config.driver.into_driver(),
            factory,
            metadata,
            connection_string: config.connection_string,
            sequences: Arc::new(MemorySequences::new()),
        }
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Open a connection through the factory.
    #[tracing::instrument(level = "debug", skip(self), fields(driver = self.driver.name()))]
    pub fn connect(&self) -> Result<Box<dyn Connection>> {
        self.factory.create_connection(&self.connection_string)
    }

    /// Build and render a request against the current metadata.
    pub fn compile(&self, request: &Request) -> Result<Script> {
        self.driver.compile(&self.metadata.snapshot(), request)
    }

    /// Run a request and return the affected row count.
    #[tracing::instrument(level = "debug", skip(self, conn, request), fields(kind = ?request.kind()))]
    pub fn execute(&self, conn: &mut dyn Connection, request: &Request) -> Result<u64> {
        let set = self.metadata.snapshot();
        let (_, sql, parameters) = self.prepare(&set, request)?;
        self.run(conn, &set, request.entity(), &sql, parameters, |command| {
            command.execute()
        })
    }

    /// Run a request and collect its rows.
    #[tracing::instrument(level = "debug", skip(self, conn, request), fields(kind = ?request.kind()))]
    pub fn query(&self, conn: &mut dyn Connection, request: &Request) -> Result<Vec<Row>> {
        let set = self.metadata.snapshot();
        let (_, sql, parameters) = self.prepare(&set, request)?;
        self.run(conn, &set, request.entity(), &sql, parameters, |command| {
            command.query()
        })
    }

    /// Insert one row and read back its generated key.
    #[tracing::instrument(level = "debug", skip(self, conn, request))]
    pub fn insert(&self, conn: &mut dyn Connection, request: InsertRequest) -> Result<Inserted> {
        let set = self.metadata.snapshot();
        let request = Request::from(request);
        let entity = request.entity();
        let (script, sql, parameters) = self.prepare(&set, &request)?;

        let drawn = script
            .parameters()
            .iter()
            .find(|p| matches!(p.source, ParameterSource::Sequence { .. }))
            .map(|p| p.value.clone());

        let inserted = match script.generated() {
            Some(GeneratedValue::Returning { column }) => {
                let rows = self.run(conn, &set, entity, &sql, parameters, |command| {
                    command.query()
                })?;
                let generated = rows
                    .first()
                    .and_then(|row| row.get_by_name(column).or_else(|| row.get(0)))
                    .cloned();
                Inserted {
                    affected: rows.len() as u64,
                    generated,
                }
            }
            Some(GeneratedValue::FollowUp {
                sql: follow_up, ..
            }) => {
                let affected = self.run(conn, &set, entity, &sql, parameters, |command| {
                    command.execute()
                })?;
                let rows = self.run(conn, &set, entity, follow_up, Vec::new(), |command| {
                    command.query()
                })?;
                Inserted {
                    affected,
                    generated: rows.first().and_then(|row| row.get(0)).cloned(),
                }
            }
            None => {
                let affected = self.run(conn, &set, entity, &sql, parameters, |command| {
                    command.execute()
                })?;
                Inserted {
                    affected,
                    generated: drawn,
                }
            }
        };
        tracing::debug!(affected = inserted.affected, generated = ?inserted.generated, "Inserted row");
        Ok(inserted)
    }

    /// Whether any row matches an existence check.
    ///
    /// The first column of the check is read as a boolean; an empty result is
    /// `false`.
    #[tracing::instrument(level = "debug", skip(self, conn, request))]
    pub fn exists(&self, conn: &mut dyn Connection, request: &Request) -> Result<bool> {
        let rows = self.query(conn, request)?;
        let found = rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(found)
    }

    /// Bulk import rows with the driver's strategy.
    #[tracing::instrument(level = "debug", skip(self, conn, rows), fields(rows = rows.len()))]
    pub fn import(
        &self,
        conn: &mut dyn Connection,
        entity: &EntityKey,
        rows: &[Record],
    ) -> Result<u64> {
        let set = self.metadata.snapshot();
        let importer = self.driver.create_importer();
        let result = importer.import(conn, &set, entity, rows);
        result.map_err(|error| self.translate(conn, &set, Some(entity), None, error))
    }

    /// Bulk import typed hosts.
    pub fn import_hosts<H: Host>(
        &self,
        conn: &mut dyn Connection,
        entity: &EntityKey,
        hosts: &[H],
    ) -> Result<u64> {
        let rows = rows_from_hosts(&self.metadata.snapshot(), entity, hosts)?;
        self.import(conn, entity, &rows)
    }

    /// Cancel-aware bulk import.
    ///
    /// The import yields to the runtime after every batch and checks `cx`
    /// before the next one. A cancelled import reports `Outcome::Cancelled`
    /// and never a partial count; batches already executed stay applied.
    pub async fn import_async(
        &self,
        cx: &Cx,
        conn: &mut dyn Connection,
        entity: &EntityKey,
        rows: &[Record],
    ) -> Outcome<u64, Error> {
        let set = self.metadata.snapshot();
        let importer = self.driver.create_importer();
        let outcome = importer.import_async(cx, &mut *conn, &set, entity, rows).await;
        match outcome {
            Outcome::Err(error) => {
                Outcome::Err(self.translate(conn, &set, Some(entity), None, error))
            }
            other => other,
        }
    }

    /// Compile, draw pending sequence values and bind parameters.
    fn prepare(
        &self,
        set: &EntitySet,
        request: &Request,
    ) -> Result<(Script, String, Vec<Parameter>)> {
        let mut script = self.driver.compile(set, request)?;
        script.resolve_pending(self.sequences.as_ref())?;
        let sql = script.fill(&[])?;
        let parameters = script.to_parameters(self.driver.parameter_setter())?;
        tracing::trace!(sql = %sql, parameters = parameters.len(), "Prepared statement");
        Ok((script, sql, parameters))
    }

    /// Run one text command and translate its failure.
    fn run<T>(
        &self,
        conn: &mut dyn Connection,
        set: &EntitySet,
        entity: Option<&EntityKey>,
        sql: &str,
        parameters: Vec<Parameter>,
        f: impl FnOnce(&mut dyn Command) -> Result<T>,
    ) -> Result<T> {
        let result = invoke(&mut *conn, sql, parameters, f);
        result.map_err(|error| self.translate(conn, set, entity, Some(sql), error))
    }

    fn translate(
        &self,
        conn: &mut dyn Connection,
        set: &EntitySet,
        entity: Option<&EntityKey>,
        sql: Option<&str>,
        error: Error,
    ) -> Error {
        let mut cx = ErrorContext::new().connection(conn).metadata(set);
        if let Some(entity) = entity {
            cx = cx.entity(entity);
        }
        if let Some(sql) = sql {
            cx = cx.sql(sql);
        }
        let translated = self.driver.on_error(&mut cx, error);
        tracing::debug!(driver = self.driver.name(), error = %translated, "Statement failed");
        translated
    }
}

/// The command is closed before the result is reported, so translation
/// can reuse the connection.
fn invoke<T>(
    conn: &mut dyn Connection,
    sql: &str,
    parameters: Vec<Parameter>,
    f: impl FnOnce(&mut dyn Command) -> Result<T>,
) -> Result<T> {
    let mut command = conn.create_command(sql, CommandKind::Text)?;
    *command.parameters_mut() = parameters;
    let result = f(&mut *command);
    let closed = command.close();
    let value = result?;
    closed?;
    Ok(value)
}

/// Builder for [`Database`].
#[derive(Default)]
pub struct DatabaseBuilder {
    driver: Option<Arc<dyn Driver>>,
    factory: Option<Arc<dyn ConnectionFactory>>,
    metadata: Option<Arc<Metadata>>,
    connection_string: String,
    sequences: Option<Arc<dyn SequenceSource>>,
}

impl fmt::Debug for DatabaseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseBuilder")
            .field("driver", &self.driver.as_ref().map(|d| d.name()))
            .field("factory", &self.factory.is_some())
            .field("metadata", &self.metadata.is_some())
            .finish_non_exhaustive()
    }
}

impl DatabaseBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    #[must_use]
    pub fn factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Arc<Metadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = connection_string.into();
        self
    }

    /// Counter service for external sequences; defaults to process-local
    /// counters.
    #[must_use]
    pub fn sequences(mut self, sequences: Arc<dyn SequenceSource>) -> Self {
        self.sequences = Some(sequences);
        self
    }

    /// Fails when the driver, factory or metadata is missing.
    pub fn build(self) -> Result<Database> {
        let missing = |what: &str| {
            Error::Config(ConfigError {
                message: format!("database has no {what}"),
                source: None,
            })
        };
        Ok(Database {
            driver: self.driver.ok_or_else(|| missing("driver"))?,
            factory: self.factory.ok_or_else(|| missing("connection factory"))?,
            metadata: self.metadata.ok_or_else(|| missing("metadata"))?,
            connection_string: self.connection_string,
            sequences: self
                .sequences
                .unwrap_or_else(|| Arc::new(MemorySequences::new())),
        })
    }
}
