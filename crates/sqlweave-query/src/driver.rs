//! The driver facade: one engine's dialect, builder, visitor matrix,
//! parameter binding, error translation and bulk import strategy.

use serde::{Deserialize, Serialize};
use sqlweave_core::{
    Connection, EntityKey, EntitySet, Error, Parameter, ParameterSetter, Property, Result,
};

use crate::builder::{Request, StatementBuilder};
use crate::dialect::Dialect;
use crate::import::Importer;
use crate::script::Script;
use crate::visitor::Visitor;

/// Capabilities that change how statements are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// UPDATE may join other tables
    pub multi_table_update: bool,
    /// DELETE may join other tables
    pub multi_table_delete: bool,
    pub upsert: bool,
    /// INSERT can return generated columns in the same statement
    pub returning: bool,
    /// Engine-side named sequences
    pub sequences: bool,
    /// Rows can be updated in place
    pub row_mutation: bool,
}

/// Flat-file layout for bulk loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkFormat {
    pub delimiter: char,
    pub quote: Option<char>,
    pub escape: Option<char>,
    /// Text written for NULL
    pub null: String,
    pub line_terminator: String,
}

impl Default for BulkFormat {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            quote: None,
            escape: Some('\\'),
            null: "\\N".to_string(),
            line_terminator: "\n".to_string(),
        }
    }
}

impl BulkFormat {
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn null(mut self, null: impl Into<String>) -> Self {
        self.null = null.into();
        self
    }

    pub fn line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }
}

/// What the translator may consult about a failed operation.
#[derive(Default)]
pub struct ErrorContext<'a> {
    /// Open connection for schema introspection
    pub connection: Option<&'a mut dyn Connection>,
    pub metadata: Option<&'a EntitySet>,
    pub entity: Option<&'a EntityKey>,
    pub sql: Option<&'a str>,
}

impl<'a> ErrorContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(mut self, connection: &'a mut dyn Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn metadata(mut self, metadata: &'a EntitySet) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn entity(mut self, entity: &'a EntityKey) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn sql(mut self, sql: &'a str) -> Self {
        self.sql = Some(sql);
        self
    }

    /// Table of the entity in context.
    pub fn table(&self) -> Option<String> {
        let entity = self.metadata?.entity(self.entity?)?;
        Some(entity.table_name())
    }

    /// Property name for a column of the entity in context.
    ///
    /// Falls back to the column itself when nothing maps it.
    pub fn field_name(&self, column: &str) -> String {
        let mapped = match (self.metadata, self.entity) {
            (Some(set), Some(key)) => set.effective_properties(key).ok().and_then(|properties| {
                properties.into_iter().find_map(|p| match p {
                    Property::Simplex(s) if s.column.eq_ignore_ascii_case(column) => Some(s.name),
                    _ => None,
                })
            }),
            _ => None,
        };
        mapped.unwrap_or_else(|| column.to_string())
    }

    /// Run an introspection query and map the first column of each row
    /// back to property names.
    ///
    /// Without a connection, or when the query fails, the list is empty.
    pub fn key_fields(&mut self, sql: &str, parameters: Vec<Parameter>) -> Vec<String> {
        let Some(connection) = self.connection.as_deref_mut() else {
            return Vec::new();
        };
        let columns: Vec<String> = match connection.query(sql, parameters) {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| row.get(0).and_then(|v| v.to_plain_text()))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Constraint introspection failed");
                return Vec::new();
            }
        };
        columns.iter().map(|c| self.field_name(c)).collect()
    }
}

impl std::fmt::Debug for ErrorContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorContext")
            .field("connection", &self.connection.is_some())
            .field("entity", &self.entity)
            .field("sql", &self.sql)
            .finish()
    }
}

/// One database engine.
///
/// Drivers are process-wide values without per-call state; every method
/// takes `&self`.
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    fn features(&self) -> &Features;

    fn builder(&self) -> &dyn StatementBuilder;

    fn visitor(&self) -> &Visitor;

    fn parameter_setter(&self) -> &dyn ParameterSetter;

    fn dialect(&self) -> &dyn Dialect {
        self.visitor().dialect()
    }

    /// Translate a native error into the structured taxonomy.
    ///
    /// Errors the driver does not recognize are returned unchanged.
    fn on_error(&self, cx: &mut ErrorContext<'_>, error: Error) -> Error {
        let _ = cx;
        error
    }

    /// The bulk import strategy of this engine.
    fn create_importer(&self) -> Box<dyn Importer>;

    fn bulk_format(&self) -> BulkFormat {
        BulkFormat::default()
    }

    /// Build and render a request.
    fn compile(&self, set: &EntitySet, request: &Request) -> Result<Script> {
        let statement = request.build(self.builder(), set)?;
        self.visitor().render(&statement)
    }
}
