//! Error types for sqlweave operations.
//!
//! Errors fall into three groups:
//!
//! - **Build-time**: metadata resolution and statement construction
//!   (`Metadata`, `Unsupported`, `DataArgument` for missing required values).
//! - **Render-time**: dialect limitations (`Dialect`). These are never
//!   degraded to a best-effort rendering.
//! - **Execution**: native driver failures arrive as `Query` and are
//!   translated once by the driver facade into `DataArgument`,
//!   `DataConstraint` or `DataConflict`. Unrecognized native errors stay `Query`.

use std::fmt;

/// The primary error type for all sqlweave operations.
#[derive(Debug)]
pub enum Error {
    /// Metadata model errors (unknown member, missing base, ...)
    Metadata(MetadataError),
    /// Dialect cannot express a type, function or sequence operation
    Dialect(DialectError),
    /// Statement kind or operation not supported by a driver
    Unsupported(UnsupportedError),
    /// Value too long or otherwise invalid for a column
    DataArgument(DataArgumentError),
    /// Unique or primary key violation
    DataConstraint(DataConstraintError),
    /// Foreign key or other referential conflict
    DataConflict(DataConflictError),
    /// Native query error, untranslated
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Configuration errors
    Config(ConfigError),
    /// I/O errors
    Io(std::io::Error),
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataError {
    pub kind: MetadataErrorKind,
    /// Entity the failure was raised against, as `namespace.name`
    pub entity: Option<String>,
    /// Offending member, path segment or sequence text
    pub member: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataErrorKind {
    /// A property path segment or entity does not resolve
    UnknownMember,
    /// `base` names an entity that is not loaded
    MissingBase,
    /// A later declaration redefines an existing property
    DuplicateMember,
    /// Two declarations disagree on an entity attribute
    Conflict,
    /// Navigation or inheritance loops back on itself
    CyclicNavigation,
    /// Malformed sequence text or unresolvable proxy
    InvalidSequence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectError {
    pub kind: DialectErrorKind,
    /// Dialect name (e.g. "mysql")
    pub dialect: &'static str,
    /// The type, function or operation that was requested
    pub subject: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectErrorKind {
    UnsupportedType,
    UnsupportedAggregate,
    UnsupportedSequenceOperation,
    UnsupportedFunction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedError {
    /// Driver name
    pub driver: &'static str,
    /// Statement kind or operation description
    pub operation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataArgumentError {
    /// Offending field (property name when it could be mapped, column otherwise)
    pub field: Option<String>,
    pub message: String,
    /// Native error code, when the error came from the driver
    pub code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConstraintError {
    pub kind: ConstraintKind,
    /// Index or constraint name
    pub key: String,
    /// Offending value as reported by the engine
    pub value: Option<String>,
    pub table: Option<String>,
    /// Fields composing the key, resolved through schema introspection
    pub fields: Vec<String>,
    pub code: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    PrimaryKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConflictError {
    /// Native code preserved for diagnostics
    pub code: Option<i32>,
    pub sqlstate: Option<String>,
    pub message: String,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    /// Engine error number (MySQL errno, TDengine code)
    pub code: Option<i32>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    /// Table named by the engine (Postgres error fields)
    pub table: Option<String>,
    /// Column named by the engine (Postgres error fields)
    pub column: Option<String>,
    /// Constraint named by the engine (Postgres error fields)
    pub constraint: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Data too large or invalid for column
    DataTruncation,
    /// Table or column not found
    NotFound,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn metadata(
        kind: MetadataErrorKind,
        entity: Option<String>,
        member: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Metadata(MetadataError {
            kind,
            entity,
            member,
            message: message.into(),
        })
    }

    /// Shorthand for an `UnknownMember` metadata error.
    pub fn unknown_member(entity: impl Into<String>, member: impl Into<String>) -> Self {
        let entity = entity.into();
        let member = member.into();
        let message = format!("'{member}' is not a member of '{entity}'");
        Self::metadata(
            MetadataErrorKind::UnknownMember,
            Some(entity),
            Some(member),
            message,
        )
    }

    /// Shorthand for a dialect limitation.
    pub fn dialect(kind: DialectErrorKind, dialect: &'static str, subject: impl Into<String>) -> Self {
        Error::Dialect(DialectError {
            kind,
            dialect,
            subject: subject.into(),
        })
    }

    /// Shorthand for an operation a driver cannot perform.
    pub fn unsupported(driver: &'static str, operation: impl Into<String>) -> Self {
        Error::Unsupported(UnsupportedError {
            driver,
            operation: operation.into(),
        })
    }

    /// Metadata error kind, if this is a metadata error.
    pub fn metadata_kind(&self) -> Option<MetadataErrorKind> {
        match self {
            Error::Metadata(m) => Some(m.kind),
            _ => None,
        }
    }

    /// Dialect error kind, if this is a dialect error.
    pub fn dialect_kind(&self) -> Option<DialectErrorKind> {
        match self {
            Error::Dialect(d) => Some(d.kind),
            _ => None,
        }
    }

    /// Get SQLSTATE if available (e.g., "23505" for unique violation)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            Error::DataConflict(c) => c.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Native error code, if this error came from a driver.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Query(q) => q.code,
            Error::DataArgument(a) => a.code,
            Error::DataConstraint(c) => c.code,
            Error::DataConflict(c) => c.code,
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl QueryError {
    /// Create a native error carrying only a code and message.
    pub fn native(code: Option<i32>, sqlstate: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Database,
            sql: None,
            code,
            sqlstate: sqlstate.map(str::to_string),
            message: message.into(),
            detail: None,
            table: None,
            column: None,
            constraint: None,
            source: None,
        }
    }

    /// Attach the detail field.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the table field.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Attach the column field.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Attach the constraint field.
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Metadata(e) => write!(f, "Metadata error: {}", e),
            Error::Dialect(e) => write!(f, "Dialect error: {}", e),
            Error::Unsupported(e) => write!(f, "Unsupported: {}", e),
            Error::DataArgument(e) => write!(f, "Invalid data: {}", e),
            Error::DataConstraint(e) => write!(f, "Constraint violation: {}", e),
            Error::DataConflict(e) => write!(f, "Data conflict: {}", e),
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for DialectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            DialectErrorKind::UnsupportedType => "data type",
            DialectErrorKind::UnsupportedAggregate => "aggregate function",
            DialectErrorKind::UnsupportedSequenceOperation => "sequence operation",
            DialectErrorKind::UnsupportedFunction => "function",
        };
        write!(f, "{} does not support {} '{}'", self.dialect, what, self.subject)
    }
}

impl fmt::Display for UnsupportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} driver does not support {}", self.driver, self.operation)
    }
}

impl fmt::Display for DataArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "field '{}': {}", field, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for DataConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ConstraintKind::Unique => "unique key",
            ConstraintKind::PrimaryKey => "primary key",
        };
        write!(f, "duplicate value")?;
        if let Some(value) = &self.value {
            write!(f, " '{}'", value)?;
        }
        write!(f, " for {} '{}'", kind, self.key)?;
        if let Some(table) = &self.table {
            write!(f, " on '{}'", table)?;
        }
        if !self.fields.is_empty() {
            write!(f, " ({})", self.fields.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for DataConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<MetadataError> for Error {
    fn from(err: MetadataError) -> Self {
        Error::Metadata(err)
    }
}

impl From<DialectError> for Error {
    fn from(err: DialectError) -> Self {
        Error::Dialect(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for sqlweave operations.
pub type Result<T> = std::result::Result<T, Error>;
