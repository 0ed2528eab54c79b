//! Collaborator interfaces for executing rendered statements.
//!
//! The compiler never talks to a database directly. A driver facade asks a
//! [`ConnectionFactory`] for a [`Connection`], creates a [`Command`] from
//! rendered SQL text, and assigns bound values onto provider [`Parameter`]s
//! through a [`ParameterSetter`].
//!
//! These traits are synchronous. Cancellation for long-running bulk work is
//! handled one level up, by checking asupersync's `Cx` between batches.

use crate::error::{Error, Result};
use crate::row::Row;
use crate::types::DataType;
use crate::value::Value;

/// How a command's text should be treated by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandKind {
    /// Plain SQL text, executed once.
    #[default]
    Text,
    /// Prepared statement, executed repeatedly with new parameter values.
    Prepared,
    /// Engine bulk-load statement (`LOAD DATA`, `COPY`).
    BulkLoad,
}

/// A provider parameter object.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
    /// Canonical type the value was set for
    pub data_type: Option<DataType>,
    /// Engine type name, when the dialect supplied one
    pub native_type: Option<String>,
}

impl Parameter {
    /// Create an unset parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::Null,
            data_type: None,
            native_type: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    /// Set the engine type name.
    pub fn with_native_type(mut self, native_type: impl Into<String>) -> Self {
        self.native_type = Some(native_type.into());
        self
    }
}

/// Produces connections for a connection string.
pub trait ConnectionFactory: Send + Sync {
    /// Open a provider connection.
    fn create_connection(&self, connection_string: &str) -> Result<Box<dyn Connection>>;
}

/// A provider connection.
pub trait Connection: Send {
    /// Create a command for the given text.
    fn create_command(&mut self, text: &str, kind: CommandKind) -> Result<Box<dyn Command + '_>>;

    /// Run a text query and collect its rows.
    ///
    /// Used by schema introspection during error translation.
    fn query(&mut self, text: &str, parameters: Vec<Parameter>) -> Result<Vec<Row>> {
        let mut command = self.create_command(text, CommandKind::Text)?;
        *command.parameters_mut() = parameters;
        let rows = command.query();
        command.close()?;
        rows
    }
}

/// A provider command.
pub trait Command {
    /// The command text.
    fn text(&self) -> &str;

    /// Parameters bound to the command, in placeholder order.
    fn parameters_mut(&mut self) -> &mut Vec<Parameter>;

    /// Bind the target sub-table of a prepared supertable insert.
    fn set_table_name(&mut self, name: &str) -> Result<()> {
        Err(Error::Custom(format!(
            "command does not support table name binding ({})",
            name
        )))
    }

    /// Bind tag values for the current sub-table.
    fn set_tags(&mut self, tags: Vec<Parameter>) -> Result<()> {
        let _ = tags;
        Err(Error::Custom(
            "command does not support tag binding".to_string(),
        ))
    }

    /// Queue the current parameter values as one row of a batch.
    fn add_batch(&mut self) -> Result<()> {
        Err(Error::Custom(
            "command does not support batching".to_string(),
        ))
    }

    /// Execute and return the affected row count.
    fn execute(&mut self) -> Result<u64>;

    /// Execute and collect result rows.
    fn query(&mut self) -> Result<Vec<Row>>;

    /// Release provider resources. Must be safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

/// Assigns a typed value onto a provider parameter.
pub trait ParameterSetter: Send + Sync {
    fn set_value(&self, parameter: &mut Parameter, value: Value, data_type: DataType)
    -> Result<()>;
}

/// Coerces values to the parameter's canonical type.
///
/// Timestamps with an offset are normalized to UTC unless the target type
/// keeps the offset (`DateTimeOffset`). Engines without a boolean type can
/// ask for booleans to be bound as integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParameterSetter {
    booleans_as_integers: bool,
}

impl DefaultParameterSetter {
    /// Create a setter that binds booleans natively.
    pub const fn new() -> Self {
        Self {
            booleans_as_integers: false,
        }
    }

    /// Bind booleans as `0`/`1`.
    pub const fn booleans_as_integers(mut self, enabled: bool) -> Self {
        self.booleans_as_integers = enabled;
        self
    }
}

impl ParameterSetter for DefaultParameterSetter {
    fn set_value(
        &self,
        parameter: &mut Parameter,
        value: Value,
        data_type: DataType,
    ) -> Result<()> {
        let value = match value.coerce(data_type) {
            Ok(v) => v,
            Err(Error::Type(mut te)) => {
                te.column = Some(parameter.name.clone());
                return Err(Error::Type(te));
            }
            Err(e) => return Err(e),
        };
        let value = match value {
            Value::Bool(b) if self.booleans_as_integers => Value::TinyInt(i8::from(b)),
            other => other,
        };
        parameter.value = value;
        parameter.data_type = Some(data_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setter_normalizes_offsets_to_utc() {
        let setter = DefaultParameterSetter::new();
        let mut p = Parameter::new("p0");
        setter
            .set_value(&mut p, Value::TimestampTz(7_200_000_000, 7200), DataType::DateTime)
            .unwrap();
        assert_eq!(p.value, Value::Timestamp(0));
        assert_eq!(p.data_type, Some(DataType::DateTime));
    }

    #[test]
    fn setter_keeps_offset_for_offset_columns() {
        let setter = DefaultParameterSetter::new();
        let mut p = Parameter::new("p0");
        setter
            .set_value(&mut p, Value::TimestampTz(1, 60), DataType::DateTimeOffset)
            .unwrap();
        assert_eq!(p.value, Value::TimestampTz(1, 60));
    }

    #[test]
    fn setter_binds_booleans_as_integers() {
        let setter = DefaultParameterSetter::new().booleans_as_integers(true);
        let mut p = Parameter::new("flag");
        setter
            .set_value(&mut p, Value::Bool(true), DataType::Boolean)
            .unwrap();
        assert_eq!(p.value, Value::TinyInt(1));
    }

    #[test]
    fn setter_reports_parameter_on_mismatch() {
        let setter = DefaultParameterSetter::new();
        let mut p = Parameter::new("age");
        let err = setter
            .set_value(&mut p, Value::Bytes(vec![1, 2]), DataType::Int32)
            .unwrap_err();
        match err {
            Error::Type(te) => assert_eq!(te.column.as_deref(), Some("age")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
