//! MySQL column and parameter types.
//!
//! Canonical types map to two MySQL spellings: the DDL column type used in
//! `CREATE TABLE`, and the `MYSQL_TYPE_*` field type attached to bound
//! parameters so the provider binds them with the right wire type.

use sqlweave_core::{DataType, Result};
use sqlweave_query::dialect::unsupported_type;
use sqlweave_query::ir::TypeSpec;

/// Longest `VARCHAR` emitted before falling back to `LONGTEXT`
/// (utf8mb4 rows are limited to 65535 bytes).
pub const MAX_VARCHAR: u32 = 16383;

/// Longest `VARBINARY` emitted before falling back to `LONGBLOB`.
pub const MAX_VARBINARY: u32 = 65535;

/// Character set for ANSI string columns.
pub const ANSI_CHARSET: &str = "latin1";

/// MySQL field type codes (`MYSQL_TYPE_*`) used for parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldType {
    /// TINYINT
    Tiny = 0x01,
    /// SMALLINT
    Short = 0x02,
    /// INT
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Timestamp = 0x07,
    /// BIGINT
    LongLong = 0x08,
    Date = 0x0A,
    Time = 0x0B,
    DateTime = 0x0C,
    Json = 0xF5,
    NewDecimal = 0xF6,
    Blob = 0xFC,
    VarString = 0xFD,
    /// CHAR
    String = 0xFE,
}

impl FieldType {
    /// Field type a parameter of `data_type` is bound as.
    pub const fn of(data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean | DataType::Byte | DataType::SByte => FieldType::Tiny,
            DataType::Int16 | DataType::UInt16 => FieldType::Short,
            DataType::Int32 | DataType::UInt32 => FieldType::Long,
            DataType::Int64 | DataType::UInt64 => FieldType::LongLong,
            DataType::Single => FieldType::Float,
            DataType::Double => FieldType::Double,
            DataType::Decimal | DataType::Currency => FieldType::NewDecimal,
            DataType::String | DataType::AnsiString => FieldType::VarString,
            DataType::StringFixedLength | DataType::AnsiStringFixedLength | DataType::Guid => {
                FieldType::String
            }
            DataType::Binary => FieldType::Blob,
            DataType::Date => FieldType::Date,
            DataType::Time => FieldType::Time,
            DataType::DateTime | DataType::DateTimeOffset => FieldType::DateTime,
            DataType::Timestamp => FieldType::Timestamp,
            DataType::Json => FieldType::Json,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Tiny => "TINY",
            FieldType::Short => "SHORT",
            FieldType::Long => "LONG",
            FieldType::Float => "FLOAT",
            FieldType::Double => "DOUBLE",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::LongLong => "LONGLONG",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::DateTime => "DATETIME",
            FieldType::Json => "JSON",
            FieldType::NewDecimal => "NEWDECIMAL",
            FieldType::Blob => "BLOB",
            FieldType::VarString => "VAR_STRING",
            FieldType::String => "STRING",
        }
    }
}

/// DDL column type.
pub fn column_type(spec: &TypeSpec) -> Result<String> {
    let ansi = |text: String| {
        if spec.data_type.is_ansi() {
            format!("{} CHARACTER SET {}", text, ANSI_CHARSET)
        } else {
            text
        }
    };
    let text = match spec.data_type {
        DataType::Boolean => "TINYINT(1)".to_string(),
        DataType::Byte => "TINYINT UNSIGNED".to_string(),
        DataType::SByte => "TINYINT".to_string(),
        DataType::Int16 => "SMALLINT".to_string(),
        DataType::UInt16 => "SMALLINT UNSIGNED".to_string(),
        DataType::Int32 => "INT".to_string(),
        DataType::UInt32 => "INT UNSIGNED".to_string(),
        DataType::Int64 => "BIGINT".to_string(),
        DataType::UInt64 => "BIGINT UNSIGNED".to_string(),
        DataType::Single => "FLOAT".to_string(),
        DataType::Double => "DOUBLE".to_string(),
        DataType::Decimal | DataType::Currency => format!(
            "DECIMAL({}, {})",
            spec.precision.unwrap_or(18),
            spec.scale.unwrap_or(2)
        ),
        DataType::String | DataType::AnsiString => match spec.length {
            Some(n) if n <= MAX_VARCHAR => ansi(format!("VARCHAR({})", n)),
            _ => ansi("LONGTEXT".to_string()),
        },
        DataType::StringFixedLength | DataType::AnsiStringFixedLength => {
            ansi(format!("CHAR({})", spec.length.unwrap_or(1).min(255)))
        }
        DataType::Binary => match spec.length {
            Some(n) if n <= MAX_VARBINARY => format!("VARBINARY({})", n),
            _ => "LONGBLOB".to_string(),
        },
        DataType::Date => "DATE".to_string(),
        DataType::Time => "TIME(6)".to_string(),
        DataType::DateTime => "DATETIME(6)".to_string(),
        DataType::Timestamp => "TIMESTAMP(6)".to_string(),
        DataType::Guid => "CHAR(36)".to_string(),
        DataType::Json => "JSON".to_string(),
        DataType::DateTimeOffset => return Err(unsupported_type("mysql", spec)),
    };
    Ok(text)
}

/// Destination type of `CONVERT(x, type)`, which accepts fewer names than DDL.
pub fn convert_type(spec: &TypeSpec) -> Result<String> {
    let text = match spec.data_type {
        DataType::Boolean
        | DataType::SByte
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64 => "SIGNED".to_string(),
        DataType::Byte | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            "UNSIGNED".to_string()
        }
        DataType::Single => "FLOAT".to_string(),
        DataType::Double => "DOUBLE".to_string(),
        DataType::Decimal | DataType::Currency => format!(
            "DECIMAL({}, {})",
            spec.precision.unwrap_or(18),
            spec.scale.unwrap_or(2)
        ),
        DataType::String
        | DataType::AnsiString
        | DataType::StringFixedLength
        | DataType::AnsiStringFixedLength => match spec.length {
            Some(n) => format!("CHAR({})", n),
            None => "CHAR".to_string(),
        },
        DataType::Binary => match spec.length {
            Some(n) => format!("BINARY({})", n),
            None => "BINARY".to_string(),
        },
        DataType::Date => "DATE".to_string(),
        DataType::Time => "TIME(6)".to_string(),
        DataType::DateTime | DataType::Timestamp => "DATETIME(6)".to_string(),
        DataType::Guid => "CHAR(36)".to_string(),
        DataType::Json => "JSON".to_string(),
        DataType::DateTimeOffset => return Err(unsupported_type("mysql", spec)),
    };
    Ok(text)
}
