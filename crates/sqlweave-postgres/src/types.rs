//! PostgreSQL column types and parameter OIDs.

use sqlweave_core::{DataType, Result};
use sqlweave_query::ir::TypeSpec;

/// Type OIDs of the built-in types canonical values bind as.
pub mod oid {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const BPCHAR: u32 = 1042;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIME: u32 = 1083;
    pub const TIMESTAMP: u32 = 1114;
    pub const TIMESTAMPTZ: u32 = 1184;
    pub const NUMERIC: u32 = 1700;
    pub const UUID: u32 = 2950;
    pub const JSONB: u32 = 3802;
}

/// OID a parameter of `data_type` binds as.
///
/// Unsigned types widen to the next signed type; `UInt64` needs `numeric`.
pub const fn oid_of(data_type: DataType) -> u32 {
    match data_type {
        DataType::Boolean => oid::BOOL,
        DataType::Byte | DataType::SByte | DataType::Int16 => oid::INT2,
        DataType::UInt16 | DataType::Int32 => oid::INT4,
        DataType::UInt32 | DataType::Int64 => oid::INT8,
        DataType::UInt64 | DataType::Decimal | DataType::Currency => oid::NUMERIC,
        DataType::Single => oid::FLOAT4,
        DataType::Double => oid::FLOAT8,
        DataType::String | DataType::AnsiString => oid::VARCHAR,
        DataType::StringFixedLength | DataType::AnsiStringFixedLength => oid::BPCHAR,
        DataType::Binary => oid::BYTEA,
        DataType::Date => oid::DATE,
        DataType::Time => oid::TIME,
        DataType::DateTime | DataType::Timestamp => oid::TIMESTAMP,
        DataType::DateTimeOffset => oid::TIMESTAMPTZ,
        DataType::Guid => oid::UUID,
        DataType::Json => oid::JSONB,
    }
}

pub const fn type_name(type_oid: u32) -> &'static str {
    match type_oid {
        oid::BOOL => "bool",
        oid::BYTEA => "bytea",
        oid::INT8 => "int8",
        oid::INT2 => "int2",
        oid::INT4 => "int4",
        oid::TEXT => "text",
        oid::FLOAT4 => "float4",
        oid::FLOAT8 => "float8",
        oid::BPCHAR => "bpchar",
        oid::VARCHAR => "varchar",
        oid::DATE => "date",
        oid::TIME => "time",
        oid::TIMESTAMP => "timestamp",
        oid::TIMESTAMPTZ => "timestamptz",
        oid::NUMERIC => "numeric",
        oid::UUID => "uuid",
        oid::JSONB => "jsonb",
        _ => "unknown",
    }
}

/// DDL column type.
pub fn column_type(spec: &TypeSpec) -> Result<String> {
    let numeric = |precision: u8, scale: u8| {
        format!(
            "NUMERIC({}, {})",
            spec.precision.unwrap_or(precision),
            spec.scale.unwrap_or(scale)
        )
    };
    let text = match spec.data_type {
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Byte | DataType::SByte | DataType::Int16 => "SMALLINT".to_string(),
        DataType::UInt16 | DataType::Int32 => "INTEGER".to_string(),
        DataType::UInt32 | DataType::Int64 => "BIGINT".to_string(),
        DataType::UInt64 => "NUMERIC(20, 0)".to_string(),
        DataType::Single => "REAL".to_string(),
        DataType::Double => "DOUBLE PRECISION".to_string(),
        DataType::Decimal => numeric(18, 2),
        DataType::Currency => numeric(19, 4),
        DataType::String | DataType::AnsiString => match spec.length {
            Some(n) => format!("VARCHAR({})", n),
            None => "TEXT".to_string(),
        },
        DataType::StringFixedLength | DataType::AnsiStringFixedLength => {
            format!("CHAR({})", spec.length.unwrap_or(1))
        }
        DataType::Binary => "BYTEA".to_string(),
        DataType::Date => "DATE".to_string(),
        DataType::Time => "TIME".to_string(),
        DataType::DateTime | DataType::Timestamp => "TIMESTAMP".to_string(),
        DataType::DateTimeOffset => "TIMESTAMPTZ".to_string(),
        DataType::Guid => "UUID".to_string(),
        DataType::Json => "JSONB".to_string(),
    };
    Ok(text)
}
