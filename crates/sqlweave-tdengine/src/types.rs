//! TDengine column and parameter types.
//!
//! Parameters carry the client's `TSDB_DATA_TYPE_*` code name so the
//! statement binder (`taos_stmt`) picks the right buffer layout.

use sqlweave_core::{DataType, Result};
use sqlweave_query::dialect::unsupported_type;
use sqlweave_query::ir::TypeSpec;

/// Length used for string and binary columns declared without one.
pub const DEFAULT_LENGTH: u32 = 255;

/// Longest `NCHAR` column, in characters.
pub const MAX_NCHAR: u32 = 16374;

/// Longest `VARCHAR` / `VARBINARY` column, in bytes.
pub const MAX_VARCHAR: u32 = 65517;

/// Widest `DECIMAL`.
pub const MAX_PRECISION: u8 = 38;

/// Client data type codes (`TSDB_DATA_TYPE_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TsdbType {
    Bool = 1,
    TinyInt = 2,
    SmallInt = 3,
    Int = 4,
    BigInt = 5,
    Float = 6,
    Double = 7,
    /// Also spelled `BINARY`
    VarChar = 8,
    Timestamp = 9,
    NChar = 10,
    UTinyInt = 11,
    USmallInt = 12,
    UInt = 13,
    UBigInt = 14,
    Json = 15,
    VarBinary = 16,
    Decimal = 17,
}

impl TsdbType {
    /// Bind type of a canonical type, if TDengine stores it at all.
    pub const fn of(data_type: DataType) -> Option<Self> {
        let ty = match data_type {
            DataType::Boolean => TsdbType::Bool,
            DataType::SByte => TsdbType::TinyInt,
            DataType::Byte => TsdbType::UTinyInt,
            DataType::Int16 => TsdbType::SmallInt,
            DataType::UInt16 => TsdbType::USmallInt,
            DataType::Int32 => TsdbType::Int,
            DataType::UInt32 => TsdbType::UInt,
            DataType::Int64 => TsdbType::BigInt,
            DataType::UInt64 => TsdbType::UBigInt,
            DataType::Single => TsdbType::Float,
            DataType::Double => TsdbType::Double,
            DataType::Decimal | DataType::Currency => TsdbType::Decimal,
            DataType::String | DataType::StringFixedLength => TsdbType::NChar,
            DataType::AnsiString | DataType::AnsiStringFixedLength | DataType::Guid => {
                TsdbType::VarChar
            }
            DataType::Binary => TsdbType::VarBinary,
            DataType::DateTime | DataType::DateTimeOffset | DataType::Timestamp => {
                TsdbType::Timestamp
            }
            DataType::Json => TsdbType::Json,
            DataType::Date | DataType::Time => return None,
        };
        Some(ty)
    }

    pub const fn name(self) -> &'static str {
        match self {
            TsdbType::Bool => "BOOL",
            TsdbType::TinyInt => "TINYINT",
            TsdbType::SmallInt => "SMALLINT",
            TsdbType::Int => "INT",
            TsdbType::BigInt => "BIGINT",
            TsdbType::Float => "FLOAT",
            TsdbType::Double => "DOUBLE",
            TsdbType::VarChar => "VARCHAR",
            TsdbType::Timestamp => "TIMESTAMP",
            TsdbType::NChar => "NCHAR",
            TsdbType::UTinyInt => "UTINYINT",
            TsdbType::USmallInt => "USMALLINT",
            TsdbType::UInt => "UINT",
            TsdbType::UBigInt => "UBIGINT",
            TsdbType::Json => "JSON",
            TsdbType::VarBinary => "VARBINARY",
            TsdbType::Decimal => "DECIMAL",
        }
    }
}

fn sized(spec: &TypeSpec, name: &str, max: u32) -> Result<String> {
    let length = spec.length.unwrap_or(DEFAULT_LENGTH);
    if length == 0 || length > max {
        return Err(unsupported_type(crate::dialect::NAME, spec));
    }
    Ok(format!("{}({})", name, length))
}

/// DDL column type.
pub fn column_type(spec: &TypeSpec) -> Result<String> {
    let text = match spec.data_type {
        DataType::Boolean => "BOOL".to_string(),
        DataType::SByte => "TINYINT".to_string(),
        DataType::Byte => "TINYINT UNSIGNED".to_string(),
        DataType::Int16 => "SMALLINT".to_string(),
        DataType::UInt16 => "SMALLINT UNSIGNED".to_string(),
        DataType::Int32 => "INT".to_string(),
        DataType::UInt32 => "INT UNSIGNED".to_string(),
        DataType::Int64 => "BIGINT".to_string(),
        DataType::UInt64 => "BIGINT UNSIGNED".to_string(),
        DataType::Single => "FLOAT".to_string(),
        DataType::Double => "DOUBLE".to_string(),
        DataType::Decimal => {
            let precision = spec.precision.unwrap_or(18);
            if precision == 0 || precision > MAX_PRECISION {
                return Err(unsupported_type(crate::dialect::NAME, spec));
            }
            format!("DECIMAL({}, {})", precision, spec.scale.unwrap_or(2).min(precision))
        }
        DataType::Currency => "DECIMAL(19, 4)".to_string(),
        DataType::String | DataType::StringFixedLength => sized(spec, "NCHAR", MAX_NCHAR)?,
        DataType::AnsiString | DataType::AnsiStringFixedLength => {
            sized(spec, "VARCHAR", MAX_VARCHAR)?
        }
        DataType::Binary => sized(spec, "VARBINARY", MAX_VARCHAR)?,
        DataType::Guid => "VARCHAR(36)".to_string(),
        DataType::DateTime | DataType::DateTimeOffset | DataType::Timestamp => {
            "TIMESTAMP".to_string()
        }
        DataType::Json => "JSON".to_string(),
        DataType::Date | DataType::Time => {
            return Err(unsupported_type(crate::dialect::NAME, spec));
        }
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlweave_core::DialectErrorKind;

    #[test]
    fn test_strings_pick_nchar_or_varchar() {
        assert_eq!(
            column_type(&TypeSpec::new(DataType::String).length(20)).unwrap(),
            "NCHAR(20)"
        );
        assert_eq!(
            column_type(&TypeSpec::new(DataType::AnsiString)).unwrap(),
            "VARCHAR(255)"
        );
        assert_eq!(column_type(&TypeSpec::new(DataType::Guid)).unwrap(), "VARCHAR(36)");
    }

    #[test]
    fn test_unsigned_types_keep_their_width() {
        assert_eq!(
            column_type(&TypeSpec::new(DataType::UInt64)).unwrap(),
            "BIGINT UNSIGNED"
        );
        assert_eq!(TsdbType::of(DataType::Byte), Some(TsdbType::UTinyInt));
    }

    #[test]
    fn test_calendar_types_are_unsupported() {
        for data_type in [DataType::Date, DataType::Time] {
            let err = column_type(&TypeSpec::new(data_type)).unwrap_err();
            assert_eq!(err.dialect_kind(), Some(DialectErrorKind::UnsupportedType));
            assert_eq!(TsdbType::of(data_type), None);
        }
    }

    #[test]
    fn test_oversized_columns_are_refused() {
        let err = column_type(&TypeSpec::new(DataType::String).length(MAX_NCHAR + 1)).unwrap_err();
        assert_eq!(err.dialect_kind(), Some(DialectErrorKind::UnsupportedType));
        let err = column_type(&TypeSpec::new(DataType::Decimal).precision(40, 2)).unwrap_err();
        assert_eq!(err.dialect_kind(), Some(DialectErrorKind::UnsupportedType));
    }

    #[test]
    fn test_every_stored_type_has_a_column_type() {
        for data_type in DataType::ALL {
            assert_eq!(
                TsdbType::of(data_type).is_some(),
                column_type(&TypeSpec::new(data_type)).is_ok(),
                "{data_type:?}"
            );
        }
    }
}
