//! Canonical data types.
//!
//! Every simplex property carries a `DataType`. Dialects render a
//! `DataType` plus length/precision/scale into the engine's native type name.

use serde::{Deserialize, Serialize};

/// Canonical, engine-independent column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,

    // Integer types
    Byte,
    SByte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,

    // Floating point
    Single,
    Double,

    // Fixed precision
    Decimal,
    Currency,

    // Unicode strings
    String,
    StringFixedLength,

    // Single-byte strings
    AnsiString,
    AnsiStringFixedLength,

    // Binary
    Binary,

    // Date/time types
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    /// Engine-native row timestamp (TDengine primary timestamp column)
    Timestamp,

    Guid,
    Json,
}

impl DataType {
    /// Every canonical type, in declaration order.
    pub const ALL: [DataType; 25] = [
        DataType::Boolean,
        DataType::Byte,
        DataType::SByte,
        DataType::Int16,
        DataType::UInt16,
        DataType::Int32,
        DataType::UInt32,
        DataType::Int64,
        DataType::UInt64,
        DataType::Single,
        DataType::Double,
        DataType::Decimal,
        DataType::Currency,
        DataType::String,
        DataType::StringFixedLength,
        DataType::AnsiString,
        DataType::AnsiStringFixedLength,
        DataType::Binary,
        DataType::Date,
        DataType::Time,
        DataType::DateTime,
        DataType::DateTimeOffset,
        DataType::Timestamp,
        DataType::Guid,
        DataType::Json,
    ];

    /// Canonical name, as used in metadata definitions and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::Boolean => "Boolean",
            DataType::Byte => "Byte",
            DataType::SByte => "SByte",
            DataType::Int16 => "Int16",
            DataType::UInt16 => "UInt16",
            DataType::Int32 => "Int32",
            DataType::UInt32 => "UInt32",
            DataType::Int64 => "Int64",
            DataType::UInt64 => "UInt64",
            DataType::Single => "Single",
            DataType::Double => "Double",
            DataType::Decimal => "Decimal",
            DataType::Currency => "Currency",
            DataType::String => "String",
            DataType::StringFixedLength => "StringFixedLength",
            DataType::AnsiString => "AnsiString",
            DataType::AnsiStringFixedLength => "AnsiStringFixedLength",
            DataType::Binary => "Binary",
            DataType::Date => "Date",
            DataType::Time => "Time",
            DataType::DateTime => "DateTime",
            DataType::DateTimeOffset => "DateTimeOffset",
            DataType::Timestamp => "Timestamp",
            DataType::Guid => "Guid",
            DataType::Json => "Json",
        }
    }

    /// Bit width for integer types, `None` otherwise.
    pub const fn integer_width(self) -> Option<u8> {
        match self {
            DataType::Byte | DataType::SByte => Some(8),
            DataType::Int16 | DataType::UInt16 => Some(16),
            DataType::Int32 | DataType::UInt32 => Some(32),
            DataType::Int64 | DataType::UInt64 => Some(64),
            _ => None,
        }
    }

    /// Check if this type is numeric.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::Byte
                | DataType::SByte
                | DataType::Int16
                | DataType::UInt16
                | DataType::Int32
                | DataType::UInt32
                | DataType::Int64
                | DataType::UInt64
                | DataType::Single
                | DataType::Double
                | DataType::Decimal
                | DataType::Currency
        )
    }

    /// Check if this type is text-based.
    pub const fn is_text(self) -> bool {
        matches!(
            self,
            DataType::String
                | DataType::StringFixedLength
                | DataType::AnsiString
                | DataType::AnsiStringFixedLength
        )
    }

    /// Single-byte character types (narrower than the engine's unicode types).
    pub const fn is_ansi(self) -> bool {
        matches!(
            self,
            DataType::AnsiString | DataType::AnsiStringFixedLength
        )
    }

    /// Check if this type is a date/time type.
    pub const fn is_temporal(self) -> bool {
        matches!(
            self,
            DataType::Date
                | DataType::Time
                | DataType::DateTime
                | DataType::DateTimeOffset
                | DataType::Timestamp
        )
    }

    /// Parse a canonical name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        DataType::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
