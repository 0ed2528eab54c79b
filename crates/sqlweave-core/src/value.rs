//! Dynamic SQL values.

use serde::{Deserialize, Serialize};

use crate::error::{Error, TypeError};
use crate::types::DataType;

/// A dynamically-typed SQL value.
///
/// Values flow through property tokens, bound parameters and bulk import
/// rows. `Value::coerce` converts a value to the representation a canonical
/// `DataType` expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 8-bit signed integer
    TinyInt(i8),

    /// 16-bit signed integer
    SmallInt(i16),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// Arbitrary precision decimal (stored as string)
    Decimal(String),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Date (days since epoch)
    Date(i32),

    /// Time (microseconds since midnight)
    Time(i64),

    /// Timestamp (microseconds since epoch)
    Timestamp(i64),

    /// Timestamp with offset: microseconds since epoch in local time plus
    /// the offset from UTC in seconds.
    TimestampTz(i64, i32),

    /// UUID (as 16 bytes)
    Uuid([u8; 16]),

    /// JSON value
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::TinyInt(_) => "TINYINT",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "REAL",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::TimestampTz(..) => "TIMESTAMPTZ",
            Value::Uuid(_) => "UUID",
            Value::Json(_) => "JSON",
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::TinyInt(v) => Some(*v != 0),
            Value::SmallInt(v) => Some(*v != 0),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(i64::from(*v)),
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            Value::Text(s) | Value::Decimal(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::TinyInt(v) => Some(f64::from(*v)),
            Value::SmallInt(v) => Some(f64::from(*v)),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            Value::Decimal(s) | Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// True when the value is text containing characters outside ASCII.
    pub fn has_non_ascii_text(&self) -> bool {
        matches!(self, Value::Text(s) if !s.is_ascii())
    }

    /// Coerce this value into the representation expected by `ty`.
    ///
    /// NULL passes through unchanged. Narrowing integer conversions fail
    /// instead of truncating.
    #[allow(clippy::result_large_err, clippy::cast_possible_truncation)]
    pub fn coerce(self, ty: DataType) -> crate::Result<Value> {
        if self.is_null() {
            return Ok(self);
        }
        let mismatch = |expected: &'static str, value: &Value| {
            Error::Type(TypeError {
                expected,
                actual: value.type_name().to_string(),
                column: None,
            })
        };
        let out = match ty {
            DataType::Boolean => match self.as_bool() {
                Some(b) => Value::Bool(b),
                None => return Err(mismatch("bool", &self)),
            },
            DataType::Byte | DataType::SByte => {
                let v = self.as_i64().ok_or_else(|| mismatch("i8", &self))?;
                Value::TinyInt(i8::try_from(v).map_err(|_| mismatch("i8", &self))?)
            }
            DataType::Int16 | DataType::UInt16 => {
                let v = self.as_i64().ok_or_else(|| mismatch("i16", &self))?;
                Value::SmallInt(i16::try_from(v).map_err(|_| mismatch("i16", &self))?)
            }
            DataType::Int32 | DataType::UInt32 => {
                let v = self.as_i64().ok_or_else(|| mismatch("i32", &self))?;
                Value::Int(i32::try_from(v).map_err(|_| mismatch("i32", &self))?)
            }
            DataType::Int64 | DataType::UInt64 => {
                Value::BigInt(self.as_i64().ok_or_else(|| mismatch("i64", &self))?)
            }
            DataType::Single => {
                Value::Float(self.as_f64().ok_or_else(|| mismatch("f32", &self))? as f32)
            }
            DataType::Double => Value::Double(self.as_f64().ok_or_else(|| mismatch("f64", &self))?),
            DataType::Decimal | DataType::Currency => match self {
                Value::Decimal(_) => self,
                Value::Text(s) => Value::Decimal(s),
                ref other => match other.as_f64() {
                    Some(_) if other.as_i64().is_some() => {
                        Value::Decimal(other.as_i64().unwrap_or_default().to_string())
                    }
                    Some(f) => Value::Decimal(f.to_string()),
                    None => return Err(mismatch("decimal", other)),
                },
            },
            DataType::String
            | DataType::StringFixedLength
            | DataType::AnsiString
            | DataType::AnsiStringFixedLength => match self {
                Value::Text(_) => self,
                Value::Decimal(s) => Value::Text(s),
                Value::Bool(b) => Value::Text(b.to_string()),
                Value::Json(j) => Value::Text(j.to_string()),
                ref other => match other.as_i64() {
                    Some(i) => Value::Text(i.to_string()),
                    None => match other.as_f64() {
                        Some(f) => Value::Text(f.to_string()),
                        None => return Err(mismatch("text", other)),
                    },
                },
            },
            DataType::Binary => match self {
                Value::Bytes(_) => self,
                Value::Text(s) => Value::Bytes(s.into_bytes()),
                Value::Uuid(u) => Value::Bytes(u.to_vec()),
                other => return Err(mismatch("bytes", &other)),
            },
            DataType::Date => match self {
                Value::Date(_) => self,
                Value::Timestamp(us) => Value::Date(days_from_micros(us)),
                Value::TimestampTz(us, offset) => {
                    Value::Date(days_from_micros(us - i64::from(offset) * 1_000_000))
                }
                other => return Err(mismatch("date", &other)),
            },
            DataType::Time => match self {
                Value::Time(_) => self,
                other => return Err(mismatch("time", &other)),
            },
            DataType::DateTime | DataType::Timestamp => match self {
                Value::Timestamp(_) => self,
                Value::TimestampTz(us, offset) => {
                    Value::Timestamp(us - i64::from(offset) * 1_000_000)
                }
                Value::Date(days) => Value::Timestamp(i64::from(days) * MICROS_PER_DAY),
                Value::BigInt(us) => Value::Timestamp(us),
                other => return Err(mismatch("timestamp", &other)),
            },
            DataType::DateTimeOffset => match self {
                Value::TimestampTz(..) => self,
                Value::Timestamp(us) => Value::TimestampTz(us, 0),
                other => return Err(mismatch("timestamp with offset", &other)),
            },
            DataType::Guid => match self {
                Value::Uuid(_) => self,
                Value::Bytes(b) if b.len() == 16 => {
                    let mut arr = [0u8; 16];
                    arr.copy_from_slice(&b);
                    Value::Uuid(arr)
                }
                other => return Err(mismatch("UUID", &other)),
            },
            DataType::Json => match self {
                Value::Json(_) => self,
                Value::Text(s) => serde_json::from_str(&s).map(Value::Json).map_err(|e| {
                    Error::Type(TypeError {
                        expected: "valid JSON",
                        actual: format!("invalid JSON: {}", e),
                        column: None,
                    })
                })?,
                other => return Err(mismatch("JSON", &other)),
            },
        };
        Ok(out)
    }

    /// Render this value as plain text for flat-file import.
    ///
    /// Returns `None` for NULL so the caller can write its own sentinel.
    pub fn to_plain_text(&self) -> Option<String> {
        let text = match self {
            Value::Null => return None,
            Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
            Value::TinyInt(v) => v.to_string(),
            Value::SmallInt(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Decimal(s) | Value::Text(s) => s.clone(),
            Value::Bytes(b) => b.iter().map(|byte| format!("{:02x}", byte)).collect(),
            Value::Date(days) => format_date(*days),
            Value::Time(us) => format_time(*us),
            Value::Timestamp(us) => format_timestamp(*us),
            Value::TimestampTz(us, offset) => {
                format_timestamp(*us - i64::from(*offset) * 1_000_000)
            }
            Value::Uuid(u) => format_uuid(u),
            Value::Json(j) => j.to_string(),
        };
        Some(text)
    }
}

const MICROS_PER_DAY: i64 = 86_400_000_000;

fn days_from_micros(us: i64) -> i32 {
    i32::try_from(us.div_euclid(MICROS_PER_DAY)).unwrap_or(i32::MAX)
}

// Howard Hinnant's civil_from_days.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn format_date(days: i32) -> String {
    let (y, m, d) = civil_from_days(i64::from(days));
    format!("{:04}-{:02}-{:02}", y, m, d)
}

fn format_time(us: i64) -> String {
    let secs = us.div_euclid(1_000_000);
    let frac = us.rem_euclid(1_000_000);
    let (h, rem) = (secs / 3600, secs % 3600);
    if frac == 0 {
        format!("{:02}:{:02}:{:02}", h, rem / 60, rem % 60)
    } else {
        format!("{:02}:{:02}:{:02}.{:06}", h, rem / 60, rem % 60, frac)
    }
}

fn format_timestamp(us: i64) -> String {
    let days = us.div_euclid(MICROS_PER_DAY);
    let in_day = us.rem_euclid(MICROS_PER_DAY);
    let (y, m, d) = civil_from_days(days);
    format!("{:04}-{:02}-{:02} {}", y, m, d, format_time(in_day))
}

fn format_uuid(u: &[u8; 16]) -> String {
    let hex: String = u.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::SmallInt(i16::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

// TryFrom implementations for extracting values

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_bool().ok_or_else(|| {
            Error::Type(TypeError {
                expected: "bool",
                actual: value.type_name().to_string(),
                column: None,
            })
        })
    }
}

macro_rules! try_from_integer {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl TryFrom<Value> for $ty {
                type Error = Error;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    value
                        .as_i64()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| {
                            Error::Type(TypeError {
                                expected: $name,
                                actual: value.type_name().to_string(),
                                column: None,
                            })
                        })
                }
            }
        )*
    };
}

try_from_integer!(i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64", u8 => "u8", u16 => "u16", u32 => "u32");

impl TryFrom<Value> for f32 {
    type Error = Error;

    #[allow(clippy::cast_possible_truncation)]
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float(v) => Ok(v),
            other => other.as_f64().map(|v| v as f32).ok_or_else(|| {
                Error::Type(TypeError {
                    expected: "f32",
                    actual: other.type_name().to_string(),
                    column: None,
                })
            }),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_f64().ok_or_else(|| {
            Error::Type(TypeError {
                expected: "f64",
                actual: value.type_name().to_string(),
                column: None,
            })
        })
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Decimal(v) => Ok(v),
            other => Err(Error::Type(TypeError {
                expected: "String",
                actual: other.type_name().to_string(),
                column: None,
            })),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bytes(v) => Ok(v),
            Value::Text(v) => Ok(v.into_bytes()),
            other => Err(Error::Type(TypeError {
                expected: "Vec<u8>",
                actual: other.type_name().to_string(),
                column: None,
            })),
        }
    }
}

/// TryFrom for `Option<T>` - returns None for Null, tries to convert otherwise
impl<T> TryFrom<Value> for Option<T>
where
    T: TryFrom<Value, Error = Error>,
{
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(None),
            v => T::try_from(v).map(Some),
        }
    }
}
