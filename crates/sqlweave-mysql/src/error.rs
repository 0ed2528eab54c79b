//! MySQL error translation.
//!
//! Native errors are classified by errno:
//!
//! | errno | meaning | result |
//! |-------|---------|--------|
//! | 1062 | duplicate entry | `DataConstraint` |
//! | 1048, 1364 | NULL / missing value for a NOT NULL column | `DataArgument` |
//! | 1406, 1264, 1366 | value too long, out of range, bad format | `DataArgument` |
//! | 1451, 1452 | foreign key parent/child missing | `DataConflict` |
//! | 1205, 1213 | lock wait timeout, deadlock | `DataConflict` |

use sqlweave_core::{ConstraintKind, Error, Parameter, QueryError};
use sqlweave_query::ErrorContext;
use sqlweave_query::MessagePattern;
use sqlweave_query::translate::{Violation, data_argument, data_conflict, native};

pub const ER_DUP_ENTRY: i32 = 1062;
pub const ER_BAD_NULL_ERROR: i32 = 1048;
pub const ER_NO_DEFAULT_FOR_FIELD: i32 = 1364;
pub const ER_DATA_TOO_LONG: i32 = 1406;
pub const ER_WARN_DATA_OUT_OF_RANGE: i32 = 1264;
pub const ER_TRUNCATED_WRONG_VALUE_FOR_FIELD: i32 = 1366;
pub const ER_ROW_IS_REFERENCED_2: i32 = 1451;
pub const ER_NO_REFERENCED_ROW_2: i32 = 1452;
pub const ER_LOCK_WAIT_TIMEOUT: i32 = 1205;
pub const ER_LOCK_DEADLOCK: i32 = 1213;

/// Name MySQL gives every primary key index.
const PRIMARY: &str = "PRIMARY";

/// Columns of an index, in key order.
const INDEX_COLUMNS: &str = "SELECT COLUMN_NAME FROM information_schema.STATISTICS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME = ? \
     ORDER BY SEQ_IN_INDEX";

static DUPLICATE: MessagePattern =
    MessagePattern::new(r"Duplicate entry '(?P<value>.*)' for key '(?P<key>[^']+)'");
static COLUMN: MessagePattern = MessagePattern::new(r"(?i)(?:column|field) '(?P<column>[^']+)'");

/// Translate a MySQL error; anything unrecognized is returned unchanged.
pub fn translate(cx: &mut ErrorContext<'_>, error: Error) -> Error {
    let Some(query) = native(&error) else {
        return error;
    };
    let Some(code) = query.code else {
        return error;
    };
    let translated = match code {
        ER_DUP_ENTRY => duplicate_entry(cx, query),
        ER_BAD_NULL_ERROR
        | ER_NO_DEFAULT_FOR_FIELD
        | ER_DATA_TOO_LONG
        | ER_WARN_DATA_OUT_OF_RANGE
        | ER_TRUNCATED_WRONG_VALUE_FOR_FIELD => {
            let field = COLUMN
                .group(&query.message, "column")
                .map(|column| cx.field_name(&column));
            Some(data_argument(query, field))
        }
        ER_ROW_IS_REFERENCED_2 | ER_NO_REFERENCED_ROW_2 | ER_LOCK_WAIT_TIMEOUT
        | ER_LOCK_DEADLOCK => Some(data_conflict(query)),
        _ => None,
    };
    match translated {
        Some(translated) => {
            tracing::debug!(code, error = %translated, "Translated MySQL error");
            translated
        }
        None => error,
    }
}

fn duplicate_entry(cx: &mut ErrorContext<'_>, query: &QueryError) -> Option<Error> {
    let captures = DUPLICATE.captures(&query.message)?;
    let value = captures.name("value").map(|m| m.as_str().to_string());
    let qualified = captures.name("key")?.as_str();
    // 8.0 reports `table.key`; older servers report just the key.
    let key = qualified
        .rsplit_once('.')
        .map_or(qualified, |(_, key)| key)
        .to_string();
    let kind = if key == PRIMARY {
        ConstraintKind::PrimaryKey
    } else {
        ConstraintKind::Unique
    };
    let table = cx.table();
    let fields = match &table {
        Some(table) => cx.key_fields(
            INDEX_COLUMNS,
            vec![
                Parameter::new("table").with_value(table.as_str()),
                Parameter::new("index").with_value(key.as_str()),
            ],
        ),
        None => Vec::new(),
    };
    Some(
        Violation {
            kind,
            key,
            value,
            table,
            fields,
        }
        .into_error(query.code),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mysql(code: i32, message: &str) -> Error {
        Error::Query(QueryError::native(Some(code), Some("23000"), message))
    }

    #[test]
    fn test_duplicate_without_context() {
        let err = translate(
            &mut ErrorContext::new(),
            mysql(1062, "Duplicate entry 'ada@example.com' for key 'people.ux_email'"),
        );
        let Error::DataConstraint(violation) = err else {
            panic!("expected a constraint violation");
        };
        assert_eq!(violation.kind, ConstraintKind::Unique);
        assert_eq!(violation.key, "ux_email");
        assert_eq!(violation.value.as_deref(), Some("ada@example.com"));
        assert!(violation.fields.is_empty());
        assert_eq!(violation.code, Some(1062));
    }

    #[test]
    fn test_primary_key() {
        let err = translate(
            &mut ErrorContext::new(),
            mysql(1062, "Duplicate entry '7' for key 'PRIMARY'"),
        );
        let Error::DataConstraint(violation) = err else {
            panic!("expected a constraint violation");
        };
        assert_eq!(violation.kind, ConstraintKind::PrimaryKey);
    }

    #[test]
    fn test_argument_errors_name_the_column() {
        let err = translate(
            &mut ErrorContext::new(),
            mysql(1406, "Data too long for column 'name' at row 1"),
        );
        let Error::DataArgument(argument) = err else {
            panic!("expected an argument error");
        };
        assert_eq!(argument.field.as_deref(), Some("name"));
        assert_eq!(argument.code, Some(1406));

        let err = translate(
            &mut ErrorContext::new(),
            mysql(1364, "Field 'email' doesn't have a default value"),
        );
        assert!(matches!(err, Error::DataArgument(a) if a.field.as_deref() == Some("email")));

        let err = translate(
            &mut ErrorContext::new(),
            mysql(1048, "Column 'total' cannot be null"),
        );
        assert!(matches!(err, Error::DataArgument(a) if a.field.as_deref() == Some("total")));
    }

    #[test]
    fn test_conflicts_and_passthrough() {
        let err = translate(
            &mut ErrorContext::new(),
            mysql(1213, "Deadlock found when trying to get lock"),
        );
        assert!(matches!(err, Error::DataConflict(_)));

        let err = translate(&mut ErrorContext::new(), mysql(1146, "Table 'x' doesn't exist"));
        assert!(matches!(err, Error::Query(_)));

        let err = translate(&mut ErrorContext::new(), Error::Cancelled);
        assert!(matches!(err, Error::Cancelled));
    }
}
