//! PostgreSQL error translation by SQLSTATE.
//!
//! Class 23 integrity violations and class 22 data exceptions become
//! structured errors; serialization failures, deadlocks and lock timeouts
//! become conflicts. The error fields the server sends (constraint, table,
//! column) are preferred over message parsing.

use sqlweave_core::{ConstraintKind, Error, Parameter, QueryError};
use sqlweave_query::translate::{Violation, data_argument, data_conflict, native};
use sqlweave_query::{ErrorContext, MessagePattern};

pub const UNIQUE_VIOLATION: &str = "23505";
pub const NOT_NULL_VIOLATION: &str = "23502";
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
pub const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";
pub const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
pub const INVALID_DATETIME_FORMAT: &str = "22007";
pub const DATETIME_FIELD_OVERFLOW: &str = "22008";
pub const INVALID_TEXT_REPRESENTATION: &str = "22P02";
pub const SERIALIZATION_FAILURE: &str = "40001";
pub const DEADLOCK_DETECTED: &str = "40P01";
pub const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Columns of an index, in key order.
const INDEX_COLUMNS: &str = "SELECT a.attname FROM pg_index i \
     JOIN pg_class c ON c.oid = i.indexrelid \
     JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
     WHERE c.relname = $1 \
     ORDER BY array_position(i.indkey::int2[], a.attnum)";

static UNIQUE: MessagePattern =
    MessagePattern::new(r#"unique constraint "(?P<key>[^"]+)""#);
static KEY_DETAIL: MessagePattern =
    MessagePattern::new(r"Key \((?P<columns>.*)\)=\((?P<value>.*)\)");
static COLUMN: MessagePattern = MessagePattern::new(r#"column "(?P<column>[^"]+)""#);

/// Translate a PostgreSQL error; anything unrecognized is returned unchanged.
pub fn translate(cx: &mut ErrorContext<'_>, error: Error) -> Error {
    let Some(query) = native(&error) else {
        return error;
    };
    let Some(sqlstate) = query.sqlstate.as_deref() else {
        return error;
    };
    let translated = match sqlstate {
        UNIQUE_VIOLATION => unique_violation(cx, query),
        NOT_NULL_VIOLATION
        | STRING_DATA_RIGHT_TRUNCATION
        | NUMERIC_VALUE_OUT_OF_RANGE
        | INVALID_DATETIME_FORMAT
        | DATETIME_FIELD_OVERFLOW
        | INVALID_TEXT_REPRESENTATION => {
            let field = query
                .column
                .clone()
                .or_else(|| COLUMN.group(&query.message, "column"))
                .map(|column| cx.field_name(&column));
            Some(data_argument(query, field))
        }
        FOREIGN_KEY_VIOLATION | SERIALIZATION_FAILURE | DEADLOCK_DETECTED
        | LOCK_NOT_AVAILABLE => Some(data_conflict(query)),
        _ => None,
    };
    match translated {
        Some(translated) => {
            tracing::debug!(sqlstate, error = %translated, "Translated PostgreSQL error");
            translated
        }
        None => error,
    }
}

fn unique_violation(cx: &mut ErrorContext<'_>, query: &QueryError) -> Option<Error> {
    let key = query
        .constraint
        .clone()
        .or_else(|| UNIQUE.group(&query.message, "key"))?;
    let kind = if key.ends_with("_pkey") {
        ConstraintKind::PrimaryKey
    } else {
        ConstraintKind::Unique
    };
    let detail = query.detail.as_deref().unwrap_or_default();
    let value = KEY_DETAIL.group(detail, "value");

    let mut fields = cx.key_fields(
        INDEX_COLUMNS,
        vec![Parameter::new("index").with_value(key.as_str())],
    );
    if fields.is_empty() {
        // No introspection: the detail line lists the key columns.
        if let Some(columns) = KEY_DETAIL.group(detail, "columns") {
            fields = columns
                .split(',')
                .map(|c| cx.field_name(c.trim().trim_matches('"')))
                .collect();
        }
    }
    Some(
        Violation {
            kind,
            key,
            value,
            table: query.table.clone().or_else(|| cx.table()),
            fields,
        }
        .into_error(query.code),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postgres(sqlstate: &str, message: &str) -> QueryError {
        QueryError::native(None, Some(sqlstate), message)
    }

    #[test]
    fn test_unique_from_message_and_detail() {
        let mut query = postgres(
            UNIQUE_VIOLATION,
            "duplicate key value violates unique constraint \"people_email_key\"",
        );
        query.detail = Some("Key (email)=(ada@example.com) already exists.".to_string());
        let err = translate(&mut ErrorContext::new(), Error::Query(query));
        let Error::DataConstraint(violation) = err else {
            panic!("expected a constraint violation");
        };
        assert_eq!(violation.kind, ConstraintKind::Unique);
        assert_eq!(violation.key, "people_email_key");
        assert_eq!(violation.value.as_deref(), Some("ada@example.com"));
        assert_eq!(violation.fields, vec!["email".to_string()]);
    }

    #[test]
    fn test_primary_key_from_constraint_field() {
        let mut query = postgres(UNIQUE_VIOLATION, "duplicate key value");
        query.constraint = Some("orders_pkey".to_string());
        query.table = Some("orders".to_string());
        query.detail = Some("Key (id, line)=(1, 2) already exists.".to_string());
        let err = translate(&mut ErrorContext::new(), Error::Query(query));
        let Error::DataConstraint(violation) = err else {
            panic!("expected a constraint violation");
        };
        assert_eq!(violation.kind, ConstraintKind::PrimaryKey);
        assert_eq!(violation.table.as_deref(), Some("orders"));
        assert_eq!(violation.fields, vec!["id".to_string(), "line".to_string()]);
    }

    #[test]
    fn test_not_null_names_the_column() {
        let err = translate(
            &mut ErrorContext::new(),
            Error::Query(postgres(
                NOT_NULL_VIOLATION,
                "null value in column \"name\" of relation \"people\" violates not-null constraint",
            )),
        );
        assert!(matches!(err, Error::DataArgument(a) if a.field.as_deref() == Some("name")));
    }

    #[test]
    fn test_conflicts_and_passthrough() {
        for sqlstate in [FOREIGN_KEY_VIOLATION, SERIALIZATION_FAILURE, DEADLOCK_DETECTED] {
            let err = translate(&mut ErrorContext::new(), Error::Query(postgres(sqlstate, "x")));
            assert!(matches!(err, Error::DataConflict(_)), "{sqlstate}");
        }
        let err = translate(
            &mut ErrorContext::new(),
            Error::Query(postgres("42P01", "relation \"x\" does not exist")),
        );
        assert!(matches!(err, Error::Query(_)));
    }
}
