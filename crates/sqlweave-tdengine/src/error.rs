//! TDengine error translation.
//!
//! TDengine enforces no unique or foreign keys (a repeated timestamp
//! overwrites its row), so nothing maps to `DataConstraint`. Error codes
//! moved between the 2.x and 3.x servers while the message texts stayed
//! put, so errors are classified by message.

use sqlweave_core::Error;
use sqlweave_query::ErrorContext;
use sqlweave_query::MessagePattern;
use sqlweave_query::translate::{data_argument, data_conflict, native};

/// A value that does not fit its column or tag; names the column.
static TOO_LONG: MessagePattern =
    MessagePattern::new(r"(?i)value too long for column/tag:?\s*(?P<column>\w+)?");

/// Other rejected values.
static BAD_VALUE: MessagePattern = MessagePattern::new(
    r"(?i)timestamp data out of range|primary (?:timestamp|key) column (?:can ?not|should not) be null|invalid timestamp",
);

/// Contention the caller may retry.
static CONFLICT: MessagePattern = MessagePattern::new(
    r"(?i)conflict transaction|write conflict|sync leader is restoring|vnode is busy|out of memory in (?:rpc|write) queue",
);

/// Translate a TDengine error; anything unrecognized is returned unchanged.
pub fn translate(cx: &mut ErrorContext<'_>, error: Error) -> Error {
    let Some(query) = native(&error) else {
        return error;
    };
    let translated = if let Some(captures) = TOO_LONG.captures(&query.message) {
        let field = captures
            .name("column")
            .map(|column| cx.field_name(column.as_str()));
        Some(data_argument(query, field))
    } else if BAD_VALUE.captures(&query.message).is_some() {
        Some(data_argument(query, None))
    } else if CONFLICT.captures(&query.message).is_some() {
        Some(data_conflict(query))
    } else {
        None
    };
    match translated {
        Some(translated) => {
            tracing::debug!(code = ?query.code, error = %translated, "Translated TDengine error");
            translated
        }
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlweave_core::QueryError;

    fn failed(message: &str) -> Error {
        Error::Query(QueryError::native(Some(0x2653), None, message))
    }

    #[test]
    fn test_too_long_names_the_column() {
        let mut cx = ErrorContext::new();
        let Error::DataArgument(argument) =
            translate(&mut cx, failed("Value too long for column/tag: location"))
        else {
            panic!("expected a data argument error");
        };
        assert_eq!(argument.field.as_deref(), Some("location"));
        assert_eq!(argument.code, Some(0x2653));
    }

    #[test]
    fn test_null_timestamp_is_an_argument_error() {
        let mut cx = ErrorContext::new();
        let error = translate(&mut cx, failed("Primary timestamp column cannot be null"));
        assert!(matches!(error, Error::DataArgument(ref a) if a.field.is_none()));
    }

    #[test]
    fn test_contention_is_a_conflict() {
        let mut cx = ErrorContext::new();
        let error = translate(&mut cx, failed("Sync leader is restoring"));
        assert!(matches!(error, Error::DataConflict(_)));
    }

    #[test]
    fn test_unknown_errors_pass_through() {
        let mut cx = ErrorContext::new();
        let error = translate(&mut cx, failed("Table does not exist"));
        assert!(matches!(error, Error::Query(_)));
        let error = translate(&mut cx, Error::Custom("boom".to_string()));
        assert!(matches!(error, Error::Custom(_)));
    }
}
