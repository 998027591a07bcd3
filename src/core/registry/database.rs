//! Classification of database-layer failures by driver message.
//!
//! Database drivers surface constraint violations as server message strings;
//! the patterns below cover the PostgreSQL, MySQL and SQLite wordings for
//! uniqueness, foreign-key, not-null and check constraint failures.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ConversionContext, ConverterRegistry};
use crate::core::taxonomy::{ErrorCode, ErrorDetail};

/// Wrapper carrying a database driver's error message through the
/// conversion boundary
#[derive(Debug, Clone)]
pub struct DatabaseFailure {
    message: String,
}

impl DatabaseFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DatabaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "database failure: {}", self.message)
    }
}

impl std::error::Error for DatabaseFailure {}

static SQL_PATTERNS: Lazy<Vec<(Regex, ErrorCode, &'static str)>> = Lazy::new(|| {
    vec![
        // PostgreSQL
        (
            Regex::new(r"duplicate key value violates unique constraint").unwrap(),
            ErrorCode::DATABASE_CONFLICT,
            "Record already exists",
        ),
        (
            Regex::new(r"violates foreign key constraint").unwrap(),
            ErrorCode::DATABASE_INVALID_REFERENCE,
            "Invalid reference to related record",
        ),
        (
            Regex::new(r"violates not-null constraint").unwrap(),
            ErrorCode::DATABASE_MISSING_REQUIRED,
            "Required field is missing",
        ),
        (
            Regex::new(r"violates check constraint").unwrap(),
            ErrorCode::DATABASE_CONSTRAINT_VIOLATION,
            "Value violates constraint",
        ),
        // MySQL
        (
            Regex::new(r"Duplicate entry .* for key").unwrap(),
            ErrorCode::DATABASE_CONFLICT,
            "Record already exists",
        ),
        (
            Regex::new(r"Cannot add or update a child row: a foreign key constraint fails")
                .unwrap(),
            ErrorCode::DATABASE_INVALID_REFERENCE,
            "Invalid reference to related record",
        ),
        (
            Regex::new(r"Column .* cannot be null").unwrap(),
            ErrorCode::DATABASE_MISSING_REQUIRED,
            "Required field is missing",
        ),
        // SQLite
        (
            Regex::new(r"UNIQUE constraint failed").unwrap(),
            ErrorCode::DATABASE_CONFLICT,
            "Record already exists",
        ),
        (
            Regex::new(r"FOREIGN KEY constraint failed").unwrap(),
            ErrorCode::DATABASE_INVALID_REFERENCE,
            "Invalid reference to related record",
        ),
        (
            Regex::new(r"NOT NULL constraint failed").unwrap(),
            ErrorCode::DATABASE_MISSING_REQUIRED,
            "Required field is missing",
        ),
    ]
});

static TABLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"relation "([^"]+)""#).unwrap(),
        Regex::new(r"`[^`]+`\.`([^`]+)`").unwrap(),
        Regex::new(r"table (\w+)").unwrap(),
    ]
});

static FIELD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"column "([^"]+)""#).unwrap(),
        Regex::new(r"Column '([^']+)'").unwrap(),
        Regex::new(r"column (\w+)").unwrap(),
        // SQLite qualifies the column as table.column
        Regex::new(r"constraint failed: \w+\.(\w+)").unwrap(),
    ]
});

static CONSTRAINT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"constraint "([^"]+)""#).unwrap(),
        Regex::new(r"key '([^']+)'").unwrap(),
    ]
});

static DUPLICATE_VALUE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"Key \([^)]+\)=\(([^)]+)\)").unwrap(),
        Regex::new(r"Duplicate entry '([^']+)'").unwrap(),
    ]
});

pub(super) fn register(registry: &mut ConverterRegistry) {
    registry.register::<DatabaseFailure, _>(convert);
}

fn convert(failure: &DatabaseFailure, ctx: &ConversionContext) -> ErrorDetail {
    let message = failure.message();

    for (pattern, code, template) in SQL_PATTERNS.iter() {
        if pattern.is_match(message) {
            return classified(code.clone(), template, message, ctx);
        }
    }

    if message.to_lowercase().contains("connection") {
        return with_debug_context(
            ErrorDetail::new(ErrorCode::DATABASE_CONNECTION_ERROR, "Database connection error"),
            message,
            ctx,
        );
    }

    with_debug_context(
        ErrorDetail::new(ErrorCode::DATABASE_QUERY_ERROR, "Database error occurred"),
        message,
        ctx,
    )
}

fn classified(
    code: ErrorCode,
    template: &str,
    message: &str,
    ctx: &ConversionContext,
) -> ErrorDetail {
    let field = first_capture(&FIELD_PATTERNS, message);

    let rendered = match (&code, &field) {
        (c, Some(f)) if *c == ErrorCode::DATABASE_CONFLICT => {
            match first_capture(&DUPLICATE_VALUE_PATTERNS, message) {
                Some(value) => format!("{}: {}={}", template, f, value),
                None => format!("{}: {}", template, f),
            }
        }
        (_, Some(f)) => format!("{}: {}", template, f),
        _ => template.to_string(),
    };

    let mut detail = ErrorDetail::new(code.clone(), rendered);

    if let Some(f) = &field {
        detail = detail.with_field(f.as_str()).with_context("field", f.as_str());
    }
    if let Some(table) = first_capture(&TABLE_PATTERNS, message) {
        detail = detail.with_context("table", table);
    }
    if let Some(constraint) = first_capture(&CONSTRAINT_PATTERNS, message) {
        detail = detail.with_context("constraint", constraint);
    }
    if code == ErrorCode::DATABASE_CONFLICT {
        if let Some(value) = first_capture(&DUPLICATE_VALUE_PATTERNS, message) {
            detail = detail.with_context("duplicate_value", value);
        }
    }

    with_debug_context(detail, message, ctx)
}

// The raw driver message can quote row data; only attach it in debug mode
fn with_debug_context(detail: ErrorDetail, message: &str, ctx: &ConversionContext) -> ErrorDetail {
    if ctx.debug {
        detail.with_context("sql_error", message)
    } else {
        detail
    }
}

fn first_capture(patterns: &[Regex], message: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|p| p.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::taxonomy::ContextValue;

    fn convert_message(message: &str) -> ErrorDetail {
        convert(&DatabaseFailure::new(message), &ConversionContext::default())
    }

    #[test]
    fn test_postgres_unique_violation_is_conflict() {
        let detail = convert_message(
            r#"duplicate key value violates unique constraint "users_email_key" Key (email)=(user@example.com) already exists."#,
        );
        assert_eq!(detail.code, ErrorCode::DATABASE_CONFLICT);
        assert_eq!(detail.http_status, 409);
        assert_eq!(
            detail.context.get("duplicate_value"),
            Some(&ContextValue::String("user@example.com".to_string()))
        );
    }

    #[test]
    fn test_mysql_duplicate_entry_is_conflict() {
        let detail =
            convert_message("Duplicate entry 'user@example.com' for key 'users.email_unique'");
        assert_eq!(detail.code, ErrorCode::DATABASE_CONFLICT);
        assert_eq!(detail.http_status, 409);
    }

    #[test]
    fn test_sqlite_not_null_extracts_field() {
        let detail = convert_message("NOT NULL constraint failed: users.email");
        assert_eq!(detail.code, ErrorCode::DATABASE_MISSING_REQUIRED);
        assert_eq!(detail.http_status, 422);
        assert_eq!(detail.field.as_deref(), Some("email"));
    }

    #[test]
    fn test_foreign_key_violation() {
        let detail = convert_message(
            r#"insert or update on table "orders" violates foreign key constraint "orders_user_id_fkey""#,
        );
        assert_eq!(detail.code, ErrorCode::DATABASE_INVALID_REFERENCE);
        assert_eq!(
            detail.context.get("constraint"),
            Some(&ContextValue::String("orders_user_id_fkey".to_string()))
        );
    }

    #[test]
    fn test_connection_failure() {
        let detail = convert_message("could not translate host name, connection refused");
        assert_eq!(detail.code, ErrorCode::DATABASE_CONNECTION_ERROR);
    }

    #[test]
    fn test_unrecognized_message_is_query_error() {
        let detail = convert_message("syntax error at or near SELECT");
        assert_eq!(detail.code, ErrorCode::DATABASE_QUERY_ERROR);
        // Raw SQL stays out of the response unless debug is on
        assert!(!detail.context.contains_key("sql_error"));
    }

    #[test]
    fn test_debug_attaches_raw_message() {
        let detail = convert(
            &DatabaseFailure::new("syntax error"),
            &ConversionContext { debug: true },
        );
        assert!(detail.context.contains_key("sql_error"));
    }
}
