//! Converters for standard-library and serde failures.

use std::io;

use super::{ConversionContext, ConverterRegistry};
use crate::core::taxonomy::{ErrorCode, ErrorDetail};

pub(super) fn register(registry: &mut ConverterRegistry) {
    registry.register::<io::Error, _>(convert_io);

    registry.register::<std::num::ParseIntError, _>(|err, ctx| {
        invalid_input("Invalid numeric value", err, ctx)
    });
    registry.register::<std::num::ParseFloatError, _>(|err, ctx| {
        invalid_input("Invalid numeric value", err, ctx)
    });
    registry.register::<std::str::Utf8Error, _>(|err, ctx| {
        invalid_input("Invalid text encoding", err, ctx)
    });

    registry.register::<serde_json::Error, _>(|err, ctx| {
        let mut detail = ErrorDetail::new(ErrorCode::INVALID_FORMAT, "Invalid JSON format")
            .with_context("line", err.line() as i64)
            .with_context("column", err.column() as i64);
        if ctx.debug {
            detail = detail.with_context("failure", err.to_string());
        }
        detail
    });
}

fn convert_io(err: &io::Error, ctx: &ConversionContext) -> ErrorDetail {
    let (code, message) = match err.kind() {
        io::ErrorKind::NotFound => (ErrorCode::NOT_FOUND, "File not found"),
        io::ErrorKind::PermissionDenied => (ErrorCode::AUTH_PERMISSION_DENIED, "Permission denied"),
        io::ErrorKind::TimedOut => (ErrorCode::TIMEOUT, "Operation timed out"),
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => (ErrorCode::INTERNAL_ERROR, "Connection error"),
        _ => (ErrorCode::INTERNAL_ERROR, "IO error"),
    };

    let mut detail = ErrorDetail::new(code, message)
        .with_context("kind", format!("{:?}", err.kind()));
    if ctx.debug {
        detail = detail.with_context("failure", err.to_string());
    }
    detail
}

fn invalid_input(
    message: &str,
    err: &(impl std::error::Error + 'static),
    ctx: &ConversionContext,
) -> ErrorDetail {
    let mut detail = ErrorDetail::new(ErrorCode::INVALID_INPUT, message);
    if ctx.debug {
        detail = detail.with_context("failure", err.to_string());
    }
    detail
}
