use std::error::Error as StdError;

use super::ConversionContext;
use crate::core::taxonomy::{ErrorCode, ErrorDetail};

/// Universal fallback for failures no converter matches.
///
/// Produces a single `INTERNAL_ERROR`/500 detail. The failure's message and
/// source chain are attached only in debug mode so unknown errors never leak
/// internals by default.
pub fn generic_error_handler(
    failure: &(dyn StdError + 'static),
    ctx: &ConversionContext,
) -> ErrorDetail {
    let mut detail = ErrorDetail::new(ErrorCode::INTERNAL_ERROR, "An internal error occurred");

    if ctx.debug {
        detail = detail.with_context("failure", failure.to_string());
        if let Some(source) = failure.source() {
            detail = detail.with_context("failure_source", source.to_string());
        }
    }

    detail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Opaque;

    impl std::fmt::Display for Opaque {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "secret internals")
        }
    }

    impl StdError for Opaque {}

    #[test]
    fn test_no_leak_without_debug() {
        let detail = generic_error_handler(&Opaque, &ConversionContext { debug: false });
        assert_eq!(detail.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(detail.http_status, 500);
        assert!(detail.context.is_empty());
    }

    #[test]
    fn test_debug_attaches_failure_message() {
        let detail = generic_error_handler(&Opaque, &ConversionContext { debug: true });
        assert!(detail.context.contains_key("failure"));
    }
}
