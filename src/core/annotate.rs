//! Wrapper-style entry points for operation handlers. `guard` converts any
//! handler failure into the canonical response shape; `documented` pairs a
//! handler's entry point with its inferred error documentation so the two
//! can never drift apart.

use std::error::Error as StdError;

use tracing::debug;

use super::docs::SchemaFragment;
use super::engine::Engine;
use crate::core::taxonomy::{ErrorCode, ErrorResponse};

/// Run a fallible operation and normalize its failure. The success value
/// passes through untouched; any error is converted through the engine's
/// registry into an `ErrorResponse`.
pub fn guard<T, E, F>(engine: &Engine, operation: &str, f: F) -> Result<T, ErrorResponse>
where
    E: StdError + 'static,
    F: FnOnce() -> Result<T, E>,
{
    match f() {
        Ok(value) => Ok(value),
        Err(failure) => {
            debug!(operation, failure = %failure, "operation failed, converting");
            Err(engine.convert(&failure))
        }
    }
}

/// An entry point together with its inferred error documentation
#[derive(Debug, Clone)]
pub struct DocumentedOperation {
    pub entry: String,
    /// Inferred plus declared codes, lexicographic
    pub codes: Vec<ErrorCode>,
    pub fragment: SchemaFragment,
}

/// Analyze an entry point and bundle the result with its schema fragment.
/// `additional` declares codes the analysis cannot see, for example codes
/// raised by middleware outside the handler's call graph; they are unioned
/// with the inferred set.
pub fn documented(engine: &Engine, entry: &str, additional: &[ErrorCode]) -> DocumentedOperation {
    let fragment = engine.document(&[entry], additional);
    let mut codes: Vec<ErrorCode> = engine
        .analyze(entry)
        .reachable_codes
        .iter()
        .cloned()
        .chain(additional.iter().cloned())
        .collect();
    codes.sort();
    codes.dedup();

    DocumentedOperation {
        entry: entry.to_string(),
        codes,
        fragment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::registry::ValidationFailure;

    fn engine() -> Engine {
        let src = r#"
            fn update_profile() {
                let e = ValidationFailure::new("name", "too long");
            }
        "#;
        Engine::from_sources(Config::default(), [("src/profile.rs", src)]).unwrap()
    }

    #[test]
    fn test_guard_passes_success_through() {
        let engine = engine();
        let out = guard(&engine, "update_profile", || {
            Ok::<_, ValidationFailure>(42)
        });
        assert_eq!(out.unwrap(), 42);
    }

    #[test]
    fn test_guard_converts_failure() {
        let engine = engine();
        let out: Result<(), _> = guard(&engine, "update_profile", || {
            Err(ValidationFailure::new("name", "too long"))
        });

        let response = out.unwrap_err();
        assert_eq!(response.http_status(), 400);
        assert_eq!(response.details[0].code, ErrorCode::VALIDATION_ERROR);
    }

    #[test]
    fn test_documented_unions_declared_codes() {
        let engine = engine();
        let op = documented(&engine, "update_profile", &[ErrorCode::AUTH_REQUIRED]);

        assert_eq!(
            op.codes,
            vec![ErrorCode::AUTH_REQUIRED, ErrorCode::VALIDATION_ERROR]
        );
        assert!(op.fragment.operations["update_profile"]
            .responses
            .contains_key(&401));
    }

    #[test]
    fn test_documented_deduplicates_declared_overlap() {
        let engine = engine();
        let op = documented(&engine, "update_profile", &[ErrorCode::VALIDATION_ERROR]);
        assert_eq!(op.codes, vec![ErrorCode::VALIDATION_ERROR]);
    }
}
