//! Maps arbitrary runtime failures onto the canonical error shape.
//!
//! Converters are keyed by the failure's concrete type. Resolution walks the
//! failure's `source()` chain outermost-first, trying an exact type match at
//! each link, so a wrapped database failure still reaches the database
//! converter. `convert` never fails: a converter that panics degrades to the
//! generic fallback with a warning.

mod database;
mod generic;
mod stdlib;
mod validation;

pub use database::DatabaseFailure;
pub use generic::generic_error_handler;
pub use validation::{ValidationFailure, ValidationFailures};

use std::any::TypeId;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::config::ConversionConfig;
use crate::core::taxonomy::{
    default_http_status, ApiError, ContextValue, ErrorCode, ErrorDetail, ErrorResponse,
};
use crate::error::{FaultlineError, Result};

/// Per-conversion settings handed to converters
#[derive(Debug, Clone, Default)]
pub struct ConversionContext {
    /// Include failure internals in the produced detail
    pub debug: bool,
}

/// Default status and message template for an error code, used by the
/// documentation emitter
#[derive(Debug, Clone)]
pub struct CodeTemplate {
    pub http_status: u16,
    pub message: String,
}

type BoxedConverter =
    Box<dyn Fn(&(dyn StdError + 'static), &ConversionContext) -> Option<ErrorDetail> + Send + Sync>;

struct RegisteredConverter {
    type_id: TypeId,
    type_name: &'static str,
    convert: BoxedConverter,
}

/// Registry of failure-type converters plus the code metadata backing
/// generated documentation.
///
/// Registration is a configuration-time operation; lookups after setup are
/// read-only, so a populated registry can be shared behind an `Arc` without
/// locking.
pub struct ConverterRegistry {
    // Registration order is the tie-break when a source chain matches
    // several registered types at the same link
    converters: Vec<RegisteredConverter>,
    codes: BTreeMap<ErrorCode, CodeTemplate>,
    debug: bool,
    log_failures: bool,
}

impl ConverterRegistry {
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            converters: Vec::new(),
            codes: BTreeMap::new(),
            debug: config.debug,
            log_failures: config.log_failures,
        }
    }

    /// Registry pre-populated with the built-in converters and the
    /// canonical code metadata
    pub fn with_builtins(config: &ConversionConfig) -> Self {
        let mut registry = Self::new(config);

        registry.register::<ApiError, _>(|err, _ctx| err.detail());
        validation::register(&mut registry);
        database::register(&mut registry);
        stdlib::register(&mut registry);
        registry.register_builtin_codes();

        registry
    }

    /// Associate a failure type with a converter. Re-registering the same
    /// type replaces the prior converter (last-write-wins) with a warning.
    pub fn register<E, F>(&mut self, converter: F)
    where
        E: StdError + 'static,
        F: Fn(&E, &ConversionContext) -> ErrorDetail + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<E>();
        let type_name = std::any::type_name::<E>();
        let boxed: BoxedConverter = Box::new(move |failure, ctx| {
            failure.downcast_ref::<E>().map(|e| converter(e, ctx))
        });

        if let Some(existing) = self.converters.iter_mut().find(|c| c.type_id == type_id) {
            warn!(failure_type = type_name, "replacing registered converter");
            existing.convert = boxed;
        } else {
            self.converters.push(RegisteredConverter {
                type_id,
                type_name,
                convert: boxed,
            });
        }
    }

    /// Record the default status and message template for a code. A code
    /// must not map to two different statuses within one registry.
    pub fn register_code(
        &mut self,
        code: ErrorCode,
        http_status: u16,
        message: impl Into<String>,
    ) -> Result<()> {
        if !(100..=599).contains(&http_status) {
            return Err(FaultlineError::Registry(format!(
                "HTTP status {} for {} is outside [100, 599]",
                http_status, code
            )));
        }
        if let Some(existing) = self.codes.get(&code) {
            if existing.http_status != http_status {
                return Err(FaultlineError::Registry(format!(
                    "code {} already registered with status {}, refusing {}",
                    code, existing.http_status, http_status
                )));
            }
            return Ok(());
        }
        self.codes.insert(
            code,
            CodeTemplate {
                http_status,
                message: message.into(),
            },
        );
        Ok(())
    }

    /// Default HTTP status for a code: registered metadata first, then the
    /// canonical table, then 500
    pub fn status_for(&self, code: &ErrorCode) -> u16 {
        self.codes
            .get(code)
            .map(|t| t.http_status)
            .unwrap_or_else(|| default_http_status(code))
    }

    pub fn code_template(&self, code: &ErrorCode) -> Option<&CodeTemplate> {
        self.codes.get(code)
    }

    /// All registered codes, in lexicographic order
    pub fn known_codes(&self) -> impl Iterator<Item = &ErrorCode> {
        self.codes.keys()
    }

    /// Convert any failure into a well-formed response. Never fails.
    ///
    /// Resolution order: exact type match at each link of the `source()`
    /// chain, outermost first; first registered converter wins at a given
    /// link. No match anywhere degrades to the generic fallback.
    pub fn convert(&self, failure: &(dyn StdError + 'static)) -> ErrorResponse {
        let ctx = ConversionContext { debug: self.debug };

        let detail = self
            .resolve(failure, &ctx)
            .unwrap_or_else(|| generic_error_handler(failure, &ctx));

        if self.log_failures {
            warn!(
                code = %detail.code,
                http_status = detail.http_status,
                "converted failure: {}",
                failure
            );
        }

        let mut response = ErrorResponse::new(detail);
        if self.debug {
            let mut debug_map: BTreeMap<String, ContextValue> = BTreeMap::new();
            debug_map.insert("failure".to_string(), failure.to_string().into());
            let chain: Vec<String> = ErrorChain::new(failure).skip(1).map(|e| e.to_string()).collect();
            if !chain.is_empty() {
                debug_map.insert("failure_chain".to_string(), chain.join(" -> ").into());
            }
            response = response.with_debug(debug_map);
        }
        response
    }

    fn resolve(
        &self,
        failure: &(dyn StdError + 'static),
        ctx: &ConversionContext,
    ) -> Option<ErrorDetail> {
        for link in ErrorChain::new(failure) {
            for registered in &self.converters {
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| (registered.convert)(link, ctx)));
                match outcome {
                    Ok(Some(detail)) => return Some(detail),
                    Ok(None) => continue,
                    Err(_) => {
                        warn!(
                            failure_type = registered.type_name,
                            "converter panicked, falling back to generic handler"
                        );
                        return None;
                    }
                }
            }
        }
        None
    }

    fn register_builtin_codes(&mut self) {
        let builtin: &[(ErrorCode, u16, &str)] = &[
            (ErrorCode::VALIDATION_ERROR, 400, "Request validation failed"),
            (ErrorCode::INVALID_INPUT, 400, "Invalid value provided"),
            (ErrorCode::MISSING_REQUIRED_FIELD, 400, "Required field {field} is missing"),
            (ErrorCode::INVALID_FORMAT, 400, "Invalid data format"),
            (ErrorCode::AUTH_REQUIRED, 401, "Authentication required"),
            (ErrorCode::AUTH_INVALID_TOKEN, 401, "Invalid authentication token"),
            (ErrorCode::AUTH_TOKEN_EXPIRED, 401, "Authentication token expired"),
            (ErrorCode::SESSION_EXPIRED, 401, "Session expired"),
            (ErrorCode::AUTH_PERMISSION_DENIED, 403, "Permission denied"),
            (ErrorCode::NOT_FOUND, 404, "Resource not found"),
            (ErrorCode::DATABASE_CONFLICT, 409, "Record already exists"),
            (ErrorCode::DATABASE_CONSTRAINT_VIOLATION, 409, "Value violates constraint"),
            (ErrorCode::DATABASE_INVALID_REFERENCE, 422, "Invalid reference to related record"),
            (ErrorCode::DATABASE_MISSING_REQUIRED, 422, "Required field is missing"),
            (ErrorCode::BUSINESS_RULE_VIOLATION, 422, "Business rule violated"),
            (ErrorCode::INSUFFICIENT_BALANCE, 422, "Insufficient balance"),
            (ErrorCode::OPERATION_NOT_ALLOWED, 422, "Operation not allowed"),
            (ErrorCode::DATABASE_CONNECTION_ERROR, 500, "Database connection error"),
            (ErrorCode::DATABASE_QUERY_ERROR, 500, "Database error occurred"),
            (ErrorCode::TIMEOUT, 500, "Operation timed out"),
            (ErrorCode::INTERNAL_ERROR, 500, "An internal error occurred"),
            (ErrorCode::UNKNOWN_ERROR, 500, "Unexpected error"),
        ];

        for (code, status, message) in builtin {
            // Built-in codes are consistent with the canonical table
            self.register_code(code.clone(), *status, *message)
                .expect("built-in code table is consistent");
        }
    }
}

/// Iterator over a failure and its transitive sources, outermost first
struct ErrorChain<'a> {
    current: Option<&'a (dyn StdError + 'static)>,
}

impl<'a> ErrorChain<'a> {
    fn new(failure: &'a (dyn StdError + 'static)) -> Self {
        Self {
            current: Some(failure),
        }
    }
}

impl<'a> Iterator for ErrorChain<'a> {
    type Item = &'a (dyn StdError + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.source();
        Some(current)
    }
}
