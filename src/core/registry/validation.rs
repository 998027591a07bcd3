//! Conversion of input-validation failures into `VALIDATION_ERROR` details
//! with the offending field named.

use std::fmt;

use super::{ConversionContext, ConverterRegistry};
use crate::core::taxonomy::{ErrorCode, ErrorDetail};

/// A single field-validation failure
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
    pub input: Option<String>,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            input: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed for field '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationFailure {}

/// A batch of field-validation failures raised together
#[derive(Debug, Clone)]
pub struct ValidationFailures(pub Vec<ValidationFailure>);

impl fmt::Display for ValidationFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed for {} field(s)", self.0.len())
    }
}

impl std::error::Error for ValidationFailures {}

pub(super) fn register(registry: &mut ConverterRegistry) {
    registry.register::<ValidationFailure, _>(convert_single);
    registry.register::<ValidationFailures, _>(convert_batch);
}

fn convert_single(failure: &ValidationFailure, _ctx: &ConversionContext) -> ErrorDetail {
    let mut detail = ErrorDetail::new(
        ErrorCode::VALIDATION_ERROR,
        format!("Validation failed for field '{{field}}': {}", failure.message),
    )
    .with_field(&failure.field)
    .with_context("field", failure.field.as_str());

    if let Some(input) = &failure.input {
        detail = detail.with_context("input", input.as_str());
    }

    detail
}

fn convert_batch(failures: &ValidationFailures, ctx: &ConversionContext) -> ErrorDetail {
    // Lead with the first failure, carry the rest in context
    match failures.0.first() {
        Some(first) => {
            let fields: Vec<&str> = failures.0.iter().map(|f| f.field.as_str()).collect();
            convert_single(first, ctx)
                .with_context("error_count", failures.0.len() as i64)
                .with_context("fields", fields.join(", "))
        }
        None => ErrorDetail::new(ErrorCode::VALIDATION_ERROR, "Request validation failed"),
    }
}
