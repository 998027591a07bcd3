//! Renders inferred error reach into a declarative schema fragment suitable
//! for inclusion in an API description document. The exact schema dialect
//! (OpenAPI or otherwise) is an adapter concern; the fragment is plain
//! status → example-body data.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::analysis::AnalysisResult;
use super::registry::ConverterRegistry;
use crate::core::taxonomy::ErrorCode;

/// Fixed example timestamp keeps generated documentation diff-stable
const EXAMPLE_TIMESTAMP: &str = "2024-01-08T12:00:00Z";
const EXAMPLE_TRACE_ID: &str = "req_abc123";

/// Error documentation for one HTTP status of one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDoc {
    pub description: String,
    /// Codes grouped under this status, lexicographic
    pub codes: Vec<ErrorCode>,
    /// One representative response body per code
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<serde_json::Value>,
}

/// Error documentation for one entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationErrors {
    pub entry: String,
    /// Analysis could not see the whole call graph
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// httpStatus → documentation, ordered by status
    pub responses: BTreeMap<u16, StatusDoc>,
}

/// Schema fragment covering a set of entry points
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaFragment {
    pub operations: BTreeMap<String, OperationErrors>,
}

impl SchemaFragment {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Emitter configuration and rendering
pub struct DocEmitter {
    include_examples: bool,
}

impl DocEmitter {
    pub fn new(include_examples: bool) -> Self {
        Self { include_examples }
    }

    /// Render a fragment from per-entry analysis results. Override codes
    /// are unioned with the inferred set, never replacing it. An operation
    /// with zero codes and a complete (non-truncated) analysis is omitted:
    /// that is "provably no declared errors", not a gap.
    pub fn emit<'a, I>(
        &self,
        registry: &ConverterRegistry,
        results: I,
        overrides: &[ErrorCode],
    ) -> SchemaFragment
    where
        I: IntoIterator<Item = (&'a str, Arc<AnalysisResult>)>,
    {
        let mut fragment = SchemaFragment::default();

        for (entry, result) in results {
            let mut codes: BTreeSet<ErrorCode> = result.reachable_codes.clone();
            codes.extend(overrides.iter().cloned());

            if codes.is_empty() && !result.truncated {
                debug!(entry, "no reachable error codes, omitting from fragment");
                continue;
            }

            fragment.operations.insert(
                entry.to_string(),
                OperationErrors {
                    entry: entry.to_string(),
                    truncated: result.truncated,
                    warnings: result.warnings.clone(),
                    responses: self.render_responses(registry, &codes),
                },
            );
        }

        fragment
    }

    fn render_responses(
        &self,
        registry: &ConverterRegistry,
        codes: &BTreeSet<ErrorCode>,
    ) -> BTreeMap<u16, StatusDoc> {
        // Group codes by status; BTree ordering keeps output stable
        let mut by_status: BTreeMap<u16, Vec<ErrorCode>> = BTreeMap::new();
        for code in codes {
            by_status
                .entry(registry.status_for(code))
                .or_default()
                .push(code.clone());
        }

        by_status
            .into_iter()
            .map(|(status, codes)| {
                let examples = if self.include_examples {
                    codes
                        .iter()
                        .map(|code| self.example_body(registry, code, status))
                        .collect()
                } else {
                    Vec::new()
                };

                let doc = StatusDoc {
                    description: status_description(status, &codes),
                    codes,
                    examples,
                };
                (status, doc)
            })
            .collect()
    }

    fn example_body(
        &self,
        registry: &ConverterRegistry,
        code: &ErrorCode,
        status: u16,
    ) -> serde_json::Value {
        let message = registry
            .code_template(code)
            .map(|t| t.message.clone())
            .unwrap_or_else(|| format!("Error: {}", code));

        json!({
            "details": [{
                "code": code,
                "http_status": status,
                "message": message,
                "timestamp": EXAMPLE_TIMESTAMP,
            }],
            "trace_id": EXAMPLE_TRACE_ID,
        })
    }
}

fn status_description(status: u16, codes: &[ErrorCode]) -> String {
    let base = match status {
        400 => "Bad Request - Validation or input errors",
        401 => "Unauthorized - Authentication required",
        403 => "Forbidden - Insufficient permissions",
        404 => "Not Found - Resource not found",
        409 => "Conflict - Resource conflict (e.g., duplicate entry)",
        422 => "Unprocessable Entity - Business logic errors",
        500 => "Internal Server Error - Server errors",
        _ => return format!("HTTP {}. Possible error codes: {}", status, join_codes(codes)),
    };
    format!("{}. Possible error codes: {}", base, join_codes(codes))
}

fn join_codes(codes: &[ErrorCode]) -> String {
    codes
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::core::analysis::CallableIdentity;

    fn registry() -> ConverterRegistry {
        ConverterRegistry::with_builtins(&ConversionConfig {
            debug: false,
            log_failures: false,
        })
    }

    fn result(codes: &[ErrorCode], truncated: bool) -> Arc<AnalysisResult> {
        Arc::new(AnalysisResult {
            entry: CallableIdentity::new("src/lib.rs", "op"),
            reachable_codes: codes.iter().cloned().collect(),
            truncated,
            warnings: vec![],
        })
    }

    #[test]
    fn test_codes_grouped_by_status() {
        let emitter = DocEmitter::new(true);
        let registry = registry();
        let analysis = result(
            &[
                ErrorCode::VALIDATION_ERROR,
                ErrorCode::NOT_FOUND,
                ErrorCode::INVALID_INPUT,
            ],
            false,
        );

        let fragment = emitter.emit(&registry, [("create_user", analysis)], &[]);
        let operation = &fragment.operations["create_user"];

        assert_eq!(
            operation.responses[&400].codes,
            vec![ErrorCode::INVALID_INPUT, ErrorCode::VALIDATION_ERROR]
        );
        assert_eq!(operation.responses[&404].codes, vec![ErrorCode::NOT_FOUND]);
        assert_eq!(operation.responses[&400].examples.len(), 2);
    }

    #[test]
    fn test_clean_operation_omitted() {
        let emitter = DocEmitter::new(true);
        let fragment = emitter.emit(&registry(), [("quiet_op", result(&[], false))], &[]);
        assert!(fragment.is_empty());
    }

    #[test]
    fn test_truncated_operation_kept_even_without_codes() {
        let emitter = DocEmitter::new(true);
        let fragment = emitter.emit(&registry(), [("opaque_op", result(&[], true))], &[]);
        assert!(fragment.operations.contains_key("opaque_op"));
        assert!(fragment.operations["opaque_op"].truncated);
    }

    #[test]
    fn test_overrides_union_with_inferred() {
        let emitter = DocEmitter::new(false);
        let analysis = result(&[ErrorCode::NOT_FOUND], false);
        let fragment = emitter.emit(
            &registry(),
            [("op", analysis)],
            &[ErrorCode::AUTH_REQUIRED],
        );

        let operation = &fragment.operations["op"];
        assert!(operation.responses.contains_key(&401));
        assert!(operation.responses.contains_key(&404));
    }

    #[test]
    fn test_fragment_serialization_is_stable() {
        let emitter = DocEmitter::new(true);
        let registry = registry();
        let codes = [ErrorCode::VALIDATION_ERROR, ErrorCode::DATABASE_CONFLICT];

        let first = serde_json::to_string(
            &emitter.emit(&registry, [("op", result(&codes, false))], &[]),
        )
        .unwrap();
        let second = serde_json::to_string(
            &emitter.emit(&registry, [("op", result(&codes, false))], &[]),
        )
        .unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_code_defaults_to_500() {
        let emitter = DocEmitter::new(false);
        let analysis = result(&[ErrorCode::new("EXOTIC_FAILURE")], false);
        let fragment = emitter.emit(&registry(), [("op", analysis)], &[]);
        assert!(fragment.operations["op"].responses.contains_key(&500));
    }
}
