//! Tree-sitter based extraction of raise sites and call sites from Rust
//! source, without executing it.
//!
//! A raise site is a call to a known error-type constructor
//! (`ApiError::new(..)`, `ValidationFailure::new(..)`, `DatabaseFailure::new(..)`,
//! plus any configured extras). The error code is resolved statically when
//! the operand is an `ErrorCode` constant path, an `ErrorCode::new("..")`
//! call, or a string literal; otherwise the constructor's default code is
//! used. Call targets that cannot be attributed statically (method calls
//! through receivers, closure invocations) are reported as warnings, never
//! as graph edges.

use std::collections::HashMap;

use tree_sitter::{Node, Parser};

use crate::core::taxonomy::ErrorCode;
use crate::error::{FaultlineError, Result};

/// A statically detected error-raise expression
#[derive(Debug, Clone, PartialEq)]
pub struct RaiseSite {
    pub code: ErrorCode,
    pub line: usize,
}

/// A statically resolvable call expression
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    /// Trailing path segment, e.g. "check_quota" for `billing::check_quota(..)`
    pub name: String,
    pub line: usize,
}

/// One parsed function with its raise and call sites
#[derive(Debug, Clone)]
pub struct ParsedFunction {
    /// Qualified name: "Type::method" for impl methods, bare name otherwise
    pub name: String,
    pub line_range: (usize, usize),
    /// Source text of the function item, fingerprint input
    pub source_text: String,
    pub raises: Vec<RaiseSite>,
    pub calls: Vec<CallSite>,
    /// Call sites excluded from the graph, with the reason
    pub unresolved: Vec<String>,
}

#[derive(Debug, Clone)]
enum RaiseKind {
    /// First argument is the error code operand
    CodeOperand { default: ErrorCode },
    /// Constructor's arguments carry no code; the type implies one
    Fixed(ErrorCode),
}

/// Constructors of std wrapper types, not call targets worth an edge
const BUILTIN_CALLS: &[&str] = &["Ok", "Err", "Some", "Box", "Vec", "Arc", "Rc", "String"];

/// Receiver methods too common to be worth an unresolved-call warning
const COMMON_METHODS: &[&str] = &[
    "to_string", "to_owned", "clone", "into", "as_str", "as_ref", "len", "is_empty", "iter",
    "into_iter", "collect", "map", "map_err", "and_then", "ok_or", "ok_or_else", "unwrap_or",
    "unwrap_or_else", "unwrap_or_default", "push", "insert", "get", "contains", "contains_key",
    "join", "trim", "split", "parse", "format", "write", "expect", "unwrap",
];

/// Rust-source parser extracting functions, raise sites and call sites
pub struct SourceParser {
    parser: Parser,
    raise_constructors: HashMap<String, RaiseKind>,
}

impl SourceParser {
    pub fn new(extra_raise_constructors: &[String]) -> Result<Self> {
        let mut parser = Parser::new();
        let language = tree_sitter_rust::language();
        parser
            .set_language(&language)
            .map_err(|e| FaultlineError::Parser(format!("Failed to set Rust language: {}", e)))?;

        let mut raise_constructors = HashMap::new();
        raise_constructors.insert(
            "ApiError::new".to_string(),
            RaiseKind::CodeOperand {
                default: ErrorCode::INTERNAL_ERROR,
            },
        );
        raise_constructors.insert(
            "ValidationFailure::new".to_string(),
            RaiseKind::Fixed(ErrorCode::VALIDATION_ERROR),
        );
        raise_constructors.insert(
            "DatabaseFailure::new".to_string(),
            RaiseKind::Fixed(ErrorCode::DATABASE_QUERY_ERROR),
        );
        for extra in extra_raise_constructors {
            raise_constructors.insert(
                extra.clone(),
                RaiseKind::CodeOperand {
                    default: ErrorCode::INTERNAL_ERROR,
                },
            );
        }

        Ok(Self {
            parser,
            raise_constructors,
        })
    }

    /// Parse source text into functions. Fails only when the source is not
    /// syntactically valid Rust.
    pub fn parse(&mut self, content: &str) -> Result<Vec<ParsedFunction>> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| FaultlineError::Parser("Failed to parse Rust source".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(FaultlineError::Parser(
                "source is not syntactically valid Rust".to_string(),
            ));
        }

        let mut functions = Vec::new();
        self.extract_items(root, content, None, &mut functions);
        Ok(functions)
    }

    fn extract_items(
        &self,
        node: Node,
        source: &str,
        scope: Option<&str>,
        functions: &mut Vec<ParsedFunction>,
    ) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "function_item" => {
                    if let Some(function) = self.parse_function(child, source, scope) {
                        functions.push(function);
                    }
                }
                "impl_item" => {
                    let type_name = child
                        .child_by_field_name("type")
                        .map(|n| strip_generics(node_text(n, source)));
                    if let Some(body) = child.child_by_field_name("body") {
                        let inner = nest_scope(scope, type_name.as_deref());
                        self.extract_items(body, source, inner.as_deref(), functions);
                    }
                }
                "mod_item" => {
                    // Inline modules qualify their items, so same-named
                    // functions in sibling modules keep distinct identities
                    let mod_name = child
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source));
                    if let Some(body) = child.child_by_field_name("body") {
                        let inner = nest_scope(scope, mod_name.as_deref());
                        self.extract_items(body, source, inner.as_deref(), functions);
                    }
                }
                _ => {}
            }
        }
    }

    fn parse_function(
        &self,
        node: Node,
        source: &str,
        scope: Option<&str>,
    ) -> Option<ParsedFunction> {
        let name_node = node.child_by_field_name("name")?;
        let bare_name = node_text(name_node, source);
        let name = match scope {
            Some(scope) => format!("{}::{}", scope, bare_name),
            None => bare_name,
        };

        let mut raises = Vec::new();
        let mut calls = Vec::new();
        let mut unresolved = Vec::new();

        if let Some(body) = node.child_by_field_name("body") {
            self.visit_expressions(body, source, &mut raises, &mut calls, &mut unresolved);
        }

        Some(ParsedFunction {
            name,
            line_range: (node.start_position().row + 1, node.end_position().row + 1),
            source_text: node_text(node, source),
            raises,
            calls,
            unresolved,
        })
    }

    fn visit_expressions(
        &self,
        node: Node,
        source: &str,
        raises: &mut Vec<RaiseSite>,
        calls: &mut Vec<CallSite>,
        unresolved: &mut Vec<String>,
    ) {
        if node.kind() == "call_expression" {
            self.classify_call(node, source, raises, calls, unresolved);
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_expressions(child, source, raises, calls, unresolved);
        }
    }

    fn classify_call(
        &self,
        call: Node,
        source: &str,
        raises: &mut Vec<RaiseSite>,
        calls: &mut Vec<CallSite>,
        unresolved: &mut Vec<String>,
    ) {
        let Some(function) = call.child_by_field_name("function") else {
            return;
        };
        let line = call.start_position().row + 1;

        match function.kind() {
            "identifier" => {
                let name = node_text(function, source);
                if !BUILTIN_CALLS.contains(&name.as_str()) {
                    calls.push(CallSite { name, line });
                }
            }
            "scoped_identifier" => {
                let path = node_text(function, source);
                if let Some(kind) = self.lookup_raise_constructor(&path) {
                    let code = self.extract_code(call, source, &kind);
                    raises.push(RaiseSite { code, line });
                } else if let Some(name) = path.rsplit("::").next() {
                    calls.push(CallSite {
                        name: name.to_string(),
                        line,
                    });
                }
            }
            "field_expression" => {
                let method = function
                    .child_by_field_name("field")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                if !COMMON_METHODS.contains(&method.as_str()) {
                    unresolved.push(format!(
                        "method call `{}` at line {} cannot be statically resolved",
                        method, line
                    ));
                }
            }
            "generic_function" => {
                // e.g. `parse::<i64>(..)`, dispatch on the inner target
                if let Some(inner) = function.child_by_field_name("function") {
                    match inner.kind() {
                        "identifier" => calls.push(CallSite {
                            name: node_text(inner, source),
                            line,
                        }),
                        "scoped_identifier" => {
                            let path = node_text(inner, source);
                            if let Some(name) = path.rsplit("::").next() {
                                calls.push(CallSite {
                                    name: name.to_string(),
                                    line,
                                });
                            }
                        }
                        _ => unresolved.push(format!(
                            "call target at line {} cannot be statically resolved",
                            line
                        )),
                    }
                }
            }
            _ => {
                unresolved.push(format!(
                    "call target at line {} cannot be statically resolved",
                    line
                ));
            }
        }
    }

    fn lookup_raise_constructor(&self, path: &str) -> Option<RaiseKind> {
        // Match on the trailing two segments so `crate::errors::ApiError::new`
        // still counts
        let segments: Vec<&str> = path.split("::").collect();
        if segments.len() < 2 {
            return None;
        }
        let suffix = segments[segments.len() - 2..].join("::");
        self.raise_constructors.get(&suffix).cloned()
    }

    fn extract_code(&self, call: Node, source: &str, kind: &RaiseKind) -> ErrorCode {
        let default = match kind {
            RaiseKind::Fixed(code) => return code.clone(),
            RaiseKind::CodeOperand { default } => default.clone(),
        };

        let Some(arguments) = call.child_by_field_name("arguments") else {
            return default;
        };
        let mut cursor = arguments.walk();
        let first = arguments.named_children(&mut cursor).next();
        let Some(arg) = first else {
            return default;
        };

        match arg.kind() {
            "string_literal" => string_literal_value(arg, source)
                .map(ErrorCode::new)
                .unwrap_or(default),
            "scoped_identifier" => {
                let path = node_text(arg, source);
                match path.rsplit_once("::") {
                    Some((prefix, constant)) if prefix.ends_with("ErrorCode") => {
                        ErrorCode::new(constant)
                    }
                    _ => default,
                }
            }
            "call_expression" => {
                // ErrorCode::new("CUSTOM_CODE")
                let is_code_call = arg
                    .child_by_field_name("function")
                    .map(|f| node_text(f, source).ends_with("ErrorCode::new"))
                    .unwrap_or(false);
                if is_code_call {
                    arg.child_by_field_name("arguments")
                        .and_then(|args| {
                            let mut c = args.walk();
                            let first = args.named_children(&mut c).next();
                            first
                        })
                        .filter(|n| n.kind() == "string_literal")
                        .and_then(|n| string_literal_value(n, source))
                        .map(ErrorCode::new)
                        .unwrap_or(default)
                } else {
                    default
                }
            }
            _ => default,
        }
    }
}

fn node_text(node: Node, source: &str) -> String {
    source[node.byte_range()].to_string()
}

fn nest_scope(outer: Option<&str>, inner: Option<&str>) -> Option<String> {
    match (outer, inner) {
        (Some(o), Some(i)) => Some(format!("{}::{}", o, i)),
        (None, Some(i)) => Some(i.to_string()),
        (Some(o), None) => Some(o.to_string()),
        (None, None) => None,
    }
}

fn strip_generics(type_name: String) -> String {
    match type_name.find('<') {
        Some(pos) => type_name[..pos].to_string(),
        None => type_name,
    }
}

fn string_literal_value(node: Node, source: &str) -> Option<String> {
    let text = node_text(node, source);
    let trimmed = text.trim_matches('"');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
