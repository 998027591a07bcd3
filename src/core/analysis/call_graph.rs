//! Directed graph of callables used to infer transitive failure
//! reachability.
//!
//! Cycles (direct or mutual recursion) are expected; the traversal never
//! revisits a node, so it terminates regardless. Reachable codes accumulate
//! in a `BTreeSet`, which makes the serialized output lexicographic and
//! diff-stable no matter the traversal order.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::source_index::{CallableIdentity, NameResolution, SourceIndex};
use crate::core::taxonomy::ErrorCode;

/// Node in the call graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphNode {
    pub id: CallableIdentity,
    pub direct_raises: BTreeSet<ErrorCode>,
    pub calls: BTreeSet<CallableIdentity>,
    pub source_fingerprint: String,
    /// Call sites excluded from the graph (dynamic dispatch, ambiguity)
    pub warnings: Vec<String>,
}

/// Inferred error reach for one entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub entry: CallableIdentity,
    pub reachable_codes: BTreeSet<ErrorCode>,
    /// True when recursion/size limits (or a lookup failure) cut the
    /// traversal short
    pub truncated: bool,
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    /// Codes in stable lexicographic order, ready for emission
    pub fn sorted_codes(&self) -> Vec<&ErrorCode> {
        self.reachable_codes.iter().collect()
    }

    /// Result for an entry point the index has never seen. Marked truncated
    /// so documentation flags the gap instead of claiming "no errors".
    pub fn missing_entry(name: &str) -> Self {
        Self {
            entry: CallableIdentity::new("", name),
            reachable_codes: BTreeSet::new(),
            truncated: true,
            warnings: vec![format!("entry point '{}' not found in any indexed source", name)],
        }
    }
}

/// Complete call graph over an indexed source tree
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    nodes: HashMap<CallableIdentity, CallGraphNode>,
}

impl CallGraph {
    /// Build the graph by resolving every indexed call site against the
    /// index. Unresolvable targets become node warnings, not edges.
    pub fn build(index: &SourceIndex) -> Self {
        let mut nodes = HashMap::new();

        for record in index.functions() {
            let mut calls = BTreeSet::new();
            let mut warnings = record.unresolved.clone();

            for site in &record.calls {
                match index.resolve_from(&site.name, &record.id) {
                    NameResolution::Resolved(callee) => {
                        // Self-recursion contributes no new reach
                        if *callee != record.id {
                            calls.insert(callee.clone());
                        }
                    }
                    NameResolution::Ambiguous(count) => {
                        warnings.push(format!(
                            "call to `{}` at line {} matches {} definitions, excluded",
                            site.name, site.line, count
                        ));
                    }
                    // Names outside the indexed tree (std, dependencies)
                    // carry no taxonomy raises we could see
                    NameResolution::Unknown => {}
                }
            }

            nodes.insert(
                record.id.clone(),
                CallGraphNode {
                    id: record.id.clone(),
                    direct_raises: record.direct_raises.iter().cloned().collect(),
                    calls,
                    source_fingerprint: record.source_fingerprint.clone(),
                    warnings,
                },
            );
        }

        debug!(nodes = nodes.len(), "call graph built");
        Self { nodes }
    }

    pub fn node(&self, id: &CallableIdentity) -> Option<&CallGraphNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Union of direct raises over every node reachable from the entry,
    /// breadth-first with a visited set. Descent stops at `max_depth`,
    /// marking the result truncated.
    pub fn reachable_codes(&self, entry: &CallableIdentity, max_depth: usize) -> AnalysisResult {
        let mut result = AnalysisResult {
            entry: entry.clone(),
            reachable_codes: BTreeSet::new(),
            truncated: false,
            warnings: Vec::new(),
        };

        if !self.nodes.contains_key(entry) {
            result.truncated = true;
            result.warnings.push(format!("entry `{}` not found in call graph", entry));
            return result;
        }

        let mut visited: HashSet<&CallableIdentity> = HashSet::new();
        let mut queue: VecDeque<(&CallableIdentity, usize)> = VecDeque::new();
        queue.push_back((entry, 0));

        while let Some((id, depth)) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(id) else {
                continue;
            };

            result.reachable_codes.extend(node.direct_raises.iter().cloned());
            result.warnings.extend(node.warnings.iter().cloned());

            if node.calls.is_empty() {
                continue;
            }
            if depth >= max_depth {
                result.truncated = true;
                result.warnings.push(format!(
                    "traversal depth limit ({}) reached at `{}`, callees not descended",
                    max_depth, id
                ));
                continue;
            }
            for callee in &node.calls {
                if !visited.contains(callee) {
                    queue.push_back((callee, depth + 1));
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    fn graph_for(sources: &[(&str, &str)]) -> (CallGraph, SourceIndex) {
        let config = AnalysisConfig {
            source_dirs: vec![],
            max_depth: 10,
            max_file_size: 1024 * 1024,
            extra_raise_constructors: vec![],
        };
        let index = SourceIndex::from_sources(&config, sources.iter().copied()).unwrap();
        (CallGraph::build(&index), index)
    }

    fn entry(index: &SourceIndex, name: &str) -> CallableIdentity {
        index.find_entry(name).unwrap().id.clone()
    }

    #[test]
    fn test_no_raises_no_calls_is_empty_and_complete() {
        let (graph, index) = graph_for(&[("src/lib.rs", "fn quiet() { let x = 1 + 1; }")]);
        let result = graph.reachable_codes(&entry(&index, "quiet"), 10);

        assert!(result.reachable_codes.is_empty());
        assert!(!result.truncated);
    }

    #[test]
    fn test_transitive_union() {
        let (graph, index) = graph_for(&[(
            "src/lib.rs",
            r#"
            fn f() -> Result<(), ApiError> {
                g()?;
                Err(ApiError::new(ErrorCode::VALIDATION_ERROR, "bad"))
            }
            fn g() -> Result<(), ApiError> {
                Err(ApiError::new(ErrorCode::NOT_FOUND, "missing"))
            }
            "#,
        )]);
        let result = graph.reachable_codes(&entry(&index, "f"), 10);

        let codes: Vec<&ErrorCode> = result.sorted_codes();
        assert_eq!(codes, vec![&ErrorCode::NOT_FOUND, &ErrorCode::VALIDATION_ERROR]);
        assert!(!result.truncated);
    }

    #[test]
    fn test_mutual_recursion_terminates_with_union() {
        let (graph, index) = graph_for(&[(
            "src/lib.rs",
            r#"
            fn a() -> Result<(), ApiError> {
                b()?;
                Err(ApiError::new(ErrorCode::VALIDATION_ERROR, "from a"))
            }
            fn b() -> Result<(), ApiError> {
                a()?;
                Err(ApiError::new(ErrorCode::NOT_FOUND, "from b"))
            }
            "#,
        )]);

        let from_a = graph.reachable_codes(&entry(&index, "a"), 10);
        let from_b = graph.reachable_codes(&entry(&index, "b"), 10);

        assert_eq!(from_a.reachable_codes, from_b.reachable_codes);
        assert_eq!(from_a.reachable_codes.len(), 2);
        assert!(!from_a.truncated);
    }

    #[test]
    fn test_depth_limit_truncates() {
        let (graph, index) = graph_for(&[(
            "src/lib.rs",
            r#"
            fn level0() { level1(); }
            fn level1() { level2(); }
            fn level2() -> Result<(), ApiError> {
                Err(ApiError::new(ErrorCode::NOT_FOUND, "deep"))
            }
            "#,
        )]);

        let shallow = graph.reachable_codes(&entry(&index, "level0"), 1);
        assert!(shallow.truncated);
        assert!(shallow.warnings.iter().any(|w| w.contains("depth limit")));

        let deep = graph.reachable_codes(&entry(&index, "level0"), 5);
        assert!(!deep.truncated);
        assert!(deep.reachable_codes.contains(&ErrorCode::NOT_FOUND));
    }

    #[test]
    fn test_sibling_module_helpers_stay_separate() {
        let (graph, index) = graph_for(&[(
            "src/app.rs",
            r#"
            mod billing {
                fn charge() { helper(); }
                fn helper() -> Result<(), ValidationFailure> {
                    Err(ValidationFailure::new("amount", "must be positive"))
                }
            }
            mod users {
                fn load() { helper(); }
                fn helper() -> Result<(), ApiError> {
                    Err(ApiError::new(ErrorCode::NOT_FOUND, "no such user"))
                }
            }
            "#,
        )]);

        let charge = graph.reachable_codes(&entry(&index, "billing::charge"), 10);
        assert_eq!(charge.sorted_codes(), vec![&ErrorCode::VALIDATION_ERROR]);
        assert!(!charge.truncated);

        let load = graph.reachable_codes(&entry(&index, "users::load"), 10);
        assert_eq!(load.sorted_codes(), vec![&ErrorCode::NOT_FOUND]);
    }

    #[test]
    fn test_missing_entry_is_truncated_warning() {
        let (graph, _) = graph_for(&[("src/lib.rs", "fn present() {}")]);
        let result =
            graph.reachable_codes(&CallableIdentity::new("src/lib.rs", "absent"), 10);

        assert!(result.truncated);
        assert!(result.reachable_codes.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_serialized_codes_are_deterministic() {
        let (graph, index) = graph_for(&[(
            "src/lib.rs",
            r#"
            fn entry() -> Result<(), ApiError> {
                zebra()?;
                alpha()?;
                Err(ApiError::new(ErrorCode::new("MIDDLE"), "m"))
            }
            fn zebra() -> Result<(), ApiError> {
                Err(ApiError::new(ErrorCode::new("ZULU"), "z"))
            }
            fn alpha() -> Result<(), ApiError> {
                Err(ApiError::new(ErrorCode::new("ALPHA"), "a"))
            }
            "#,
        )]);

        let id = entry(&index, "entry");
        let first = serde_json::to_string(&graph.reachable_codes(&id, 10).reachable_codes).unwrap();
        let second = serde_json::to_string(&graph.reachable_codes(&id, 10).reachable_codes).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, r#"["ALPHA","MIDDLE","ZULU"]"#);
    }
}
