//! Index of every function found under the configured source directories,
//! keyed by a stable callable identity and fingerprinted for cache
//! invalidation.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::parser::{CallSite, ParsedFunction, SourceParser};
use crate::config::AnalysisConfig;
use crate::core::taxonomy::ErrorCode;
use crate::error::{FaultlineError, Result};

/// Stable key for a function: qualified name plus defining file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallableIdentity {
    /// Defining source file
    pub module: PathBuf,
    /// Qualified name within the file ("Type::method" or bare name)
    pub name: String,
}

impl CallableIdentity {
    pub fn new(module: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CallableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module.display(), self.name)
    }
}

/// A function's indexed analysis inputs
#[derive(Debug, Clone)]
pub struct FunctionRecord {
    pub id: CallableIdentity,
    pub line_range: (usize, usize),
    /// SHA-256 of the function's source text
    pub source_fingerprint: String,
    pub direct_raises: Vec<ErrorCode>,
    pub calls: Vec<CallSite>,
    pub unresolved: Vec<String>,
}

/// All indexed functions across the scanned source tree
pub struct SourceIndex {
    functions: HashMap<CallableIdentity, FunctionRecord>,
    by_name: HashMap<String, Vec<CallableIdentity>>,
    /// File-level warnings (unparseable or oversized files)
    warnings: Vec<String>,
}

impl SourceIndex {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
            by_name: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Scan the configured directories and index every `.rs` file
    pub fn build(config: &AnalysisConfig) -> Result<Self> {
        let mut parser = SourceParser::new(&config.extra_raise_constructors)?;
        let mut index = Self::new();

        for dir in &config.source_dirs {
            index.scan_dir(&mut parser, dir, config.max_file_size)?;
        }

        debug!(
            functions = index.functions.len(),
            warnings = index.warnings.len(),
            "source index built"
        );
        Ok(index)
    }

    /// Index in-memory sources; fixture path for tests and embedded use
    pub fn from_sources<'a, I>(config: &AnalysisConfig, sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut parser = SourceParser::new(&config.extra_raise_constructors)?;
        let mut index = Self::new();
        for (path, content) in sources {
            index.index_source(&mut parser, Path::new(path), content);
        }
        Ok(index)
    }

    fn scan_dir(
        &mut self,
        parser: &mut SourceParser,
        dir: &Path,
        max_file_size: usize,
    ) -> Result<()> {
        // Respect .gitignore; hidden entries are still indexed
        let walker = WalkBuilder::new(dir).hidden(false).git_ignore(true).build();

        for entry in walker {
            let entry = entry.map_err(|e| FaultlineError::FileSystem(e.to_string()))?;
            let path = entry.path();

            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("rs") {
                continue;
            }

            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    self.warnings
                        .push(format!("could not read {}: {}", path.display(), e));
                    continue;
                }
            };

            if content.len() > max_file_size {
                self.warnings
                    .push(format!("{} exceeds maximum size limit, skipped", path.display()));
                continue;
            }

            self.index_source(parser, path, &content);
        }

        Ok(())
    }

    /// Parse one file and index its functions. An unparseable file is
    /// recorded as a warning and skipped; it never aborts the scan.
    pub fn index_source(&mut self, parser: &mut SourceParser, path: &Path, content: &str) {
        let functions = match parser.parse(content) {
            Ok(functions) => functions,
            Err(e) => {
                warn!(file = %path.display(), "parse failure: {}", e);
                self.warnings
                    .push(format!("parse failure in {}: {}", path.display(), e));
                return;
            }
        };

        for function in functions {
            self.insert(path, function);
        }
    }

    fn insert(&mut self, path: &Path, function: ParsedFunction) {
        let id = CallableIdentity::new(path, &function.name);
        let record = FunctionRecord {
            id: id.clone(),
            line_range: function.line_range,
            source_fingerprint: fingerprint(&function.source_text),
            direct_raises: function.raises.into_iter().map(|r| r.code).collect(),
            calls: function.calls,
            unresolved: function.unresolved,
        };

        // Both the bare and qualified names resolve ("create" and
        // "UserService::create")
        self.by_name
            .entry(function.name.clone())
            .or_default()
            .push(id.clone());
        if let Some((_, bare)) = function.name.rsplit_once("::") {
            self.by_name
                .entry(bare.to_string())
                .or_default()
                .push(id.clone());
        }

        self.functions.insert(id, record);
    }

    pub fn get(&self, id: &CallableIdentity) -> Option<&FunctionRecord> {
        self.functions.get(id)
    }

    /// Find a function by name: a unique match in `from_file` wins, then a
    /// unique cross-file match. Ambiguous names resolve to nothing.
    pub fn resolve_name(
        &self,
        name: &str,
        from_file: Option<&Path>,
    ) -> NameResolution<'_> {
        let Some(candidates) = self.by_name.get(name) else {
            return NameResolution::Unknown;
        };

        if let Some(file) = from_file {
            let mut same_file = candidates.iter().filter(|id| id.module == file);
            if let Some(first) = same_file.next() {
                return match same_file.count() {
                    0 => NameResolution::Resolved(first),
                    more => NameResolution::Ambiguous(more + 1),
                };
            }
        }

        match candidates.as_slice() {
            [single] => NameResolution::Resolved(single),
            _ => NameResolution::Ambiguous(candidates.len()),
        }
    }

    /// Resolve a call site from inside `caller`. The caller's enclosing
    /// scopes are tried innermost-first ("billing::helper" before a bare
    /// "helper") so a module-local function shadows same-named functions in
    /// sibling modules.
    pub fn resolve_from(&self, name: &str, caller: &CallableIdentity) -> NameResolution<'_> {
        let mut scope = caller.name.as_str();
        while let Some((outer, _)) = scope.rsplit_once("::") {
            let qualified = format!("{}::{}", outer, name);
            if let Some(candidates) = self.by_name.get(&qualified) {
                if let Some(id) = candidates.iter().find(|id| id.module == caller.module) {
                    return NameResolution::Resolved(id);
                }
            }
            scope = outer;
        }
        self.resolve_name(name, Some(&caller.module))
    }

    /// Entry-point lookup by display name, for callers that don't hold a
    /// full identity
    pub fn find_entry(&self, name: &str) -> Option<&FunctionRecord> {
        match self.resolve_name(name, None) {
            NameResolution::Resolved(id) => self.functions.get(id),
            _ => None,
        }
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionRecord> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl Default for SourceIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a static name-resolution attempt
pub enum NameResolution<'a> {
    Resolved(&'a CallableIdentity),
    /// Name exists in several files and the caller's file has no match
    Ambiguous(usize),
    Unknown,
}

/// SHA-256 hex digest used as the source fingerprint
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            source_dirs: vec![],
            max_depth: 10,
            max_file_size: 1024 * 1024,
            extra_raise_constructors: vec![],
        }
    }

    #[test]
    fn test_index_in_memory_sources() {
        let index = SourceIndex::from_sources(
            &config(),
            [(
                "src/users.rs",
                r#"
                fn create_user() -> Result<(), ApiError> {
                    validate_email();
                    Err(ApiError::new(ErrorCode::VALIDATION_ERROR, "bad"))
                }
                fn validate_email() {}
                "#,
            )],
        )
        .unwrap();

        assert_eq!(index.len(), 2);
        let record = index.find_entry("create_user").unwrap();
        assert_eq!(record.direct_raises, vec![ErrorCode::VALIDATION_ERROR]);
        assert_eq!(record.calls.len(), 1);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = fingerprint("fn f() {}");
        let b = fingerprint("fn f() { g(); }");
        assert_ne!(a, b);
        assert_eq!(a, fingerprint("fn f() {}"));
    }

    #[test]
    fn test_parse_failure_is_warning_not_fatal() {
        let index = SourceIndex::from_sources(
            &config(),
            [
                ("src/broken.rs", "fn broken( {{{"),
                ("src/ok.rs", "fn fine() {}"),
            ],
        )
        .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.warnings().len(), 1);
        assert!(index.warnings()[0].contains("broken.rs"));
    }

    #[test]
    fn test_same_file_resolution_wins_over_cross_file() {
        let index = SourceIndex::from_sources(
            &config(),
            [
                ("src/a.rs", "fn helper() {}\nfn caller() { helper(); }"),
                ("src/b.rs", "fn helper() {}"),
            ],
        )
        .unwrap();

        let file_a = Path::new("src/a.rs");
        match index.resolve_name("helper", Some(file_a)) {
            NameResolution::Resolved(id) => assert_eq!(id.module, file_a),
            _ => panic!("expected same-file resolution"),
        }

        // Without a caller file the name is ambiguous
        assert!(matches!(
            index.resolve_name("helper", None),
            NameResolution::Ambiguous(2)
        ));
    }

    #[test]
    fn test_same_named_functions_in_sibling_modules_both_indexed() {
        let source = r#"
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
        "#;
        let index = SourceIndex::from_sources(&config(), [("src/app.rs", source)]).unwrap();
        assert_eq!(index.len(), 4);

        let billing = index.find_entry("billing::helper").unwrap();
        assert_eq!(billing.direct_raises, vec![ErrorCode::VALIDATION_ERROR]);
        let users = index.find_entry("users::helper").unwrap();
        assert_eq!(users.direct_raises, vec![ErrorCode::NOT_FOUND]);

        // The bare name alone is ambiguous within the file
        assert!(matches!(
            index.resolve_name("helper", Some(Path::new("src/app.rs"))),
            NameResolution::Ambiguous(2)
        ));

        // A caller inside a module resolves to its own module's function
        let charge = index.find_entry("billing::charge").unwrap();
        match index.resolve_from("helper", &charge.id) {
            NameResolution::Resolved(id) => assert_eq!(id.name, "billing::helper"),
            _ => panic!("expected module-local resolution"),
        }
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lib.rs"),
            "fn entry() { worker(); }\nfn worker() {}",
        )
        .unwrap();

        let config = AnalysisConfig {
            source_dirs: vec![dir.path().to_path_buf()],
            ..config()
        };
        let index = SourceIndex::build(&config).unwrap();
        assert_eq!(index.len(), 2);
    }
}
