//! Ties the pieces together: one engine owns the converter registry, the
//! source index, the call graph, and the analysis cache, so conversion and
//! documentation always agree on the same taxonomy.

use std::error::Error as StdError;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::core::analysis::{AnalysisCache, AnalysisResult, CallGraph, SourceIndex};
use crate::core::docs::{DocEmitter, SchemaFragment};
use crate::core::registry::ConverterRegistry;
use crate::core::taxonomy::{ErrorCode, ErrorResponse};
use crate::error::Result;

pub struct Engine {
    config: Config,
    registry: ConverterRegistry,
    index: SourceIndex,
    graph: CallGraph,
    cache: AnalysisCache,
}

impl Engine {
    /// Build an engine by scanning the configured source directories
    pub fn new(config: Config) -> Result<Self> {
        let registry = ConverterRegistry::with_builtins(&config.conversion);
        let index = SourceIndex::build(&config.analysis)?;
        Ok(Self::assemble(config, registry, index))
    }

    /// Build an engine from in-memory sources, bypassing the filesystem
    pub fn from_sources<'a, I>(config: Config, sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let registry = ConverterRegistry::with_builtins(&config.conversion);
        let index = SourceIndex::from_sources(&config.analysis, sources)?;
        Ok(Self::assemble(config, registry, index))
    }

    fn assemble(config: Config, registry: ConverterRegistry, index: SourceIndex) -> Self {
        let graph = CallGraph::build(&index);
        info!(
            functions = index.len(),
            nodes = graph.len(),
            "engine ready"
        );
        Self {
            config,
            registry,
            index,
            graph,
            cache: AnalysisCache::new(),
        }
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.registry
    }

    /// Convert any error into the canonical response shape
    pub fn convert(&self, failure: &(dyn StdError + 'static)) -> ErrorResponse {
        self.registry.convert(failure)
    }

    /// Infer the set of error codes reachable from an entry point. Results
    /// are cached per function fingerprint; an unknown entry yields an
    /// uncached truncated result rather than an error.
    pub fn analyze(&self, entry: &str) -> Arc<AnalysisResult> {
        let Some(record) = self.index.find_entry(entry) else {
            warn!(entry, "entry point not found in source index");
            return Arc::new(AnalysisResult::missing_entry(entry));
        };

        let id = record.id.clone();
        let max_depth = self.config.analysis.max_depth;
        self.cache
            .get_or_compute(&id, &record.source_fingerprint, || {
                self.graph.reachable_codes(&id, max_depth)
            })
    }

    /// Emit a schema fragment for a set of entry points. `additional`
    /// codes are unioned into every operation's inferred set, alongside
    /// any codes pinned in the configuration.
    pub fn document(&self, entries: &[&str], additional: &[ErrorCode]) -> SchemaFragment {
        let mut overrides: Vec<ErrorCode> = additional.to_vec();
        overrides.extend(
            self.config
                .docs
                .extra_codes
                .iter()
                .map(|c| ErrorCode::new(c.clone())),
        );

        let emitter = DocEmitter::new(self.config.docs.include_examples);
        let results = entries.iter().map(|entry| (*entry, self.analyze(entry)));
        emitter.emit(&self.registry, results, &overrides)
    }

    /// Rescan the source directories. Functions whose fingerprints changed
    /// are recomputed on next analysis; unchanged entries keep their
    /// cached results.
    pub fn reindex(&mut self) -> Result<()> {
        self.index = SourceIndex::build(&self.config.analysis)?;
        self.graph = CallGraph::build(&self.index);
        info!(functions = self.index.len(), "source index rebuilt");
        Ok(())
    }

    /// Number of analyses actually computed (cache misses)
    pub fn analysis_count(&self) -> u64 {
        self.cache.computations()
    }
}
