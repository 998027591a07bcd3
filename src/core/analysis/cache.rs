//! Memoized analysis results with single-flight computation.
//!
//! Keys are `(CallableIdentity, source fingerprint)`. A fingerprint change
//! discards the prior entry and recomputes; that is the sole invalidation
//! rule. Concurrent callers asking for the same key share one computation:
//! the per-key `OnceCell` admits exactly one initializer while the rest
//! block and reuse its value. Unrelated keys compute fully in parallel
//! because the map lock is held only to fetch or swap a cell, never during
//! analysis.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tracing::debug;

use super::call_graph::AnalysisResult;
use super::source_index::CallableIdentity;

struct CacheEntry {
    fingerprint: String,
    cell: Arc<OnceCell<Arc<AnalysisResult>>>,
}

/// Process-lifetime cache of analysis results
pub struct AnalysisCache {
    entries: Mutex<HashMap<CallableIdentity, CacheEntry>>,
    computations: AtomicU64,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            computations: AtomicU64::new(0),
        }
    }

    /// Return the cached result for the key, computing it at most once.
    pub fn get_or_compute<F>(
        &self,
        id: &CallableIdentity,
        fingerprint: &str,
        compute: F,
    ) -> Arc<AnalysisResult>
    where
        F: FnOnce() -> AnalysisResult,
    {
        let cell = {
            let mut entries = self.entries.lock().expect("analysis cache poisoned");
            match entries.get(id) {
                Some(entry) if entry.fingerprint == fingerprint => entry.cell.clone(),
                stale => {
                    if stale.is_some() {
                        debug!(entry = %id, "fingerprint changed, discarding cached analysis");
                    }
                    let cell = Arc::new(OnceCell::new());
                    entries.insert(
                        id.clone(),
                        CacheEntry {
                            fingerprint: fingerprint.to_string(),
                            cell: cell.clone(),
                        },
                    );
                    cell
                }
            }
        };

        cell.get_or_init(|| {
            self.computations.fetch_add(1, Ordering::SeqCst);
            Arc::new(compute())
        })
        .clone()
    }

    /// Number of analyses actually performed (cache misses)
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("analysis cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new()
    }
}
