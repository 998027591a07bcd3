//! Static inference of the error codes a callable can produce, by parsing
//! its source and walking its transitive call graph.

mod cache;
mod call_graph;
mod parser;
mod source_index;

pub use cache::AnalysisCache;
pub use call_graph::{AnalysisResult, CallGraph, CallGraphNode};
pub use parser::{CallSite, ParsedFunction, RaiseSite, SourceParser};
pub use source_index::{fingerprint, CallableIdentity, FunctionRecord, NameResolution, SourceIndex};
