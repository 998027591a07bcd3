mod engine;
mod taxonomy;

// Static analysis of error reach
pub mod analysis;

// Error conversion
pub mod registry;

// Schema fragment emission
pub mod docs;

// Handler wrappers
mod annotate;

pub use annotate::{documented, guard, DocumentedOperation};
pub use engine::Engine;
pub use taxonomy::{
    default_http_status, ApiError, ContextValue, ErrorCode, ErrorDetail, ErrorResponse,
};

pub use analysis::AnalysisResult;
pub use docs::{DocEmitter, OperationErrors, SchemaFragment, StatusDoc};
pub use registry::{
    ConversionContext, ConverterRegistry, DatabaseFailure, ValidationFailure, ValidationFailures,
};
