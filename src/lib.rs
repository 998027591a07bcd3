//! Faultline keeps error handling and error documentation from drifting
//! apart. It classifies failures into a stable taxonomy of error codes,
//! converts any error type into one canonical response shape, and statically
//! analyzes source code to discover which codes each entry point can
//! actually raise, so generated API documentation reflects the code as
//! written rather than as remembered.
//!
//! ```no_run
//! use faultline::{Config, Engine, ErrorCode};
//!
//! let engine = Engine::new(Config::load_or_default(None::<&str>)?)?;
//! let fragment = engine.document(&["create_user"], &[ErrorCode::AUTH_REQUIRED]);
//! println!("{}", fragment.to_json());
//! # Ok::<(), faultline::FaultlineError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;

pub use crate::config::Config;
pub use crate::core::{
    default_http_status, documented, guard, ApiError, ContextValue, DocumentedOperation, Engine,
    ErrorCode, ErrorDetail, ErrorResponse,
};
pub use crate::error::{FaultlineError, Result};
