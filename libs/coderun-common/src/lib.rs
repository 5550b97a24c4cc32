pub mod config;
pub mod diagnostics;
pub mod error;
pub mod language;
pub mod types;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::RunnerError;
pub use language::{Language, LanguageSpec};
pub use types::{
    Diagnostic, EditorMarker, ExecutionRequest, ExecutionResponse, Phase, ProcessResult, Severity,
};
