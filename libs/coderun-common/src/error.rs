use std::io;

use thiserror::Error;

/// Failures that stop an execution before a result can be produced.
///
/// Compile errors, non-zero exits and timeouts are not in here: those are
/// ordinary outcomes of running user code and travel in
/// [`ExecutionResponse`](crate::types::ExecutionResponse).
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("unsupported language '{language}'")]
    UnsupportedLanguage {
        language: String,
        supported: Vec<String>,
    },

    #[error("code is {size} bytes, limit is {limit}")]
    CodeTooLarge { size: usize, limit: usize },

    #[error("no execution slot available")]
    Busy,

    #[error("workspace error: {context}: {source}")]
    Workspace {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A compiled-in toolchain entry is unusable
    #[error("toolchain misconfigured: {0}")]
    Toolchain(String),

    #[error("process i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl RunnerError {
    pub fn workspace(context: impl Into<String>, source: io::Error) -> Self {
        RunnerError::Workspace {
            context: context.into(),
            source,
        }
    }

    /// HTTP status this error maps to at the service boundary
    pub fn status_code(&self) -> u16 {
        match self {
            RunnerError::Validation(_) | RunnerError::UnsupportedLanguage { .. } => 400,
            RunnerError::CodeTooLarge { .. } => 413,
            RunnerError::Busy => 503,
            RunnerError::Workspace { .. }
            | RunnerError::Spawn { .. }
            | RunnerError::Toolchain(_)
            | RunnerError::Io(_) => 500,
        }
    }

    /// Stable machine-readable error kind for response payloads
    pub fn kind(&self) -> &'static str {
        match self {
            RunnerError::Validation(_) => "invalid_request",
            RunnerError::UnsupportedLanguage { .. } => "unsupported_language",
            RunnerError::CodeTooLarge { .. } => "code_too_large",
            RunnerError::Busy => "busy",
            RunnerError::Workspace { .. }
            | RunnerError::Spawn { .. }
            | RunnerError::Toolchain(_)
            | RunnerError::Io(_) => "run_failed",
        }
    }

    /// Infrastructure faults: details stay in server logs
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500 && !matches!(self, RunnerError::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_4xx() {
        let err = RunnerError::Validation("code must be a string".into());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.kind(), "invalid_request");

        let err = RunnerError::UnsupportedLanguage {
            language: "ruby".into(),
            supported: vec!["python".into()],
        };
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.kind(), "unsupported_language");
        assert_eq!(err.to_string(), "unsupported language 'ruby'");

        let err = RunnerError::CodeTooLarge { size: 10, limit: 5 };
        assert_eq!(err.status_code(), 413);
    }

    #[test]
    fn test_infrastructure_errors_are_internal() {
        let err = RunnerError::Spawn {
            program: "gcc".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.kind(), "run_failed");
        assert!(err.is_internal());

        let err = RunnerError::workspace(
            "create /tmp/x",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_internal());

        let err = RunnerError::Toolchain("empty run command".into());
        assert_eq!(err.status_code(), 500);
        assert!(err.is_internal());

        assert!(!RunnerError::Busy.is_internal());
        assert_eq!(RunnerError::Busy.status_code(), 503);
    }
}
