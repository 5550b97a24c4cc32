use serde::{Deserialize, Serialize};

/// Execution Input (Immutable)
/// One inbound call owns exactly one request for its whole lifecycle.
///
/// `language` stays a plain string on the wire so that unknown identifiers
/// can be rejected with the list of supported ones instead of a generic
/// deserialization error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub language: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
            stdin: None,
            timeout_ms: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Raw outcome of one spawned process.
/// Produced once per process, never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    pub stdout: String,
    pub stderr: String,
    /// None when the process was killed or died from a signal
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    /// Output beyond the capture limit was discarded
    pub truncated: bool,
    pub duration_ms: u64,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Which step produced the reported result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Compile,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    /// Editor marker severity (error = 8, warning = 4)
    pub fn marker_code(self) -> u8 {
        match self {
            Severity::Error => 8,
            Severity::Warning => 4,
        }
    }
}

/// A position-tagged compiler or interpreter message.
/// Line and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub end_column: u32,
    pub severity: Severity,
    pub message: String,
}

/// Wire shape of a diagnostic, as consumed by the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorMarker {
    pub message: String,
    pub start_line_number: u32,
    pub end_line_number: u32,
    pub start_column: u32,
    pub end_column: u32,
    pub severity: u8,
}

impl From<&Diagnostic> for EditorMarker {
    fn from(d: &Diagnostic) -> Self {
        Self {
            message: d.message.clone(),
            start_line_number: d.line,
            end_line_number: d.line,
            start_column: d.column,
            end_column: d.end_column,
            severity: d.severity.marker_code(),
        }
    }
}

/// Execution Output
/// Compile failures, runtime failures and timeouts all land here;
/// they are results of running user code, not service errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub phase: Phase,
    pub duration_ms: u64,
    pub truncated: bool,
    pub diagnostics: Vec<EditorMarker>,
}

impl ExecutionResponse {
    pub fn from_process(phase: Phase, result: ProcessResult, diagnostics: &[Diagnostic]) -> Self {
        Self {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_code: result.exit_code,
            timed_out: result.timed_out,
            phase,
            duration_ms: result.duration_ms,
            truncated: result.truncated,
            diagnostics: diagnostics.iter().map(EditorMarker::from).collect(),
        }
    }
}
