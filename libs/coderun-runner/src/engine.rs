/// Execution Engine - Abstraction for running one command
///
/// **Core Responsibility:**
/// Run a single toolchain command inside a workspace and capture raw output.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW a command runs (local process, container, microVM)
/// - Engine does NOT know about compile-then-run sequencing
/// - Engine does NOT interpret stderr
///
/// `ProcessRunner` is the local implementation. A sandboxing backend
/// (container or microVM with CPU/memory/PID/network limits) slots in here
/// without touching the orchestrator.

use async_trait::async_trait;
use coderun_common::{ProcessResult, RunnerError};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::process::{CommandSpec, ProcessRunner, RunOptions};

/// Execution engine trait
///
/// Any implementation must guarantee:
/// 1. Run the command with `options.cwd` as working directory
/// 2. Respect `options.timeout` and flag `timed_out` when it fires
/// 3. Capture stdout/stderr up to `options.max_output_bytes`
/// 4. Return `RunnerError::Spawn` only when the program could not start
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn run(
        &self,
        command: &CommandSpec,
        options: &RunOptions,
    ) -> Result<ProcessResult, RunnerError>;
}

#[async_trait]
impl ExecutionEngine for ProcessRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        options: &RunOptions,
    ) -> Result<ProcessResult, RunnerError> {
        ProcessRunner::run(self, command, options).await
    }
}

/// Shared engines, including `Arc<dyn ExecutionEngine>` for type-erased state
#[async_trait]
impl<T: ExecutionEngine + ?Sized> ExecutionEngine for Arc<T> {
    async fn run(
        &self,
        command: &CommandSpec,
        options: &RunOptions,
    ) -> Result<ProcessResult, RunnerError> {
        (**self).run(command, options).await
    }
}

/// One call observed by [`DummyEngine`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub command: CommandSpec,
    pub cwd: PathBuf,
    pub stdin: Option<String>,
    /// Workspace contents at the moment of the call
    pub files: Vec<String>,
}

/// Dummy execution engine for testing without toolchains
///
/// **Dummy Execution Rules:**
/// 1. Scripted results are returned in order, one per call
/// 2. Once the script runs out: stdout = stdin, exit code 0
/// 3. Every call is recorded, including the workspace listing
#[derive(Debug, Default)]
pub struct DummyEngine {
    script: Mutex<VecDeque<Result<ProcessResult, String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl DummyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result for the next call
    pub fn then(self, result: ProcessResult) -> Self {
        self.push(Ok(result));
        self
    }

    /// Queue a spawn failure for the next call
    pub fn then_spawn_error(self, program: &str) -> Self {
        self.push(Err(program.to_string()));
        self
    }

    fn push(&self, entry: Result<ProcessResult, String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

fn list_files(dir: &std::path::Path) -> Vec<String> {
    let mut files: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

#[async_trait]
impl ExecutionEngine for DummyEngine {
    async fn run(
        &self,
        command: &CommandSpec,
        options: &RunOptions,
    ) -> Result<ProcessResult, RunnerError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                command: command.clone(),
                cwd: options.cwd.clone(),
                stdin: options.stdin.clone(),
                files: list_files(&options.cwd),
            });
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(result)) => Ok(result),
            Some(Err(program)) => Err(RunnerError::Spawn {
                program,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn failure"),
            }),
            None => Ok(ProcessResult {
                stdout: options.stdin.clone().unwrap_or_default(),
                exit_code: Some(0),
                duration_ms: 5,
                ..Default::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn options(stdin: Option<&str>) -> RunOptions {
        RunOptions {
            cwd: std::env::temp_dir(),
            stdin: stdin.map(str::to_string),
            timeout: Duration::from_secs(1),
            max_output_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn test_dummy_engine_echo() {
        let engine = DummyEngine::new();
        let cmd = CommandSpec::new("python3", vec!["main.py".into()]);

        let output = engine.run(&cmd, &options(Some("hello world"))).await.unwrap();

        assert_eq!(output.stdout, "hello world");
        assert_eq!(output.stderr, "");
        assert_eq!(output.exit_code, Some(0));
        assert!(!output.timed_out);
    }

    #[tokio::test]
    async fn test_dummy_engine_follows_script() {
        let engine = DummyEngine::new()
            .then(ProcessResult {
                stderr: "main.c:1:1: error: nope".into(),
                exit_code: Some(1),
                ..Default::default()
            })
            .then_spawn_error("./main");
        let cmd = CommandSpec::new("gcc", vec![]);

        let first = engine.run(&cmd, &options(None)).await.unwrap();
        assert_eq!(first.exit_code, Some(1));

        let second = engine.run(&cmd, &options(None)).await;
        assert!(matches!(second, Err(RunnerError::Spawn { .. })));

        let third = engine.run(&cmd, &options(Some("x"))).await.unwrap();
        assert_eq!(third.stdout, "x");

        let calls = engine.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].stdin.as_deref(), Some("x"));
    }
}
