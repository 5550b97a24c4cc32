//! Two executions backed by real OS processes overlap in time and never
//! share a workspace.
#![cfg(unix)]

use async_trait::async_trait;
use coderun_common::{Config, ExecutionRequest, ProcessResult, RunnerError};
use coderun_runner::{CommandSpec, ExecutionEngine, Executor, ProcessRunner, RunOptions};
use std::path::Path;
use std::time::{Duration, Instant};

/// Runs `sleep 1; pwd` in place of the toolchain, through the real runner
struct SleepThenPwd(ProcessRunner);

#[async_trait]
impl ExecutionEngine for SleepThenPwd {
    async fn run(
        &self,
        _command: &CommandSpec,
        options: &RunOptions,
    ) -> Result<ProcessResult, RunnerError> {
        let cmd = CommandSpec::new("sh", vec!["-c".to_string(), "sleep 1; pwd".to_string()]);
        self.0.run(&cmd, options).await
    }
}

#[tokio::test]
async fn parallel_executions_overlap_and_stay_isolated() {
    let root = tempfile::tempdir().unwrap();
    let config = Config::default().with_temp_root(root.path());
    let executor = Executor::new(SleepThenPwd(ProcessRunner::new()), config);

    let request = ExecutionRequest::new("python", "print(1)");
    let started = Instant::now();
    let (a, b) = tokio::join!(executor.execute(&request), executor.execute(&request));
    let elapsed = started.elapsed();

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.exit_code, Some(0));
    assert_eq!(b.exit_code, Some(0));
    assert!(elapsed < Duration::from_millis(1900), "ran serially: {:?}", elapsed);

    let (cwd_a, cwd_b) = (a.stdout.trim(), b.stdout.trim());
    assert_ne!(cwd_a, cwd_b);
    assert!(!Path::new(cwd_a).exists());
    assert!(!Path::new(cwd_b).exists());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}
