/// Job Executor - Compile/Execute Orchestration
///
/// **Responsibility:**
/// Validate a request, claim a workspace, compile when the language needs
/// it, run, map stderr to diagnostics, tear the workspace down.
///
/// **State machine (per request):**
/// ```text
/// START -> WRITE_SOURCE -> compile step?
///   yes -> COMPILE -> exit 0? yes -> RUN -> DONE
///                             no  -> DONE (compile diagnostics, RUN skipped)
///   no  -> RUN -> DONE
/// ```
/// DONE always removes the workspace.
///
/// This module is the glue layer - it knows nothing about:
/// - How a command is spawned (engine's job)
/// - How a toolchain formats its errors (diagnostics' job)

use coderun_common::{
    diagnostics, Config, Diagnostic, ExecutionRequest, ExecutionResponse, Language, Phase,
    RunnerError, Severity,
};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::admission::Admission;
use crate::engine::ExecutionEngine;
use crate::process::{CommandSpec, ProcessRunner, RunOptions};
use crate::workspace::{Workspace, WorkspaceManager};

pub struct Executor<E = ProcessRunner> {
    engine: E,
    workspaces: WorkspaceManager,
    admission: Admission,
    config: Config,
}

impl Executor<ProcessRunner> {
    /// Executor backed by local child processes
    pub fn local(config: Config) -> Self {
        Executor::new(ProcessRunner::new(), config)
    }
}

impl<E: ExecutionEngine> Executor<E> {
    pub fn new(engine: E, config: Config) -> Self {
        Self {
            engine,
            workspaces: WorkspaceManager::new(config.temp_root.clone()),
            admission: Admission::new(config.max_concurrent, config.queue_timeout()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    /// Boundary checks, done before any filesystem or process work
    pub fn validate(&self, request: &ExecutionRequest) -> Result<Language, RunnerError> {
        if request.language.trim().is_empty() {
            return Err(RunnerError::Validation("language is required".to_string()));
        }
        let language = Language::lookup(&request.language)?;

        if request.code.len() > self.config.max_code_bytes {
            return Err(RunnerError::CodeTooLarge {
                size: request.code.len(),
                limit: self.config.max_code_bytes,
            });
        }
        if let Some(stdin) = &request.stdin {
            if stdin.len() > self.config.max_code_bytes {
                return Err(RunnerError::Validation(format!(
                    "stdin is {} bytes, limit is {}",
                    stdin.len(),
                    self.config.max_code_bytes
                )));
            }
        }

        Ok(language)
    }

    /// Execute a request end to end
    ///
    /// Compile errors, runtime errors and timeouts come back as `Ok`;
    /// `Err` is reserved for rejected requests and infrastructure faults.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResponse, RunnerError> {
        let language = self.validate(request)?;
        let _permit = self.admission.acquire().await?;

        info!(
            language = %language,
            code_bytes = request.code.len(),
            has_stdin = request.stdin.is_some(),
            "starting execution"
        );

        let response = self
            .workspaces
            .with_workspace(|workspace| self.run_in(workspace, language, request))
            .await?;

        info!(
            language = %language,
            phase = ?response.phase,
            exit_code = ?response.exit_code,
            timed_out = response.timed_out,
            duration_ms = response.duration_ms,
            diagnostics = response.diagnostics.len(),
            "execution finished"
        );

        Ok(response)
    }

    async fn run_in(
        &self,
        workspace: Workspace,
        language: Language,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResponse, RunnerError> {
        let spec = language.spec();
        let dir = workspace.path().to_path_buf();
        workspace.write_source(spec.source_file, &request.code).await?;

        let mut found: Vec<Diagnostic> = Vec::new();

        if let Some(compile) = spec.compile {
            let command = toolchain_command(compile, &dir)?;
            let options = RunOptions {
                cwd: dir.clone(),
                stdin: None,
                timeout: self.config.compile_timeout(),
                max_output_bytes: self.config.max_output_bytes,
            };

            debug!(workspace = %workspace.id(), language = %language, "compiling");
            let compiled = self.engine.run(&command, &options).await?;
            found = diagnostics::parse(language, &compiled.stderr);

            if !compiled.success() {
                if compiled.timed_out {
                    warn!(language = %language, "compilation timed out");
                }
                return Ok(ExecutionResponse::from_process(
                    Phase::Compile,
                    compiled,
                    &found,
                ));
            }

            // Compiler warnings stay attached to the run result
            found.retain(|d| d.severity == Severity::Warning);
        }

        let command = toolchain_command(spec.run, &dir)?;
        let options = RunOptions {
            cwd: dir,
            stdin: request.stdin.clone(),
            timeout: self.config.run_timeout(request.timeout_ms),
            max_output_bytes: self.config.max_output_bytes,
        };

        debug!(workspace = %workspace.id(), language = %language, "running");
        let ran = self.engine.run(&command, &options).await?;
        if !ran.success() {
            found.extend(diagnostics::parse(language, &ran.stderr));
        }

        Ok(ExecutionResponse::from_process(Phase::Run, ran, &found))
    }
}

fn toolchain_command(argv: &[&str], dir: &Path) -> Result<CommandSpec, RunnerError> {
    CommandSpec::from_argv(argv, dir)
        .ok_or_else(|| RunnerError::Toolchain("toolchain command is empty".to_string()))
}
