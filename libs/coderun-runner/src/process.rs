/// Process Runner - spawn, feed, drain, time out
///
/// **Guarantees:**
/// - Programs are spawned from an argument vector, never through a shell
/// - stdout and stderr are drained concurrently while the process runs,
///   so a chatty program cannot fill a pipe and stall
/// - Captured output is capped; the excess is read and discarded
/// - On timeout the whole process group is SIGKILLed and the result is
///   flagged `timed_out` with no exit code
/// - Descendants left in the group are killed once the program exits
/// - Spawn failures are errors; non-zero exits are ordinary results

use coderun_common::{ProcessResult, RunnerError};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Host variables passed through to user programs; everything else is dropped
const ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "LANG", "LC_ALL", "JAVA_HOME", "SYSTEMROOT"];

/// How long to wait for the output pipes to close once the process is gone
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8192;

/// Program plus argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a toolchain argv, resolving `./` programs against `dir`
    /// so they never depend on the service's own working directory.
    pub fn from_argv(argv: &[&str], dir: &Path) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        let program = match program.strip_prefix("./") {
            Some(local) => dir.join(local),
            None => PathBuf::from(program),
        };
        Some(Self {
            program,
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    pub fn display_name(&self) -> String {
        self.program.display().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub cwd: PathBuf,
    /// None connects stdin to null, so reads see EOF immediately
    pub stdin: Option<String>,
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

/// Local child-process runner
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        ProcessRunner
    }

    pub async fn run(
        &self,
        spec: &CommandSpec,
        options: &RunOptions,
    ) -> Result<ProcessResult, RunnerError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&options.cwd)
            .env_clear()
            .stdin(if options.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for key in ENV_ALLOWLIST {
            if let Some(value) = std::env::var_os(key) {
                command.env(key, value);
            }
        }

        // Own process group, so forked children can be killed with the leader
        #[cfg(unix)]
        command.process_group(0);

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            program: spec.display_name(),
            source,
        })?;

        // Also the process group id
        let pid = child.id();
        debug!(
            program = %spec.display_name(),
            args = ?spec.args,
            pid,
            "process spawned"
        );

        let stdin_task = feed_stdin(&mut child, options.stdin.clone());
        let stdout_drain = child
            .stdout
            .take()
            .map(|out| Drain::spawn(out, options.max_output_bytes));
        let stderr_drain = child
            .stderr
            .take()
            .map(|err| Drain::spawn(err, options.max_output_bytes));

        let (status, timed_out) = match tokio::time::timeout(options.timeout, child.wait()).await
        {
            Ok(status) => (Some(status?), false),
            Err(_) => {
                warn!(
                    program = %spec.display_name(),
                    timeout_ms = options.timeout.as_millis() as u64,
                    "process exceeded timeout, killing"
                );
                kill_tree(&mut child, pid).await;
                (None, true)
            }
        };

        // The leader is gone; nothing it forked may outlive the request
        kill_group(pid);

        let (stdout, out_truncated) = collect(stdout_drain, pid).await;
        let (stderr, err_truncated) = collect(stderr_drain, pid).await;
        if let Some(task) = stdin_task {
            task.abort();
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let (exit_code, signal) = match status {
            Some(status) => (status.code(), exit_signal(&status)),
            None => (None, killed_signal()),
        };

        debug!(
            program = %spec.display_name(),
            exit_code = ?exit_code,
            signal = ?signal,
            timed_out,
            duration_ms,
            "process finished"
        );

        Ok(ProcessResult {
            stdout,
            stderr,
            exit_code,
            signal,
            timed_out,
            truncated: out_truncated || err_truncated,
            duration_ms,
        })
    }
}

/// Write stdin on its own task and close the pipe when done
fn feed_stdin(child: &mut Child, input: Option<String>) -> Option<JoinHandle<()>> {
    let mut pipe = child.stdin.take()?;
    let input = input?;
    Some(tokio::spawn(async move {
        if let Err(e) = pipe.write_all(input.as_bytes()).await {
            // The program may exit without reading its input
            if e.kind() != io::ErrorKind::BrokenPipe {
                debug!(error = %e, "failed to write stdin");
            }
        }
        let _ = pipe.shutdown().await;
    }))
}

/// Bytes kept from one pipe so far
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// A pipe being read on its own task into a shared buffer.
/// The buffer outlives the task, so an aborted read keeps what it got.
struct Drain {
    buffer: Arc<Mutex<Captured>>,
    task: JoinHandle<io::Result<()>>,
}

impl Drain {
    fn spawn<R>(reader: R, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Captured::default()));
        let task = tokio::spawn(drain(reader, limit, buffer.clone()));
        Drain { buffer, task }
    }

    fn take(&self) -> (String, bool) {
        match self.buffer.lock() {
            Ok(mut captured) => {
                let captured = std::mem::take(&mut *captured);
                (
                    String::from_utf8_lossy(&captured.bytes).into_owned(),
                    captured.truncated,
                )
            }
            Err(_) => (String::new(), false),
        }
    }
}

/// Read a pipe to EOF, keeping at most `limit` bytes
async fn drain<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
    buffer: Arc<Mutex<Captured>>,
) -> io::Result<()> {
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        keep(&buffer, &chunk[..n], limit);
    }
}

fn keep(buffer: &Mutex<Captured>, data: &[u8], limit: usize) {
    let Ok(mut captured) = buffer.lock() else {
        return;
    };
    let room = limit.saturating_sub(captured.bytes.len());
    if data.len() > room {
        captured.bytes.extend_from_slice(&data[..room]);
        captured.truncated = true;
    } else {
        captured.bytes.extend_from_slice(data);
    }
}

async fn collect(drain: Option<Drain>, pgid: Option<u32>) -> (String, bool) {
    let Some(mut drain) = drain else {
        return (String::new(), false);
    };

    match tokio::time::timeout(DRAIN_GRACE, &mut drain.task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!(error = %e, "failed to read process output"),
        Ok(Err(e)) => warn!(error = %e, "output reader task failed"),
        Err(_) => {
            // Only a descendant that left the process group can hold the pipe now
            warn!(pgid = ?pgid, "output pipe still open after exit, keeping partial output");
            kill_group(pgid);
            drain.task.abort();
        }
    }

    drain.take()
}

async fn kill_tree(child: &mut Child, pgid: Option<u32>) {
    kill_group(pgid);
    if let Err(e) = child.kill().await {
        debug!(error = %e, "child already gone");
    }
}

#[cfg(unix)]
fn kill_group(pgid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pgid) = pgid.and_then(|id| i32::try_from(id).ok()) {
        if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            debug!(pgid, error = %e, "killpg failed");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: Option<u32>) {}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

#[cfg(unix)]
fn killed_signal() -> Option<i32> {
    Some(nix::sys::signal::Signal::SIGKILL as i32)
}

#[cfg(not(unix))]
fn killed_signal() -> Option<i32> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    fn options(dir: &Path) -> RunOptions {
        RunOptions {
            cwd: dir.to_path_buf(),
            stdin: None,
            timeout: Duration::from_secs(5),
            max_output_bytes: 1024 * 1024,
        }
    }

    #[test]
    fn test_from_argv_resolves_local_programs() {
        let dir = Path::new("/tmp/ws");
        let cmd = CommandSpec::from_argv(&["./main"], dir).unwrap();
        assert_eq!(cmd.program, PathBuf::from("/tmp/ws/main"));
        assert!(cmd.args.is_empty());

        let cmd = CommandSpec::from_argv(&["python3", "main.py"], dir).unwrap();
        assert_eq!(cmd.program, PathBuf::from("python3"));
        assert_eq!(cmd.args, vec!["main.py"]);

        assert!(CommandSpec::from_argv(&[], dir).is_none());
    }

    #[tokio::test]
    async fn test_captures_stdout_stderr_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessRunner::new()
            .run(&sh("echo out; echo err 1>&2; exit 3"), &options(dir.path()))
            .await
            .unwrap();

        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.exit_code, Some(3));
        assert!(!result.timed_out);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_stdin_is_fed_and_closed() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path());
        opts.stdin = Some("hello\nworld\n".to_string());

        let result = ProcessRunner::new().run(&sh("cat"), &opts).await.unwrap();

        assert_eq!(result.stdout, "hello\nworld\n");
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_missing_stdin_reads_eof() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessRunner::new()
            .run(&sh("cat; echo done"), &options(dir.path()))
            .await
            .unwrap();

        assert_eq!(result.stdout, "done\n");
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();

        let result = ProcessRunner::new()
            .run(&sh("cat marker.txt"), &options(dir.path()))
            .await
            .unwrap();

        assert_eq!(result.stdout, "here");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path());
        opts.timeout = Duration::from_millis(200);

        let started = Instant::now();
        let result = ProcessRunner::new()
            .run(&sh("while true; do :; done"), &opts)
            .await
            .unwrap();

        assert!(result.timed_out);
        assert_eq!(result.exit_code, None);
        assert_eq!(result.signal, Some(9));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_timeout_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path());
        opts.timeout = Duration::from_millis(200);

        // The background sleep keeps stdout open unless the group dies
        let started = Instant::now();
        let result = ProcessRunner::new()
            .run(&sh("sleep 30 & sleep 30"), &opts)
            .await
            .unwrap();

        assert!(result.timed_out);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_background_descendant_does_not_lose_output() {
        let dir = tempfile::tempdir().unwrap();

        let started = Instant::now();
        let result = ProcessRunner::new()
            .run(&sh("echo hello; sleep 30 &"), &options(dir.path()))
            .await
            .unwrap();

        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.truncated);
        assert!(!result.timed_out);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        // Zombies waiting for a reaper count as dead
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map(|rest| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_detached_descendant_is_killed_after_exit() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessRunner::new()
            .run(
                &sh("sleep 37 >/dev/null 2>&1 </dev/null & echo $!"),
                &options(dir.path()),
            )
            .await
            .unwrap();

        let pid: u32 = result.stdout.trim().parse().unwrap();
        let mut alive = true;
        for _ in 0..50 {
            if !is_running(pid) {
                alive = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "descendant {} outlived the run", pid);
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path());
        opts.max_output_bytes = 100;

        let result = ProcessRunner::new()
            .run(&sh("head -c 200000 /dev/zero | tr '\\0' 'a'"), &opts)
            .await
            .unwrap();

        assert_eq!(result.stdout.len(), 100);
        assert!(result.truncated);
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_large_output_does_not_deadlock() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessRunner::new()
            .run(
                &sh("head -c 500000 /dev/zero | tr '\\0' 'b'; head -c 500000 /dev/zero | tr '\\0' 'c' 1>&2"),
                &options(dir.path()),
            )
            .await
            .unwrap();

        assert_eq!(result.stdout.len(), 500000);
        assert_eq!(result.stderr.len(), 500000);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = CommandSpec::new("definitely-not-a-real-binary-xyz", vec![]);
        let err = ProcessRunner::new()
            .run(&cmd, &options(dir.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::Spawn { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_host_environment_is_not_inherited() {
        std::env::set_var("CODERUN_TEST_SECRET", "hunter2");
        let dir = tempfile::tempdir().unwrap();
        let result = ProcessRunner::new()
            .run(&sh("echo \"[$CODERUN_TEST_SECRET]\""), &options(dir.path()))
            .await
            .unwrap();

        assert_eq!(result.stdout, "[]\n");
    }
}
