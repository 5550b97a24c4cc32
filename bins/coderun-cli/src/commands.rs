use anyhow::{Context, Result};
use coderun_common::{Config, EditorMarker, ExecutionRequest, ExecutionResponse, Language, Phase};
use coderun_runner::Executor;
use std::io::Write;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Exit status reported for a run that hit its time limit
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Run one source file locally and return the exit status to report
pub async fn run_file(
    lang: &str,
    file: &Path,
    stdin: Option<&Path>,
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<i32> {
    let language = Language::lookup(lang)?;

    let code = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut request = ExecutionRequest::new(language.to_string(), code);
    if let Some(path) = stdin {
        request = request.with_stdin(read_stdin_source(path).await?);
    }
    if let Some(ms) = timeout_ms {
        request = request.with_timeout_ms(ms);
    }

    let executor = Executor::local(Config::from_env());
    let response = executor
        .execute(&request)
        .await
        .with_context(|| format!("Failed to run {}", file.display()))?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
        println!("{}", rendered);
    } else {
        print_response(language, &response)?;
    }

    Ok(exit_status(&response))
}

async fn read_stdin_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .context("Failed to read standard input")?;
        return Ok(input);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn print_response(language: Language, response: &ExecutionResponse) -> Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(response.stdout.as_bytes())
        .context("Failed to write stdout")?;
    out.flush().ok();

    let mut err = std::io::stderr().lock();
    err.write_all(response.stderr.as_bytes())
        .context("Failed to write stderr")?;

    let source_file = language.spec().source_file;
    for marker in &response.diagnostics {
        writeln!(err, "{}", format_marker(source_file, marker)).ok();
    }
    if response.truncated {
        writeln!(err, "[output truncated]").ok();
    }
    if response.timed_out {
        writeln!(err, "[timed out after {} ms]", response.duration_ms).ok();
    } else if response.phase == Phase::Compile && response.exit_code != Some(0) {
        writeln!(err, "[compilation failed]").ok();
    }
    Ok(())
}

/// `file:line:col: severity: message`, the shape editors and terminals link
pub fn format_marker(source_file: &str, marker: &EditorMarker) -> String {
    let severity = if marker.severity >= 8 { "error" } else { "warning" };
    format!(
        "{}:{}:{}: {}: {}",
        source_file, marker.start_line_number, marker.start_column, severity, marker.message
    )
}

pub fn exit_status(response: &ExecutionResponse) -> i32 {
    if response.timed_out {
        return TIMEOUT_EXIT_CODE;
    }
    match (response.phase, response.exit_code) {
        (Phase::Compile, Some(0)) | (Phase::Run, Some(0)) => 0,
        (Phase::Compile, _) => 1,
        (Phase::Run, Some(code)) => code,
        (Phase::Run, None) => 1,
    }
}

/// Print the supported languages
pub fn list_languages() {
    println!("{:<12} {:<12} {:<10}", "Name", "Source", "Compiled");
    println!("{}", "─".repeat(36));

    for language in Language::all_variants() {
        let spec = language.spec();
        println!(
            "{:<12} {:<12} {:<10}",
            language.to_string(),
            spec.source_file,
            if spec.is_compiled() { "yes" } else { "no" }
        );
    }

    println!("\nTotal: {} language(s)", Language::all_variants().len());
}
