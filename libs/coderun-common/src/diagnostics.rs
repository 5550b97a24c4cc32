/// Diagnostics Mapper - stderr text to editor positions
///
/// **Core Responsibility:**
/// Turn the raw error text of a compiler or interpreter into
/// (line, column, severity, message) records.
///
/// **Properties:**
/// - Pure: string in, records out, no filesystem access
/// - Never fails: unrecognised text yields an empty list
/// - Records come back in the order they appear in stderr

use lazy_static::lazy_static;
use regex::Regex;

use crate::language::Language;
use crate::types::{Diagnostic, Severity};

/// End column used when the toolchain reports no column
pub const UNKNOWN_END_COLUMN: u32 = 1000;

lazy_static! {
    // main.c:3:5: error: expected ';' before '}' token
    static ref GCC_LINE: Regex = Regex::new(
        r"(?m)^(?P<file>[^:\n]+):(?P<line>\d+):(?P<col>\d+): (?P<sev>fatal error|error|warning): (?P<msg>.*)$"
    ).expect("gcc diagnostic pattern compiles");

    // Main.java:3: error: ';' expected
    static ref JAVAC_LINE: Regex = Regex::new(
        r"(?m)^(?P<file>[^:\n]+\.java):(?P<line>\d+): (?P<sev>error|warning): (?P<msg>.*)$"
    ).expect("javac diagnostic pattern compiles");

    //   File "/tmp/coderun-.../main.py", line 1
    static ref PY_FRAME: Regex = Regex::new(
        r#"File "(?P<file>[^"]+)", line (?P<line>\d+)"#
    ).expect("python frame pattern compiles");

    // at Object.<anonymous> (/tmp/coderun-.../main.js:2:7)
    static ref JS_MAIN_POS: Regex = Regex::new(
        r"main\.js:(?P<line>\d+):(?P<col>\d+)"
    ).expect("node position pattern compiles");

    // /tmp/coderun-.../main.js:2   (header node prints above the source excerpt)
    static ref JS_MAIN_HEADER: Regex = Regex::new(
        r"(?m)main\.js:(?P<line>\d+)\s*$"
    ).expect("node header pattern compiles");

    // Any `<path>:L:C`; the path decides whether the frame is user code
    static ref JS_ANY_POS: Regex = Regex::new(
        r"(?P<path>[^\s()]*):(?P<line>\d+):(?P<col>\d+)"
    ).expect("generic position pattern compiles");

    static ref JS_ERROR_LINE: Regex = Regex::new(
        r"(?m)^(?:Uncaught )?(?:[A-Za-z_$][\w$]*)?(?:Error|Exception)\b.*$"
    ).expect("node error line pattern compiles");
}

fn is_node_internal(path: &str) -> bool {
    path.starts_with("node:") || path.starts_with("internal/")
}

/// Parse stderr for the given language
pub fn parse(language: Language, stderr: &str) -> Vec<Diagnostic> {
    (language.spec().parse_diagnostics)(stderr)
}

fn positive(text: &str) -> Option<u32> {
    text.parse::<u32>().ok().filter(|n| *n > 0)
}

/// gcc / g++: `<file>:<line>:<col>: <severity>: <message>`
pub fn parse_gcc(stderr: &str) -> Vec<Diagnostic> {
    GCC_LINE
        .captures_iter(stderr)
        .filter_map(|caps| {
            let line = positive(&caps["line"])?;
            let column = positive(&caps["col"])?;
            let severity = match &caps["sev"] {
                "warning" => Severity::Warning,
                _ => Severity::Error,
            };
            Some(Diagnostic {
                line,
                column,
                end_column: column.saturating_add(1),
                severity,
                message: caps["msg"].trim().to_string(),
            })
        })
        .collect()
}

/// javac: `<file>:<line>: error: <message>`, column unknown
pub fn parse_javac(stderr: &str) -> Vec<Diagnostic> {
    JAVAC_LINE
        .captures_iter(stderr)
        .filter_map(|caps| {
            let line = positive(&caps["line"])?;
            let severity = match &caps["sev"] {
                "warning" => Severity::Warning,
                _ => Severity::Error,
            };
            Some(Diagnostic {
                line,
                column: 1,
                end_column: UNKNOWN_END_COLUMN,
                severity,
                message: caps["msg"].trim().to_string(),
            })
        })
        .collect()
}

/// CPython traceback: last frame in the submitted file gives the line,
/// last non-empty line gives the message
pub fn parse_python(stderr: &str) -> Vec<Diagnostic> {
    let frames: Vec<(String, u32)> = PY_FRAME
        .captures_iter(stderr)
        .filter_map(|caps| Some((caps["file"].to_string(), positive(&caps["line"])?)))
        .collect();

    let in_user_code = |file: &str| file.ends_with("main.py") || file == "<string>";
    let line = frames
        .iter()
        .rev()
        .find(|(file, _)| in_user_code(file))
        .or_else(|| frames.last())
        .map(|(_, line)| *line);

    let Some(line) = line else {
        return Vec::new();
    };

    let message = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string();

    vec![Diagnostic {
        line,
        column: 1,
        end_column: UNKNOWN_END_COLUMN,
        severity: Severity::Error,
        message,
    }]
}

/// Node.js: best-effort position search in the stack text
pub fn parse_javascript(stderr: &str) -> Vec<Diagnostic> {
    let position = JS_MAIN_POS
        .captures(stderr)
        .and_then(|caps| Some((positive(&caps["line"])?, positive(&caps["col"]))))
        .or_else(|| {
            JS_MAIN_HEADER
                .captures(stderr)
                .and_then(|caps| Some((positive(&caps["line"])?, None)))
        })
        .or_else(|| {
            JS_ANY_POS
                .captures_iter(stderr)
                .filter(|caps| !is_node_internal(&caps["path"]))
                .find_map(|caps| Some((positive(&caps["line"])?, positive(&caps["col"]))))
        });

    let Some((line, column)) = position else {
        return Vec::new();
    };

    let message = JS_ERROR_LINE
        .find(stderr)
        .map(|m| m.as_str().trim().to_string())
        .or_else(|| {
            stderr
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let (column, end_column) = match column {
        Some(col) => (col, col.saturating_add(1)),
        None => (1, UNKNOWN_END_COLUMN),
    };

    vec![Diagnostic {
        line,
        column,
        end_column,
        severity: Severity::Error,
        message,
    }]
}
