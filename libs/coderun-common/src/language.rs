use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics;
use crate::error::RunnerError;
use crate::types::Diagnostic;

/// Strongly-typed language enum
/// Each variant maps to exactly one compiled-in toolchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    C,
    Cpp,
    Java,
}

/// Toolchain description for one language.
///
/// Commands are argument vectors run inside the workspace directory; the
/// submitted code only ever reaches them as the fixed `source_file` path.
#[derive(Debug)]
pub struct LanguageSpec {
    pub source_file: &'static str,
    pub compile: Option<&'static [&'static str]>,
    pub run: &'static [&'static str],
    pub parse_diagnostics: fn(&str) -> Vec<Diagnostic>,
}

impl LanguageSpec {
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }
}

static PYTHON: LanguageSpec = LanguageSpec {
    source_file: "main.py",
    compile: None,
    run: &["python3", "main.py"],
    parse_diagnostics: diagnostics::parse_python,
};

static JAVASCRIPT: LanguageSpec = LanguageSpec {
    source_file: "main.js",
    compile: None,
    run: &["node", "main.js"],
    parse_diagnostics: diagnostics::parse_javascript,
};

static C: LanguageSpec = LanguageSpec {
    source_file: "main.c",
    compile: Some(&["gcc", "-O2", "-std=c11", "-o", "main", "main.c", "-lm"]),
    run: &["./main"],
    parse_diagnostics: diagnostics::parse_gcc,
};

static CPP: LanguageSpec = LanguageSpec {
    source_file: "main.cpp",
    compile: Some(&["g++", "-O2", "-std=c++17", "-o", "main", "main.cpp"]),
    run: &["./main"],
    parse_diagnostics: diagnostics::parse_gcc,
};

static JAVA: LanguageSpec = LanguageSpec {
    source_file: "Main.java",
    compile: Some(&["javac", "Main.java"]),
    run: &["java", "-cp", ".", "Main"],
    parse_diagnostics: diagnostics::parse_javac,
};

impl Language {
    /// Returns all language variants
    /// This is the single source of truth for available languages
    pub fn all_variants() -> &'static [Language] {
        &[
            Language::Python,
            Language::JavaScript,
            Language::C,
            Language::Cpp,
            Language::Java,
        ]
    }

    /// Parse a language from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Language> {
        match s.trim().to_lowercase().as_str() {
            "python" => Some(Language::Python),
            "javascript" => Some(Language::JavaScript),
            "c" => Some(Language::C),
            "cpp" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    /// Resolve an identifier or fail with the supported set attached
    pub fn lookup(s: &str) -> Result<Language, RunnerError> {
        Language::from_str(s).ok_or_else(|| RunnerError::UnsupportedLanguage {
            language: s.to_string(),
            supported: Language::supported_names(),
        })
    }

    pub fn supported_names() -> Vec<String> {
        Language::all_variants()
            .iter()
            .map(|l| l.to_string())
            .collect()
    }

    pub fn spec(self) -> &'static LanguageSpec {
        match self {
            Language::Python => &PYTHON,
            Language::JavaScript => &JAVASCRIPT,
            Language::C => &C,
            Language::Cpp => &CPP,
            Language::Java => &JAVA,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::JavaScript => write!(f, "javascript"),
            Language::C => write!(f, "c"),
            Language::Cpp => write!(f, "cpp"),
            Language::Java => write!(f, "java"),
        }
    }
}
