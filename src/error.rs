use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;

/// Errors that stop a judging run. Per-case problems never surface here;
/// they are folded into a `Verdict` instead.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("compilation failed ({status})")]
    Compile {
        status: ExitStatus,
        diagnostics: String,
    },

    #[error("compiler `{0}` not found")]
    CompilerNotFound(String),

    #[error("no test cases found for problem `{problem}` under {roots}")]
    NoTestCases { problem: String, roots: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to scan test data: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JudgeError {
    pub(crate) fn file(path: &Path, source: std::io::Error) -> Self {
        Self::File {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, JudgeError>;
