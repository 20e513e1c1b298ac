//! Error types for evaluation runs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("configuration error:\n{}", bullet_list(.0))]
    Configuration(Vec<String>),

    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid dataset {}:\n{}", .path.display(), bullet_list(.problems))]
    Dataset { path: PathBuf, problems: Vec<String> },
}

/// Failure of a single completion call. Never raised for an empty completion.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Result type for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  - {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
