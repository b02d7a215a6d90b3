//! Error taxonomy for mdeck
//!
//! A single code block failing to highlight must never fail the surrounding
//! document render, and a single execution failing must never take down the
//! presenter. These types exist so those boundaries stay visible.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to highlight one code block. Callers degrade to the raw,
/// unhighlighted text.
#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("unknown language: {0}")]
    UnknownLanguage(String),

    #[error("unknown theme: {0}")]
    UnknownTheme(String),

    #[error("tokenizing failed: {0}")]
    Tokenize(String),
}

/// Failure to stage a code block for execution. Aborts only the one
/// execution attempt it belongs to.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to create workdir {path}: {source}")]
    Workdir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("language {0:?} is not runnable")]
    NotRunnable(String),
}
