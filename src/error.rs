//! Error types for the batch2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Batch2MdError`] — **Fatal**: the run cannot proceed at all
//!   (input directory missing, LibreOffice or MinerU not installed, invalid
//!   configuration). Returned as `Err(Batch2MdError)` from
//!   [`crate::convert::convert_directory`].
//!
//! * [`JobError`] — **Non-fatal**: a single document failed (corrupt input,
//!   converter timeout, no Markdown produced) but every other document is
//!   still processed. Its message is stored inside the failed
//!   [`crate::output::ConversionJob`] so the run summary can list it.

use crate::output::JobStatus;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the batch2md library.
///
/// Per-document failures use [`JobError`] and are recorded in the
/// [`crate::output::ConversionSummary`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Batch2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input directory does not exist.
    #[error("Input directory not found: '{path}'")]
    InputDirNotFound { path: PathBuf },

    /// The input path exists but is a file, not a directory.
    #[error("Input path is not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    // ── Environment errors ────────────────────────────────────────────────
    /// A required external converter is not installed.
    #[error("{0}")]
    ToolMissing(#[from] tool_locate::ToolLocateError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Batch2MdError {
    /// Process exit code the CLI should use for this error.
    ///
    /// Usage and environment problems share the total-failure code `2`;
    /// anything unexpected gets `3` so scripts can tell it apart from a run
    /// in which every document failed.
    pub fn exit_code(&self) -> u8 {
        match self {
            Batch2MdError::InputDirNotFound { .. }
            | Batch2MdError::NotADirectory { .. }
            | Batch2MdError::ToolMissing(_)
            | Batch2MdError::InvalidConfig(_) => 2,
            Batch2MdError::Internal(_) => 3,
        }
    }
}

/// A non-fatal error for a single document.
///
/// The orchestrator converts it to a string and stores it on the failed
/// [`crate::output::ConversionJob`]; the run continues with the next file.
#[derive(Debug, Error)]
pub enum JobError {
    /// The input document vanished between scanning and conversion.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// An external tool exited with a non-zero status.
    #[error("{tool} conversion failed for {name}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        name: String,
        stderr: String,
    },

    /// An external tool could not be spawned at all.
    #[error("Failed to launch {tool} for {name}: {source}")]
    ToolLaunch {
        tool: &'static str,
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// An external tool exceeded its wall-clock budget and was killed.
    #[error("{tool} conversion timed out after {secs}s for {name}")]
    Timeout {
        tool: &'static str,
        name: String,
        secs: u64,
    },

    /// The pre-converter exited cleanly but left no PDF behind.
    #[error("PDF output not created for {name}")]
    PdfMissing { name: String },

    /// The PDF produced is below the minimal size floor.
    #[error("PDF output is too small for {name} ({bytes} bytes)")]
    PdfTooSmall { name: String, bytes: u64 },

    /// The PDF produced does not start with the `%PDF` signature.
    #[error("Invalid PDF output for {name}: first bytes {magic:?}")]
    NotAPdf { name: String, magic: [u8; 4] },

    /// The extractor ran but no Markdown file could be found in its output.
    #[error("Markdown output not created for {name}{}", format_tool_output(.tool_output))]
    MarkdownMissing { name: String, tool_output: String },

    /// File-system operation failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A job was asked to move to a state its state machine forbids.
    #[error("Invalid job transition: {from} → {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl JobError {
    /// Wrap an `io::Error` with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JobError::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_tool_output(output: &str) -> String {
    if output.trim().is_empty() {
        String::new()
    } else {
        format!("\nMinerU output:\n{}", output.trim())
    }
}
