//! Stage 2: PDF → Markdown via MinerU.
//!
//! MinerU writes into a directory tree whose shape depends on its version
//! and backend, so the Markdown file is looked up in the known layouts
//! first and by exhaustive search after that:
//!
//! ```text
//! .mineru_temp_<out>/<stem>.md
//! .mineru_temp_<out>/<stem>/auto/<stem>.md
//! .mineru_temp_<out>/auto/<stem>.md
//! .mineru_temp_<out>/**/*.md           (first in sorted walk order)
//! ```
//!
//! `<stem>` is the PDF's stem and `<out>` the stem of the requested
//! Markdown file, which stays unique when several PDFs share a stem.
//!
//! The scratch tree is left in place on success because the image stage
//! still reads from it.

use super::pdf::display_name;
use super::process::{combined_output, run_tool};
use super::{Extraction, MarkdownExtractor};
use crate::config::Backend;
use crate::error::JobError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

const TOOL: &str = "MinerU";

/// MinerU defaults to GPU inference; force CPU unless the caller chose.
pub const DEVICE_MODE_VAR: &str = "MINERU_DEVICE_MODE";

/// [`MarkdownExtractor`] backed by the `mineru` binary.
#[derive(Debug, Clone)]
pub struct MineruExtractor {
    program: PathBuf,
}

impl MineruExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, pdf: &Path, scratch_dir: &Path, backend: Backend) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-p")
            .arg(pdf)
            .arg("-o")
            .arg(scratch_dir)
            .arg("--backend")
            .arg(backend.mineru_name());
        if std::env::var_os(DEVICE_MODE_VAR).is_none() {
            cmd.env(DEVICE_MODE_VAR, "cpu");
        }
        cmd
    }
}

/// Scratch directory MinerU writes into, next to `output_path`.
pub fn scratch_dir_for(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!(".mineru_temp_{stem}"))
}

#[async_trait]
impl MarkdownExtractor for MineruExtractor {
    async fn extract(
        &self,
        pdf: &Path,
        output_path: &Path,
        backend: Backend,
        timeout: Duration,
    ) -> Result<Extraction, JobError> {
        if !pdf.exists() {
            return Err(JobError::InputNotFound {
                path: pdf.to_path_buf(),
            });
        }
        let name = display_name(pdf);
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let scratch_dir = scratch_dir_for(output_path);
        tokio::fs::create_dir_all(&scratch_dir)
            .await
            .map_err(|e| JobError::io(&scratch_dir, e))?;

        let result = async {
            let cmd = self.command(pdf, &scratch_dir, backend);
            let output = run_tool(cmd, TOOL, &name, timeout).await?;

            let found = find_markdown(&scratch_dir, &stem).ok_or_else(|| {
                JobError::MarkdownMissing {
                    name: name.clone(),
                    tool_output: combined_output(&output),
                }
            })?;
            debug!("{name}: MinerU wrote {}", found.display());
            move_file(&found, output_path).await
        }
        .await;

        match result {
            Ok(()) => Ok(Extraction {
                markdown_path: output_path.to_path_buf(),
                scratch_dir,
            }),
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_dir_all(&scratch_dir).await {
                    warn!("Could not remove {}: {rm}", scratch_dir.display());
                }
                Err(e)
            }
        }
    }
}

/// Locate the Markdown file MinerU produced for `stem` under `scratch_dir`.
pub fn find_markdown(scratch_dir: &Path, stem: &str) -> Option<PathBuf> {
    let file_name = format!("{stem}.md");
    let candidates = [
        scratch_dir.join(&file_name),
        scratch_dir.join(stem).join("auto").join(&file_name),
        scratch_dir.join("auto").join(&file_name),
    ];
    if let Some(hit) = candidates.into_iter().find(|p| p.is_file()) {
        return Some(hit);
    }

    WalkDir::new(scratch_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .find(|p| p.extension().is_some_and(|ext| ext == "md"))
}

/// Rename `from` to `to`, falling back to copy + remove across file systems.
pub async fn move_file(from: &Path, to: &Path) -> Result<(), JobError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| JobError::io(to, e))?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| JobError::io(from, e))
}
