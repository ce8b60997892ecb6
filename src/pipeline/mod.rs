//! Pipeline stages for document-to-Markdown conversion.
//!
//! Each stage is a trait so the orchestrator can run against the real
//! external tools or against in-process fakes. Pre-built implementations
//! placed in [`crate::config::ConversionConfig`] take precedence over the
//! defaults listed here.
//!
//! ## Data Flow
//!
//! ```text
//! document ──▶ pdf ──────────▶ mineru ──────────▶ images
//! (.docx…)     (LibreOffice)   (PDF → Markdown)   (copy + relink)
//! ```
//!
//! 1. [`pdf`]    — [`PdfConverter`], default [`LibreOfficeConverter`]; skipped
//!    when the input already is a PDF
//! 2. [`mineru`] — [`MarkdownExtractor`], default [`MineruExtractor`]
//! 3. [`images`] — [`ImageRelocator`], default [`ScratchImageRelocator`]
//!
//! Both external tools run through [`process::run_tool`], which enforces a
//! wall-clock timeout and kills the child when it expires.

pub mod images;
pub mod mineru;
pub mod pdf;
pub mod process;

pub use images::ScratchImageRelocator;
pub use mineru::MineruExtractor;
pub use pdf::LibreOfficeConverter;

use crate::config::Backend;
use crate::error::JobError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Turns an office document into a PDF.
#[async_trait]
pub trait PdfConverter: Send + Sync {
    /// Convert `input`, writing the PDF into `scratch_dir` (created by the
    /// caller). Returns the path of the validated PDF.
    async fn convert(&self, input: &Path, scratch_dir: &Path) -> Result<PathBuf, JobError>;
}

/// Where an extractor left its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Final Markdown file, normally the requested output path.
    pub markdown_path: PathBuf,
    /// Tool scratch directory still holding extracted images. The caller
    /// removes it once images have been relocated.
    pub scratch_dir: PathBuf,
}

/// Turns a PDF into Markdown.
#[async_trait]
pub trait MarkdownExtractor: Send + Sync {
    /// Extract `pdf` into `output_path`.
    async fn extract(
        &self,
        pdf: &Path,
        output_path: &Path,
        backend: Backend,
        timeout: Duration,
    ) -> Result<Extraction, JobError>;
}

/// Moves images produced by the extractor next to the Markdown output.
pub trait ImageRelocator: Send + Sync {
    /// Copy images found under `scratch_dir` into `images_dir`, renaming
    /// them after `stem`, and point the references in `markdown_path` at
    /// the new copies. Returns the new image paths in discovery order.
    fn relocate(
        &self,
        markdown_path: &Path,
        scratch_dir: &Path,
        images_dir: &Path,
        stem: &str,
    ) -> Result<Vec<PathBuf>, JobError>;
}
