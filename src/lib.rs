//! # batch2md
//!
//! Batch-convert office documents to Markdown.
//!
//! Every supported document under a directory is turned into a PDF with
//! LibreOffice (unless it already is one), handed to MinerU for PDF-to-Markdown
//! extraction, and written into a mirrored output tree with its images
//! collected in one shared `images/` directory.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input dir
//!  │
//!  ├─ 1. Scan     sorted list of supported documents (output tree excluded)
//!  ├─ 2. Resolve  mirrored output path, timestamp suffix on conflict
//!  ├─ 3. PDF      soffice --headless --convert-to pdf   (non-PDF input only)
//!  ├─ 4. Extract  mineru -p <pdf> -o <scratch> --backend <backend>
//!  ├─ 5. Images   copy into images/, relink the Markdown
//!  └─ 6. Summary  per-file jobs, counts, exit code
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch2md::{convert_directory, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder("./docs").max_workers(2).build()?;
//!     let summary = convert_directory(&config).await?;
//!     println!(
//!         "{}/{} converted",
//!         summary.successful(),
//!         summary.total_files()
//!     );
//!     std::process::exit(summary.exit_code().into());
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `batch2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! batch2md = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Tools
//!
//! | Tool | Needed for | Override |
//! |------|------------|----------|
//! | LibreOffice (`soffice`) | every non-PDF input | `BATCH2MD_SOFFICE` |
//! | MinerU (`mineru`) | every input | `BATCH2MD_MINERU` |
//!
//! Both are located before the first document is touched; a missing tool
//! is a fatal [`Batch2MdError::ToolMissing`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod scanner;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Backend, ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert_directory, convert_directory_sync};
pub use error::{Batch2MdError, JobError};
pub use format::{is_supported, requires_pdf_conversion, SupportedFormat};
pub use output::{
    ConversionJob, ConversionSummary, JobStatus, PlannedConversion, SummaryBuilder,
    SummaryReport,
};
pub use paths::{create_output_dirs, images_dir_for, resolve_output_path, OutputClaims};
pub use pipeline::{Extraction, ImageRelocator, MarkdownExtractor, PdfConverter};
pub use progress::{
    format_progress, ConversionProgressCallback, NoopProgressCallback, ProgressCallback,
};
pub use scanner::scan_documents;
