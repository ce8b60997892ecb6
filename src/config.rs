//! Configuration types for batch document conversion.
//!
//! All run behaviour is controlled through [`ConversionConfig`], built via
//! its [`ConversionConfigBuilder`]. The config is constructed once at the
//! start of a run and only read afterwards, so it can be shared freely
//! between workers.

use crate::error::Batch2MdError;
use crate::pipeline::{ImageRelocator, MarkdownExtractor, PdfConverter};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Name of the default output directory created inside the input directory.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "markdown";

/// Configuration for one batch conversion run.
///
/// # Example
/// ```rust
/// use batch2md::{Backend, ConversionConfig};
///
/// let config = ConversionConfig::builder("./docs")
///     .recursive(false)
///     .backend(Backend::Vlm)
///     .build()
///     .unwrap();
/// assert_eq!(config.output_dir(), std::path::Path::new("./docs/markdown"));
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory scanned for documents.
    pub input_dir: PathBuf,

    /// Where Markdown files are written. If None, uses `input_dir/markdown`.
    pub output_dir: Option<PathBuf>,

    /// Descend into subdirectories. Default: true.
    pub recursive: bool,

    /// Replace existing Markdown files instead of writing a timestamped
    /// sibling. Default: false.
    pub overwrite: bool,

    /// Only report what would be converted. Default: false.
    pub dry_run: bool,

    /// MinerU extraction backend. Default: [`Backend::Pipeline`].
    pub backend: Backend,

    /// Detailed per-stage reporting. Default: false.
    pub verbose: bool,

    /// Emit the run summary as JSON. Default: false.
    pub json_output: bool,

    /// Number of documents converted at once. Default: 1 (sequential).
    ///
    /// Each document still runs its stages in order; only whole documents
    /// overlap. MinerU is memory-hungry, so raise this with care.
    pub max_workers: usize,

    /// Wall-clock budget for one LibreOffice invocation, in seconds. Default: 120.
    pub pdf_timeout_secs: u64,

    /// Wall-clock budget for one MinerU invocation, in seconds. Default: 300.
    ///
    /// The VLM backends are far slower than `pipeline` on CPU; long documents
    /// may need several times the default.
    pub md_timeout_secs: u64,

    /// Pre-built PDF converter. Takes precedence over LibreOffice.
    pub pdf_converter: Option<Arc<dyn PdfConverter>>,

    /// Pre-built Markdown extractor. Takes precedence over MinerU.
    pub markdown_extractor: Option<Arc<dyn MarkdownExtractor>>,

    /// Pre-built image relocator. Takes precedence over the scratch-dir relocator.
    pub image_relocator: Option<Arc<dyn ImageRelocator>>,

    /// Receives per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl ConversionConfig {
    /// Config with every default, scanning `input_dir`.
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: None,
            recursive: true,
            overwrite: false,
            dry_run: false,
            backend: Backend::default(),
            verbose: false,
            json_output: false,
            max_workers: 1,
            pdf_timeout_secs: 120,
            md_timeout_secs: 300,
            pdf_converter: None,
            markdown_extractor: None,
            image_relocator: None,
            progress_callback: None,
        }
    }

    /// Create a new builder for `ConversionConfig`.
    pub fn builder(input_dir: impl Into<PathBuf>) -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::new(input_dir),
        }
    }

    /// The effective output directory.
    pub fn output_dir(&self) -> PathBuf {
        match self.output_dir {
            Some(ref dir) => dir.clone(),
            None => self.input_dir.join(DEFAULT_OUTPUT_DIR_NAME),
        }
    }

    /// Scratch directory for intermediate PDFs.
    pub fn scratch_dir(&self) -> PathBuf {
        self.output_dir().join(crate::paths::SCRATCH_PDF_DIR_NAME)
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("recursive", &self.recursive)
            .field("overwrite", &self.overwrite)
            .field("dry_run", &self.dry_run)
            .field("backend", &self.backend)
            .field("verbose", &self.verbose)
            .field("json_output", &self.json_output)
            .field("max_workers", &self.max_workers)
            .field("pdf_timeout_secs", &self.pdf_timeout_secs)
            .field("md_timeout_secs", &self.md_timeout_secs)
            .field(
                "pdf_converter",
                &self.pdf_converter.as_ref().map(|_| "<dyn PdfConverter>"),
            )
            .field(
                "markdown_extractor",
                &self
                    .markdown_extractor
                    .as_ref()
                    .map(|_| "<dyn MarkdownExtractor>"),
            )
            .field(
                "image_relocator",
                &self.image_relocator.as_ref().map(|_| "<dyn ImageRelocator>"),
            )
            .finish()
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.config.overwrite = v;
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn verbose(mut self, v: bool) -> Self {
        self.config.verbose = v;
        self
    }

    pub fn json_output(mut self, v: bool) -> Self {
        self.config.json_output = v;
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n.max(1);
        self
    }

    pub fn pdf_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pdf_timeout_secs = secs;
        self
    }

    pub fn md_timeout_secs(mut self, secs: u64) -> Self {
        self.config.md_timeout_secs = secs;
        self
    }

    pub fn pdf_converter(mut self, converter: Arc<dyn PdfConverter>) -> Self {
        self.config.pdf_converter = Some(converter);
        self
    }

    pub fn markdown_extractor(mut self, extractor: Arc<dyn MarkdownExtractor>) -> Self {
        self.config.markdown_extractor = Some(extractor);
        self
    }

    pub fn image_relocator(mut self, relocator: Arc<dyn ImageRelocator>) -> Self {
        self.config.image_relocator = Some(relocator);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Batch2MdError> {
        let c = &self.config;
        if c.input_dir.as_os_str().is_empty() {
            return Err(Batch2MdError::InvalidConfig(
                "Input directory must not be empty".into(),
            ));
        }
        if c.max_workers == 0 {
            return Err(Batch2MdError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if c.pdf_timeout_secs == 0 || c.md_timeout_secs == 0 {
            return Err(Batch2MdError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.output_dir.as_ref().is_some_and(|d| d.as_os_str().is_empty()) {
            return Err(Batch2MdError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// MinerU extraction backend.
///
/// | Backend | MinerU name | Notes |
/// |---------|-------------|-------|
/// | `pipeline` | `pipeline` | Layout models, CPU friendly (default) |
/// | `vlm` | `vlm-transformers` | Vision-language model via transformers |
/// | `vllm` | `vlm-vllm-engine` | Vision-language model via vLLM, needs a GPU |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Pipeline,
    Vlm,
    Vllm,
}

impl Backend {
    /// The `--backend` value MinerU itself understands.
    pub fn mineru_name(self) -> &'static str {
        match self {
            Backend::Pipeline => "pipeline",
            Backend::Vlm => "vlm-transformers",
            Backend::Vllm => "vlm-vllm-engine",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Pipeline => "pipeline",
            Backend::Vlm => "vlm",
            Backend::Vllm => "vllm",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::new("/data/in");
        assert!(c.recursive);
        assert!(!c.overwrite);
        assert!(!c.dry_run);
        assert_eq!(c.backend, Backend::Pipeline);
        assert_eq!(c.max_workers, 1);
        assert_eq!(c.pdf_timeout_secs, 120);
        assert_eq!(c.md_timeout_secs, 300);
    }

    #[test]
    fn output_dir_defaults_under_input() {
        let c = ConversionConfig::new("/data/in");
        assert_eq!(c.output_dir(), PathBuf::from("/data/in/markdown"));
        assert_eq!(c.scratch_dir(), PathBuf::from("/data/in/markdown/temp_pdfs"));

        let c = ConversionConfig::builder("/data/in")
            .output_dir("/data/out")
            .build()
            .unwrap();
        assert_eq!(c.output_dir(), PathBuf::from("/data/out"));
    }

    #[test]
    fn builder_clamps_workers() {
        let c = ConversionConfig::builder("in").max_workers(0).build().unwrap();
        assert_eq!(c.max_workers, 1);
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = ConversionConfig::builder("in")
            .md_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Batch2MdError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_empty_input() {
        assert!(ConversionConfig::builder("").build().is_err());
    }

    #[test]
    fn backend_mapping() {
        assert_eq!(Backend::Pipeline.mineru_name(), "pipeline");
        assert_eq!(Backend::Vlm.mineru_name(), "vlm-transformers");
        assert_eq!(Backend::Vllm.mineru_name(), "vlm-vllm-engine");
        assert_eq!(Backend::Vllm.to_string(), "vllm");
    }

    #[test]
    fn debug_elides_trait_objects() {
        let dbg = format!("{:?}", ConversionConfig::new("in"));
        assert!(dbg.contains("max_workers: 1"));
        assert!(dbg.contains("pdf_converter: None"));
    }
}
