//! Batch conversion entry points.
//!
//! [`convert_directory`] scans the input directory, runs every document
//! through the pipeline stages and returns the run's
//! [`ConversionSummary`]. One document failing never stops the run; its
//! error is recorded on the failed job instead.

use crate::config::ConversionConfig;
use crate::error::{Batch2MdError, JobError};
use crate::format::requires_pdf_conversion;
use crate::output::{
    ConversionJob, ConversionSummary, JobStatus, PlannedConversion, SummaryBuilder,
};
use crate::paths::{self, images_dir_for, OutputClaims};
use crate::pipeline::{
    ImageRelocator, LibreOfficeConverter, MarkdownExtractor, MineruExtractor, PdfConverter,
    ScratchImageRelocator,
};
use crate::progress::{format_progress, ProgressCallback};
use crate::scanner::scan_documents;
use chrono::Local;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Convert every supported document under `config.input_dir` to Markdown.
///
/// # Returns
/// `Ok(ConversionSummary)` whenever the run could start, even if every
/// document failed (check [`ConversionSummary::exit_code`]).
///
/// # Errors
/// Returns `Err(Batch2MdError)` only for fatal errors, before any document
/// is processed:
/// - Input directory missing or not a directory
/// - LibreOffice or MinerU needed but not installed
pub async fn convert_directory(
    config: &ConversionConfig,
) -> Result<ConversionSummary, Batch2MdError> {
    let start_time = Local::now();
    let input_dir = &config.input_dir;

    // ── Step 1: Validate input ───────────────────────────────────────────
    if !input_dir.exists() {
        return Err(Batch2MdError::InputDirNotFound {
            path: input_dir.clone(),
        });
    }
    if !input_dir.is_dir() {
        return Err(Batch2MdError::NotADirectory {
            path: input_dir.clone(),
        });
    }

    // ── Step 2: Scan, excluding previous output ──────────────────────────
    let output_dir = config.output_dir();
    info!("Scanning directory: {}", input_dir.display());
    debug!("Excluding output directory: {}", output_dir.display());
    let documents = scan_documents(input_dir, config.recursive, &[output_dir.clone()]);
    let total = documents.len();
    info!("Found {total} document(s)");

    let callback = config.progress_callback.as_ref();
    if let Some(cb) = callback {
        cb.on_batch_start(total);
    }

    if documents.is_empty() {
        info!("No supported documents found");
        return Ok(finish(SummaryBuilder::new(start_time), callback));
    }

    // ── Step 3: Dry run ──────────────────────────────────────────────────
    if config.dry_run {
        info!("Dry run: output would go to {}", output_dir.display());
        let mut summary = SummaryBuilder::new(start_time);
        let mut claims = OutputClaims::new();
        for (i, input) in documents.into_iter().enumerate() {
            let plan = plan_document(config, &output_dir, &mut claims, input);
            info!(
                "{}",
                format_progress(i + 1, total, &file_name(&plan.input_path), "would be converted")
            );
            if let Some(cb) = callback {
                cb.on_file_planned(i + 1, total, &plan);
            }
            summary.record_planned(plan);
        }
        return Ok(finish(summary, callback));
    }

    // ── Step 4: Resolve collaborators ────────────────────────────────────
    let needs_pdf = documents.iter().any(|d| requires_pdf_conversion(d));
    let ctx = RunContext {
        stages: resolve_stages(config, needs_pdf)?,
        scratch_root: config.scratch_dir(),
        backend: config.backend,
        md_timeout: Duration::from_secs(config.md_timeout_secs),
        callback: config.progress_callback.clone(),
        total,
    };

    // ── Step 5: Claim output paths ───────────────────────────────────────
    // Resolved up front so concurrent jobs never share a Markdown path.
    let mut claims = OutputClaims::new();
    let targets: Vec<(PathBuf, PathBuf)> = documents
        .into_iter()
        .map(|input| {
            let output_path =
                claims.claim(&input, &output_dir, input_dir, config.overwrite, Local::now());
            (input, output_path)
        })
        .collect();

    // ── Step 6: Convert ──────────────────────────────────────────────────
    // Jobs run concurrently up to `max_workers`, but only this task
    // touches the summary.
    let mut summary = SummaryBuilder::new(start_time);
    let mut results = stream::iter(targets.into_iter().enumerate())
        .map(|(i, (input, output_path))| process_document(&ctx, i + 1, input, output_path))
        .buffer_unordered(config.max_workers.max(1));

    while let Some((index, job)) = results.next().await {
        let name = file_name(job.input_path());
        if job.is_completed() {
            info!("{}", format_progress(index, total, &name, "completed"));
            if let Some(cb) = callback {
                cb.on_file_complete(index, total, &job);
            }
        } else {
            warn!(
                "{}",
                format_progress(
                    index,
                    total,
                    &name,
                    &format!("failed: {}", job.error().unwrap_or("unknown error"))
                )
            );
            if let Some(cb) = callback {
                cb.on_file_error(index, total, &job);
            }
        }
        summary.record(job);
    }

    remove_if_empty(&ctx.scratch_root).await;

    let summary = finish(summary, callback);
    info!(
        "Converted {}/{} documents in {:.1}s",
        summary.successful(),
        summary.total_files(),
        summary.elapsed_time()
    );
    Ok(summary)
}

/// Synchronous wrapper around [`convert_directory`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_directory_sync(
    config: &ConversionConfig,
) -> Result<ConversionSummary, Batch2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Batch2MdError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert_directory(config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct Stages {
    pdf: Arc<dyn PdfConverter>,
    extractor: Arc<dyn MarkdownExtractor>,
    images: Arc<dyn ImageRelocator>,
}

struct RunContext {
    stages: Stages,
    scratch_root: PathBuf,
    backend: crate::config::Backend,
    md_timeout: Duration,
    callback: Option<ProgressCallback>,
    total: usize,
}

impl RunContext {
    fn stage(
        &self,
        index: usize,
        job: &mut ConversionJob,
        next: JobStatus,
    ) -> Result<(), JobError> {
        job.advance(next)?;
        let name = file_name(job.input_path());
        debug!("{}", format_progress(index, self.total, &name, &next.to_string()));
        if let Some(ref cb) = self.callback {
            cb.on_stage(index, self.total, next);
        }
        Ok(())
    }
}

/// Pick each stage's implementation: pre-built ones from the config first,
/// then the external tools, which are located up front.
///
/// LibreOffice is only required when some document is not already a PDF.
fn resolve_stages(config: &ConversionConfig, needs_pdf: bool) -> Result<Stages, Batch2MdError> {
    let pdf: Arc<dyn PdfConverter> = match config.pdf_converter {
        Some(ref converter) => Arc::clone(converter),
        None => {
            let program = if needs_pdf {
                let found = tool_locate::locate(&tool_locate::SOFFICE)?;
                debug!("Using LibreOffice at {}", found.display());
                found
            } else {
                PathBuf::from(tool_locate::SOFFICE.binary)
            };
            Arc::new(
                LibreOfficeConverter::new(program)
                    .with_timeout(Duration::from_secs(config.pdf_timeout_secs))
                    .with_private_profile(config.max_workers > 1),
            )
        }
    };

    let extractor: Arc<dyn MarkdownExtractor> = match config.markdown_extractor {
        Some(ref extractor) => Arc::clone(extractor),
        None => {
            let program = tool_locate::locate(&tool_locate::MINERU)?;
            debug!("Using MinerU at {}", program.display());
            Arc::new(MineruExtractor::new(program))
        }
    };

    let images: Arc<dyn ImageRelocator> = match config.image_relocator {
        Some(ref relocator) => Arc::clone(relocator),
        None => Arc::new(ScratchImageRelocator),
    };

    Ok(Stages {
        pdf,
        extractor,
        images,
    })
}

fn plan_document(
    config: &ConversionConfig,
    output_dir: &Path,
    claims: &mut OutputClaims,
    input: PathBuf,
) -> PlannedConversion {
    PlannedConversion {
        output_path: claims.claim(
            &input,
            output_dir,
            &config.input_dir,
            config.overwrite,
            Local::now(),
        ),
        requires_pdf_conversion: requires_pdf_conversion(&input),
        input_path: input,
    }
}

/// Scratch directories a job created, removed once it is terminal.
#[derive(Default)]
struct Scratch {
    pdf_dir: Option<PathBuf>,
    tool_dir: Option<PathBuf>,
}

/// Run one document through every stage. Always returns a terminal job.
async fn process_document(
    ctx: &RunContext,
    index: usize,
    input: PathBuf,
    output_path: PathBuf,
) -> (usize, ConversionJob) {
    let images_dir = images_dir_for(&output_path);
    let size = tokio::fs::metadata(&input)
        .await
        .map(|m| m.len())
        .unwrap_or(0);

    let mut job = ConversionJob::new(&input, output_path, images_dir, size);
    debug!("{}", format_progress(index, ctx.total, &file_name(&input), ""));
    if let Some(ref cb) = ctx.callback {
        cb.on_file_start(index, ctx.total, &input);
    }

    let mut scratch = Scratch::default();
    let outcome = run_stages(ctx, index, &mut job, &mut scratch).await;
    cleanup(&scratch).await;

    let job = match outcome {
        Ok(output_size) => job.complete(output_size),
        Err(e) => job.fail(e.to_string()),
    };
    (index, job)
}

async fn run_stages(
    ctx: &RunContext,
    index: usize,
    job: &mut ConversionJob,
    scratch: &mut Scratch,
) -> Result<u64, JobError> {
    paths::create_output_dirs(job.output_path(), job.images_dir())
        .map_err(|e| JobError::io(job.output_path(), e))?;

    let input = job.input_path().to_path_buf();
    let pdf_path = if requires_pdf_conversion(&input) {
        ctx.stage(index, job, JobStatus::ConvertingToPdf)?;
        let dir = ctx.scratch_root.join(format!("job-{index}"));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| JobError::io(&dir, e))?;
        scratch.pdf_dir = Some(dir.clone());
        ctx.stages.pdf.convert(&input, &dir).await?
    } else {
        input.clone()
    };
    job.set_pdf_path(&pdf_path);

    ctx.stage(index, job, JobStatus::ConvertingToMd)?;
    let extraction = ctx
        .stages
        .extractor
        .extract(&pdf_path, job.output_path(), ctx.backend, ctx.md_timeout)
        .await?;
    scratch.tool_dir = Some(extraction.scratch_dir.clone());

    // Named after the output file, which is unique in this run.
    let stem = job
        .output_path()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let images = ctx.stages.images.relocate(
        &extraction.markdown_path,
        &extraction.scratch_dir,
        job.images_dir(),
        &stem,
    )?;
    if !images.is_empty() {
        debug!("{}: relocated {} image(s)", file_name(&input), images.len());
    }

    let output_size = tokio::fs::metadata(&extraction.markdown_path)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    Ok(output_size)
}

/// Best-effort removal of a job's scratch directories.
async fn cleanup(scratch: &Scratch) {
    for dir in [&scratch.tool_dir, &scratch.pdf_dir].into_iter().flatten() {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => debug!("Removed {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {e}", dir.display()),
        }
    }
}

/// Remove `dir` if it exists and is empty.
async fn remove_if_empty(dir: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    if matches!(entries.next_entry().await, Ok(None)) {
        if let Err(e) = tokio::fs::remove_dir(dir).await {
            warn!("Could not remove {}: {e}", dir.display());
        }
    }
}

fn finish(summary: SummaryBuilder, callback: Option<&ProgressCallback>) -> ConversionSummary {
    let summary = summary.finish();
    if let Some(cb) = callback {
        cb.on_batch_complete(&summary);
    }
    summary
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_input_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConversionConfig::new(tmp.path().join("nope"));
        let err = convert_directory(&config).await.unwrap_err();
        assert!(matches!(err, Batch2MdError::InputDirNotFound { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn file_as_input_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.docx");
        std::fs::write(&file, b"x").unwrap();
        let err = convert_directory(&ConversionConfig::new(&file))
            .await
            .unwrap_err();
        assert!(matches!(err, Batch2MdError::NotADirectory { .. }));
    }

    #[tokio::test]
    async fn empty_directory_needs_no_tools() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        let summary = convert_directory(&ConversionConfig::new(tmp.path()))
            .await
            .unwrap();
        assert_eq!(summary.total_files(), 0);
        assert_eq!(summary.exit_code(), 0);
        assert!(!tmp.path().join("markdown").exists());
    }

    #[tokio::test]
    async fn remove_if_empty_keeps_populated_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty");
        let full = tmp.path().join("full");
        std::fs::create_dir_all(&empty).unwrap();
        std::fs::create_dir_all(&full).unwrap();
        std::fs::write(full.join("keep.pdf"), b"x").unwrap();

        remove_if_empty(&empty).await;
        remove_if_empty(&full).await;
        remove_if_empty(&tmp.path().join("missing")).await;

        assert!(!empty.exists());
        assert!(full.join("keep.pdf").exists());
    }
}
