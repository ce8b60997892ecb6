//! Output path resolution: where each document's Markdown and images land.
//!
//! ## Layout
//!
//! ```text
//! input/                      output (default: input/markdown)/
//! ├─ report.docx        ──▶   ├─ report.md
//! └─ q3/                      ├─ q3/
//!    └─ slides.pptx     ──▶   │  └─ slides.md
//!                             └─ images/          ← shared by every document
//!                                ├─ report_img1.png
//!                                └─ slides_img1.jpg
//! ```
//!
//! The subdirectory chain below the input root is mirrored under the output
//! root. Images are collected once per output tree rather than per document,
//! and get unique names from the document stem (see
//! [`crate::pipeline::images`]).
//!
//! ## Conflicts
//!
//! An existing Markdown file is never overwritten unless asked: a
//! `_YYYYMMDD_HHMMSS` suffix is added to the new file's stem instead. The
//! suffixed path is not re-checked, so two conflicting resolutions in the
//! same wall-clock second yield the same path.
//!
//! Within one run, [`OutputClaims`] also treats paths already handed to
//! another document as taken, so `a.docx` and `a.pdf` never share
//! `a.md` even when both are converted at once.

use crate::config::DEFAULT_OUTPUT_DIR_NAME;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Directory under the output root that holds intermediate PDFs.
pub const SCRATCH_PDF_DIR_NAME: &str = "temp_pdfs";

/// Directory that receives relocated images.
pub const IMAGES_DIR_NAME: &str = "images";

/// `strftime` pattern of the conflict suffix.
pub const CONFLICT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Map `input_path` to its Markdown output path under `output_dir`.
///
/// Uses the current local time for the conflict suffix; see
/// [`resolve_output_path_at`].
pub fn resolve_output_path(
    input_path: &Path,
    output_dir: &Path,
    base_dir: &Path,
    overwrite: bool,
) -> PathBuf {
    resolve_output_path_at(input_path, output_dir, base_dir, overwrite, Local::now())
}

/// Same as [`resolve_output_path`] with an explicit clock reading.
///
/// If `input_path` is not under `base_dir` only its file name is kept.
pub fn resolve_output_path_at(
    input_path: &Path,
    output_dir: &Path,
    base_dir: &Path,
    overwrite: bool,
    now: DateTime<Local>,
) -> PathBuf {
    let output_path = mirrored_output_path(input_path, output_dir, base_dir);
    if overwrite || !output_path.exists() {
        return output_path;
    }

    let suffixed = with_timestamp(&output_path, now, None);
    debug!(
        "{} exists; writing {} instead",
        output_path.display(),
        suffixed.display()
    );
    suffixed
}

/// The `.md` path mirroring `input_path` under `output_dir`, conflicts ignored.
fn mirrored_output_path(input_path: &Path, output_dir: &Path, base_dir: &Path) -> PathBuf {
    let rel_path = match input_path.strip_prefix(base_dir) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            debug!(
                "{} is outside {}; dropping directory structure",
                input_path.display(),
                base_dir.display()
            );
            input_path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| input_path.to_path_buf())
        }
    };

    let stem = rel_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir
        .join(rel_path.parent().unwrap_or_else(|| Path::new("")))
        .join(format!("{stem}.md"))
}

/// `dir/stem.md` → `dir/stem_<timestamp>.md`, or `dir/stem_<timestamp>_<n>.md`.
fn with_timestamp(output_path: &Path, now: DateTime<Local>, seq: Option<usize>) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let timestamp = now.format(CONFLICT_TIMESTAMP_FORMAT);
    let name = match seq {
        Some(n) => format!("{stem}_{timestamp}_{n}.md"),
        None => format!("{stem}_{timestamp}.md"),
    };
    output_path.with_file_name(name)
}

/// Output paths handed out so far in one run.
///
/// Two documents that mirror to the same Markdown path (same directory,
/// same stem) are both resolved before either is written. A claimed path
/// counts as taken even with `overwrite`, and the later document gets the
/// timestamp suffix, plus a `_<n>` counter when that is claimed as well.
#[derive(Debug, Default)]
pub struct OutputClaims {
    claimed: HashSet<PathBuf>,
}

impl OutputClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and reserve the output path for `input_path`.
    pub fn claim(
        &mut self,
        input_path: &Path,
        output_dir: &Path,
        base_dir: &Path,
        overwrite: bool,
        now: DateTime<Local>,
    ) -> PathBuf {
        let mirrored = mirrored_output_path(input_path, output_dir, base_dir);
        let mut path = if self.claimed.contains(&mirrored) {
            with_timestamp(&mirrored, now, None)
        } else {
            resolve_output_path_at(input_path, output_dir, base_dir, overwrite, now)
        };

        let mut seq = 2;
        while self.claimed.contains(&path) {
            path = with_timestamp(&mirrored, now, Some(seq));
            seq += 1;
        }
        if path != mirrored {
            debug!(
                "{} already claimed or present; {} gets {}",
                mirrored.display(),
                input_path.display(),
                path.display()
            );
        }
        self.claimed.insert(path.clone());
        path
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// Images directory for a Markdown file.
///
/// The nearest ancestor named `markdown` hosts the shared `images/`
/// directory; without one, images go next to the Markdown file.
pub fn images_dir_for(output_path: &Path) -> PathBuf {
    output_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.file_name().is_some_and(|n| n == DEFAULT_OUTPUT_DIR_NAME))
        .map(|root| root.join(IMAGES_DIR_NAME))
        .unwrap_or_else(|| {
            output_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(IMAGES_DIR_NAME)
        })
}

/// Create the Markdown file's parent directory and the images directory.
///
/// Idempotent; intermediate directories are created as needed.
pub fn create_output_dirs(output_path: &Path, images_dir: &Path) -> io::Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::create_dir_all(images_dir)
}

/// Path of `images_dir` relative to the directory containing `markdown_path`,
/// suitable for image links inside the Markdown file.
///
/// Computed lexically. Falls back to `images_dir` unchanged when no relative
/// form exists (different roots, or `..` in the Markdown location).
pub fn relative_image_dir(markdown_path: &Path, images_dir: &Path) -> PathBuf {
    let from: Vec<Component> = markdown_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component> = images_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let is_rooted = |c: &[Component]| {
        matches!(
            c.first(),
            Some(Component::RootDir) | Some(Component::Prefix(_))
        )
    };
    if is_rooted(&from) != is_rooted(&to) {
        return images_dir.to_path_buf();
    }

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if from[common..].iter().any(|c| matches!(c, Component::ParentDir)) {
        return images_dir.to_path_buf();
    }

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for c in &to[common..] {
        rel.push(c.as_os_str());
    }
    rel
}
