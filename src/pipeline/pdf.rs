//! Stage 1: office document → PDF via LibreOffice.
//!
//! LibreOffice is driven headless:
//!
//! ```text
//! soffice --headless --convert-to pdf --outdir <scratch> <document>
//! ```
//!
//! It reports success even for some inputs it silently failed to render, so
//! the result is checked independently: the PDF must exist, be at least
//! [`MIN_PDF_BYTES`] long and start with the `%PDF` signature.
//!
//! Two `soffice` processes sharing one user profile block on its lock file.
//! With concurrent workers every call therefore gets a throw-away profile
//! inside its own scratch directory.

use super::process::run_tool;
use super::PdfConverter;
use crate::error::JobError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

/// Smallest file accepted as a real PDF.
pub const MIN_PDF_BYTES: u64 = 100;

const PDF_MAGIC: &[u8; 4] = b"%PDF";
const TOOL: &str = "LibreOffice";
const PROFILE_DIR_NAME: &str = ".lo_profile";

/// [`PdfConverter`] backed by the `soffice` binary.
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    program: PathBuf,
    timeout: Duration,
    private_profile: bool,
}

impl LibreOfficeConverter {
    /// Converter running `program` with the default 120 s budget.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(120),
            private_profile: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Give every invocation its own user profile under the scratch dir.
    pub fn with_private_profile(mut self, enabled: bool) -> Self {
        self.private_profile = enabled;
        self
    }

    fn command(&self, input: &Path, scratch_dir: &Path) -> Result<Command, JobError> {
        let mut cmd = Command::new(&self.program);
        if self.private_profile {
            let profile = absolute(&scratch_dir.join(PROFILE_DIR_NAME))?;
            cmd.arg(format!("-env:UserInstallation={}", file_url(&profile)));
        }
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(scratch_dir)
            .arg(input);
        Ok(cmd)
    }
}

#[async_trait]
impl PdfConverter for LibreOfficeConverter {
    async fn convert(&self, input: &Path, scratch_dir: &Path) -> Result<PathBuf, JobError> {
        if !input.exists() {
            return Err(JobError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        let name = display_name(input);
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pdf_path = scratch_dir.join(format!("{stem}.pdf"));

        let cmd = self.command(input, scratch_dir)?;
        run_tool(cmd, TOOL, &name, self.timeout).await?;

        validate_pdf(&pdf_path, &name).await?;
        debug!("{name} → {}", pdf_path.display());
        Ok(pdf_path)
    }
}

/// Check that `path` looks like a real PDF. `name` labels the error.
pub async fn validate_pdf(path: &Path, name: &str) -> Result<(), JobError> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta,
        _ => {
            return Err(JobError::PdfMissing {
                name: name.to_string(),
            })
        }
    };
    if meta.len() < MIN_PDF_BYTES {
        return Err(JobError::PdfTooSmall {
            name: name.to_string(),
            bytes: meta.len(),
        });
    }

    let mut magic = [0u8; 4];
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| JobError::io(path, e))?;
    file.read_exact(&mut magic)
        .await
        .map_err(|e| JobError::io(path, e))?;
    if &magic != PDF_MAGIC {
        return Err(JobError::NotAPdf {
            name: name.to_string(),
            magic,
        });
    }
    Ok(())
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn absolute(path: &Path) -> Result<PathBuf, JobError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| JobError::io(path, e))
}

/// `file://` URL for an absolute path, as LibreOffice expects for
/// `-env:UserInstallation`.
fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded = raw.replace('%', "%25").replace(' ', "%20");
    if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}
