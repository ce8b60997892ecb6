//! Running external converters with a deadline.

use crate::error::JobError;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// `tool` and `name` only label errors (`"LibreOffice"`, `"report.docx"`).
/// The child is killed if `limit` elapses first. A non-zero exit status
/// becomes [`JobError::ToolFailed`] carrying the trimmed stderr.
pub async fn run_tool(
    mut cmd: Command,
    tool: &'static str,
    name: &str,
    limit: Duration,
) -> Result<Output, JobError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("{tool}: running {:?}", cmd.as_std());
    let child = cmd.spawn().map_err(|source| JobError::ToolLaunch {
        tool,
        name: name.to_string(),
        source,
    })?;

    // Dropping the pending future on timeout drops the child, which kills it.
    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(JobError::ToolLaunch {
                tool,
                name: name.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(JobError::Timeout {
                tool,
                name: name.to_string(),
                secs: limit.as_secs(),
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!("{tool} exited with {} for {name}", output.status);
        return Err(JobError::ToolFailed {
            tool,
            name: name.to_string(),
            stderr,
        });
    }
    Ok(output)
}

/// Combined stdout and stderr of a finished tool, for diagnostics.
pub fn combined_output(output: &Output) -> String {
    [&output.stdout, &output.stderr]
        .into_iter()
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
