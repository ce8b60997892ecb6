//! Result types: per-document jobs and the run-level summary.
//!
//! A [`ConversionJob`] is created when a document starts processing and is
//! owned by the orchestrator until it reaches a terminal state. The terminal
//! transitions ([`ConversionJob::complete`], [`ConversionJob::fail`]) consume
//! the job and hand back the frozen record, which then moves into the
//! [`ConversionSummary`]. Nothing mutates a job after that.
//!
//! ```text
//! Pending ──▶ ConvertingToPdf ──▶ ConvertingToMd ──▶ Completed
//!    │                                 ▲
//!    └──────── (input is a PDF) ───────┘
//! any non-terminal state ──▶ Failed
//! ```

use crate::error::JobError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ── Job status ───────────────────────────────────────────────────────────

/// Processing state of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    ConvertingToPdf,
    ConvertingToMd,
    Completed,
    Failed,
    /// Reserved for dry-run reporting; no job ever enters this state.
    Skipped,
}

impl JobStatus {
    /// `true` for states a job never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Skipped
        )
    }

    /// Whether the state machine allows `self → next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, ConvertingToPdf) | (Pending, ConvertingToMd) => true,
            (ConvertingToPdf, ConvertingToMd) => true,
            (ConvertingToMd, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::ConvertingToPdf => "converting_to_pdf",
            JobStatus::ConvertingToMd => "converting_to_md",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Job ──────────────────────────────────────────────────────────────────

/// One document's conversion attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionJob {
    input_path: PathBuf,
    pdf_path: Option<PathBuf>,
    output_path: PathBuf,
    images_dir: PathBuf,
    status: JobStatus,
    error: Option<String>,
    start_time: DateTime<Local>,
    end_time: Option<DateTime<Local>>,
    file_size_bytes: u64,
    output_size_bytes: u64,
}

impl ConversionJob {
    /// A fresh job in [`JobStatus::Pending`], started now.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        images_dir: impl Into<PathBuf>,
        file_size_bytes: u64,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            pdf_path: None,
            output_path: output_path.into(),
            images_dir: images_dir.into(),
            status: JobStatus::Pending,
            error: None,
            start_time: Local::now(),
            end_time: None,
            file_size_bytes,
            output_size_bytes: 0,
        }
    }

    /// Move to a non-terminal `next` state.
    ///
    /// Terminal states are only reachable through [`Self::complete`] and
    /// [`Self::fail`].
    pub fn advance(&mut self, next: JobStatus) -> Result<(), JobError> {
        if next.is_terminal() || !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record the intermediate PDF consumed by the extraction stage.
    pub fn set_pdf_path(&mut self, path: impl Into<PathBuf>) {
        self.pdf_path = Some(path.into());
    }

    /// Finish successfully.
    ///
    /// Completion is only legal from [`JobStatus::ConvertingToMd`]. From
    /// any other state the transition is refused and the job fails with
    /// the [`JobError::InvalidTransition`] message instead.
    pub fn complete(mut self, output_size_bytes: u64) -> Self {
        if !self.status.can_transition_to(JobStatus::Completed) {
            let err = JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Completed,
            };
            return self.fail(err.to_string());
        }
        self.status = JobStatus::Completed;
        self.output_size_bytes = output_size_bytes;
        self.end_time = Some(Local::now());
        self
    }

    /// Finish with an error message. A job that is already terminal is
    /// returned unchanged.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        if self.status.can_transition_to(JobStatus::Failed) {
            self.status = JobStatus::Failed;
            self.error = Some(error.into());
            self.end_time = Some(Local::now());
        }
        self
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn pdf_path(&self) -> Option<&Path> {
        self.pdf_path.as_deref()
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end_time
    }

    pub fn file_size_bytes(&self) -> u64 {
        self.file_size_bytes
    }

    pub fn output_size_bytes(&self) -> u64 {
        self.output_size_bytes
    }

    /// Seconds between start and end; 0 while the job is still running.
    pub fn elapsed_time(&self) -> f64 {
        match self.end_time {
            Some(end) => seconds_between(self.start_time, end),
            None => 0.0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == JobStatus::Failed
    }
}

// ── Dry-run plan ─────────────────────────────────────────────────────────

/// What a dry run would do with one document. Never backed by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedConversion {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub requires_pdf_conversion: bool,
}

// ── Summary ──────────────────────────────────────────────────────────────

/// Aggregate result of one run.
///
/// Counts are derived from the recorded jobs and plans, so
/// `total_files == successful + failed + skipped` always holds.
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    completed_jobs: Vec<ConversionJob>,
    failed_jobs: Vec<ConversionJob>,
    planned: Vec<PlannedConversion>,
    start_time: DateTime<Local>,
    end_time: DateTime<Local>,
}

impl ConversionSummary {
    /// Summary of a run that found nothing to convert.
    pub fn empty(start_time: DateTime<Local>) -> Self {
        SummaryBuilder::new(start_time).finish()
    }

    pub fn total_files(&self) -> usize {
        self.successful() + self.failed() + self.skipped()
    }

    pub fn successful(&self) -> usize {
        self.completed_jobs.len()
    }

    pub fn failed(&self) -> usize {
        self.failed_jobs.len()
    }

    pub fn skipped(&self) -> usize {
        self.planned.len()
    }

    pub fn completed_jobs(&self) -> &[ConversionJob] {
        &self.completed_jobs
    }

    pub fn failed_jobs(&self) -> &[ConversionJob] {
        &self.failed_jobs
    }

    /// Dry-run entries, in scan order.
    pub fn planned(&self) -> &[PlannedConversion] {
        &self.planned
    }

    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Local> {
        self.end_time
    }

    /// Total elapsed time in seconds.
    pub fn elapsed_time(&self) -> f64 {
        seconds_between(self.start_time, self.end_time)
    }

    /// Success rate as a percentage (0–100); 0 when nothing was found.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_files();
        if total == 0 {
            return 0.0;
        }
        self.successful() as f64 / total as f64 * 100.0
    }

    /// Process exit code: 0 = nothing failed, 1 = partial failure,
    /// 2 = every attempted document failed.
    pub fn exit_code(&self) -> u8 {
        exit_code_for(self.successful(), self.failed())
    }

    /// Serialisable view used for `--json` output.
    pub fn report(&self) -> SummaryReport {
        SummaryReport {
            summary: SummaryCounts {
                total_files: self.total_files(),
                successful: self.successful(),
                failed: self.failed(),
                skipped: self.skipped(),
                success_rate: format!("{:.1}%", self.success_rate()),
                elapsed_time: self.elapsed_time(),
            },
            failures: self
                .failed_jobs
                .iter()
                .map(|job| FailureEntry {
                    input_path: job.input_path.clone(),
                    error: job.error.clone(),
                })
                .collect(),
            planned: self.planned.clone(),
        }
    }
}

impl SummaryReport {
    /// Pretty-printed JSON, as printed by `batch2md --json`.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// The exit-code policy on raw counts.
pub fn exit_code_for(successful: usize, failed: usize) -> u8 {
    match (successful, failed) {
        (_, 0) => 0,
        (0, _) => 2,
        _ => 1,
    }
}

fn seconds_between(start: DateTime<Local>, end: DateTime<Local>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

/// Accumulates finished jobs while a run is in progress.
///
/// Owned by the single task that drives the run; workers hand their
/// terminal jobs back to it rather than sharing the builder.
#[derive(Debug)]
pub struct SummaryBuilder {
    completed_jobs: Vec<ConversionJob>,
    failed_jobs: Vec<ConversionJob>,
    planned: Vec<PlannedConversion>,
    start_time: DateTime<Local>,
}

impl SummaryBuilder {
    pub fn new(start_time: DateTime<Local>) -> Self {
        Self {
            completed_jobs: Vec::new(),
            failed_jobs: Vec::new(),
            planned: Vec::new(),
            start_time,
        }
    }

    /// File a terminal job under completed or failed.
    ///
    /// A non-terminal job here is an orchestrator bug; it is counted as
    /// failed so the totals stay consistent.
    pub fn record(&mut self, job: ConversionJob) {
        match job.status {
            JobStatus::Completed => self.completed_jobs.push(job),
            JobStatus::Failed => self.failed_jobs.push(job),
            status => {
                let msg = format!("job finished in non-terminal state {status}");
                self.failed_jobs.push(job.fail(msg));
            }
        }
    }

    /// File a dry-run entry; it counts as skipped.
    pub fn record_planned(&mut self, plan: PlannedConversion) {
        self.planned.push(plan);
    }

    pub fn finish(self) -> ConversionSummary {
        self.finish_at(Local::now())
    }

    pub fn finish_at(self, end_time: DateTime<Local>) -> ConversionSummary {
        ConversionSummary {
            completed_jobs: self.completed_jobs,
            failed_jobs: self.failed_jobs,
            planned: self.planned,
            start_time: self.start_time,
            end_time,
        }
    }
}

// ── Report ───────────────────────────────────────────────────────────────

/// JSON shape of a run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub summary: SummaryCounts,
    pub failures: Vec<FailureEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<PlannedConversion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Pre-formatted, e.g. `"66.7%"`.
    pub success_rate: String,
    /// Seconds.
    pub elapsed_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub input_path: PathBuf,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job(name: &str) -> ConversionJob {
        ConversionJob::new(
            format!("in/{name}.docx"),
            format!("in/markdown/{name}.md"),
            "in/markdown/images",
            1024,
        )
    }

    fn completed(name: &str) -> ConversionJob {
        let mut j = job(name);
        j.advance(JobStatus::ConvertingToPdf).unwrap();
        j.advance(JobStatus::ConvertingToMd).unwrap();
        j.complete(512)
    }

    fn failed(name: &str) -> ConversionJob {
        let mut j = job(name);
        j.advance(JobStatus::ConvertingToPdf).unwrap();
        j.fail("LibreOffice conversion timed out")
    }

    fn plan(name: &str) -> PlannedConversion {
        PlannedConversion {
            input_path: format!("in/{name}.pdf").into(),
            output_path: format!("in/markdown/{name}.md").into(),
            requires_pdf_conversion: false,
        }
    }

    #[test]
    fn pdf_path_skips_pre_conversion() {
        let mut j = job("a");
        j.advance(JobStatus::ConvertingToMd).unwrap();
        let j = j.complete(10);
        assert!(j.is_completed());
        assert_eq!(j.output_size_bytes(), 10);
        assert!(j.end_time().is_some());
    }

    #[test]
    fn backwards_transition_rejected() {
        let mut j = job("a");
        j.advance(JobStatus::ConvertingToMd).unwrap();
        let err = j.advance(JobStatus::ConvertingToPdf).unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
        assert_eq!(j.status(), JobStatus::ConvertingToMd);
    }

    #[test]
    fn pending_cannot_complete_directly() {
        let j = job("a").complete(1);
        assert!(j.is_failed());
        assert_eq!(
            j.error(),
            Some("Invalid job transition: pending → completed")
        );
        assert_eq!(j.output_size_bytes(), 0);
    }

    #[test]
    fn advance_refuses_terminal_states() {
        let mut j = job("a");
        assert!(j.advance(JobStatus::Failed).is_err());
        assert!(j.advance(JobStatus::Skipped).is_err());
        assert_eq!(j.status(), JobStatus::Pending);
    }

    #[test]
    fn failed_job_is_frozen() {
        let j = failed("a");
        assert!(j.is_failed());
        assert_eq!(j.error(), Some("LibreOffice conversion timed out"));
        let again = j.clone().fail("second error");
        assert_eq!(again.error(), Some("LibreOffice conversion timed out"));
        assert_eq!(again.end_time(), j.end_time());
    }

    #[test]
    fn failure_from_any_non_terminal_state() {
        for state in [
            JobStatus::Pending,
            JobStatus::ConvertingToPdf,
            JobStatus::ConvertingToMd,
        ] {
            assert!(state.can_transition_to(JobStatus::Failed), "{state}");
        }
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn counts_always_add_up() {
        let mut b = SummaryBuilder::new(Local::now());
        b.record(completed("a"));
        b.record(failed("b"));
        b.record(completed("c"));
        let s = b.finish();
        assert_eq!(s.total_files(), 3);
        assert_eq!(s.successful(), 2);
        assert_eq!(s.failed(), 1);
        assert_eq!(s.skipped(), 0);
        assert_eq!(
            s.total_files(),
            s.successful() + s.failed() + s.skipped()
        );
    }

    #[test]
    fn non_terminal_job_recorded_as_failed() {
        let mut b = SummaryBuilder::new(Local::now());
        b.record(job("stuck"));
        let s = b.finish();
        assert_eq!(s.failed(), 1);
        assert!(s.failed_jobs()[0]
            .error()
            .unwrap()
            .contains("non-terminal state pending"));
    }

    #[test]
    fn exit_code_law() {
        assert_eq!(exit_code_for(0, 0), 0);
        assert_eq!(exit_code_for(5, 0), 0);
        assert_eq!(exit_code_for(2, 1), 1);
        assert_eq!(exit_code_for(0, 3), 2);
    }

    #[test]
    fn dry_run_summary() {
        let mut b = SummaryBuilder::new(Local::now());
        for name in ["a", "b", "c", "d", "e"] {
            b.record_planned(plan(name));
        }
        let s = b.finish();
        assert_eq!(s.skipped(), 5);
        assert_eq!(s.total_files(), 5);
        assert_eq!(s.exit_code(), 0);
        assert_eq!(s.success_rate(), 0.0);
    }

    #[test]
    fn empty_summary() {
        let s = ConversionSummary::empty(Local::now());
        assert_eq!(s.total_files(), 0);
        assert_eq!(s.success_rate(), 0.0);
        assert_eq!(s.exit_code(), 0);
    }

    #[test]
    fn elapsed_and_rate() {
        let start = Local::now();
        let mut b = SummaryBuilder::new(start);
        b.record(completed("a"));
        b.record(completed("b"));
        b.record(failed("c"));
        let s = b.finish_at(start + Duration::milliseconds(2500));
        assert!((s.elapsed_time() - 2.5).abs() < 1e-9);
        assert!((s.success_rate() - 66.666).abs() < 0.01);
        assert_eq!(s.exit_code(), 1);
    }

    #[test]
    fn report_json_shape() {
        let mut b = SummaryBuilder::new(Local::now());
        b.record(completed("a"));
        b.record(failed("b"));
        let report = b.finish().report();
        let json: serde_json::Value =
            serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();

        assert_eq!(json["summary"]["total_files"], 2);
        assert_eq!(json["summary"]["success_rate"], "50.0%");
        assert_eq!(json["failures"][0]["input_path"], "in/b.docx");
        assert_eq!(
            json["failures"][0]["error"],
            "LibreOffice conversion timed out"
        );
        assert!(json.get("planned").is_none());
    }
}
