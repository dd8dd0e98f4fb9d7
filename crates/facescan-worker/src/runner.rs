//! The batch scan: one reference face against every `.jpg` in a directory.
//!
//! Strictly sequential. Each step (encode, directory listing, reporter call)
//! is awaited before the next one starts, so the audit log and the event
//! stream always show candidates in the order they were processed.

use crate::audit::{AuditError, AuditLog};
use crate::config::ReportFailurePolicy;
use crate::engine::{EngineError, EngineHandle};
use crate::reporter::{ReportError, Reporter, TaskEvent, FACE_NOT_FOUND_CODE};
use crate::task::Task;
use facescan_core::{Comparator, EncodeError, FaceDescriptor};
use serde::Serialize;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Only files with this exact (case-sensitive) suffix are candidates.
const CANDIDATE_SUFFIX: &str = ".jpg";

#[derive(Error, Debug)]
pub enum RunError {
    #[error("no face found in source image {}", .0.display())]
    NoFaceInSource(PathBuf),
    #[error("cannot encode source image {}: {source}", .path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: EncodeError,
    },
    #[error("cannot read target directory {}: {source}", .path.display())]
    TargetDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Engine(EngineError),
}

impl RunError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoFaceInSource(_) => 2,
            Self::TargetDir { .. } => 3,
            Self::Report(_) => 4,
            Self::Source { .. } | Self::Audit(_) | Self::Engine(_) => 1,
        }
    }
}

/// What a single candidate turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    NoFaceDetected,
    FaceMatches,
    FaceDoesNotMatch,
}

impl Classification {
    pub fn audit_text(self) -> &'static str {
        match self {
            Self::NoFaceDetected => "FACE ON IMAGE NOT FOUND",
            Self::FaceMatches => "FACE FOUND",
            Self::FaceDoesNotMatch => "FACE NOT FOUND",
        }
    }
}

/// Outcome of a completed scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub task_id: String,
    /// True once any candidate matched; never reset.
    pub found: bool,
    pub candidates: usize,
    pub matches: usize,
    pub no_face: usize,
    /// Last candidate processed, which is what the `result` event reports.
    pub last_file: Option<String>,
}

impl ScanSummary {
    fn record(&mut self, file: String, outcome: Classification) {
        self.candidates += 1;
        match outcome {
            Classification::FaceMatches => {
                self.matches += 1;
                self.found = true;
            }
            Classification::NoFaceDetected => self.no_face += 1,
            Classification::FaceDoesNotMatch => {}
        }
        self.last_file = Some(file);
    }
}

/// Runs one [`Task`] against an encoder engine, a comparator and a reporter.
pub struct BatchRunner<'a, R> {
    engine: &'a EngineHandle,
    comparator: &'a dyn Comparator,
    reporter: &'a R,
    reports_dir: &'a Path,
    report_failure: ReportFailurePolicy,
}

impl<'a, R: Reporter> BatchRunner<'a, R> {
    pub fn new(
        engine: &'a EngineHandle,
        comparator: &'a dyn Comparator,
        reporter: &'a R,
        reports_dir: &'a Path,
        report_failure: ReportFailurePolicy,
    ) -> Self {
        Self {
            engine,
            comparator,
            reporter,
            reports_dir,
            report_failure,
        }
    }

    /// Scan the task's directory and report progress along the way.
    ///
    /// Fails before any event is sent when the source image has no face. The
    /// audit log is closed on every return path.
    pub async fn run(&self, task: &Task) -> Result<ScanSummary, RunError> {
        let mut log = AuditLog::open(self.reports_dir, &task.report_file_name())?;
        tracing::info!(task_id = %task.id, log = %log.path().display(), "task started");

        let reference = self.load_source(&task.source_image).await?;
        log.loaded_source(&task.source_image)?;
        tracing::info!(task_id = %task.id, source = %task.source_image.display(), "source face loaded");

        self.emit(task, &TaskEvent::Start).await?;

        let candidates = list_candidates(&task.target_dir).await?;
        tracing::info!(task_id = %task.id, count = candidates.len(), "scanning candidates");

        let mut summary = ScanSummary {
            task_id: task.id.clone(),
            ..ScanSummary::default()
        };

        for path in candidates {
            log.begin_check(&path)?;
            let outcome = self.classify(&reference, &path).await?;
            log.finish_check(outcome)?;

            let file = path.display().to_string();
            tracing::debug!(task_id = %task.id, file = %file, ?outcome, "candidate checked");

            if outcome == Classification::NoFaceDetected {
                let event = TaskEvent::Error {
                    code: FACE_NOT_FOUND_CODE,
                    file: file.clone(),
                };
                self.emit(task, &event).await?;
            }
            summary.record(file, outcome);
        }

        let result = TaskEvent::Result {
            found: summary.found,
            file: summary.last_file.clone(),
        };
        self.emit(task, &result).await?;
        log.task_end(&task.id, summary.found)?;

        tracing::info!(
            task_id = %task.id,
            found = summary.found,
            candidates = summary.candidates,
            matches = summary.matches,
            no_face = summary.no_face,
            "task finished"
        );
        Ok(summary)
    }

    async fn load_source(&self, path: &Path) -> Result<FaceDescriptor, RunError> {
        self.engine.encode(path).await.map_err(|err| match err {
            EngineError::Encode(EncodeError::NoFace) => RunError::NoFaceInSource(path.to_path_buf()),
            EngineError::Encode(source) => RunError::Source {
                path: path.to_path_buf(),
                source,
            },
            other => RunError::Engine(other),
        })
    }

    /// Any encode failure on a candidate counts as "no face"; only a dead
    /// engine stops the scan.
    async fn classify(
        &self,
        reference: &FaceDescriptor,
        path: &Path,
    ) -> Result<Classification, RunError> {
        match self.engine.encode(path).await {
            Ok(candidate) if self.comparator.is_match(reference, &candidate) => {
                Ok(Classification::FaceMatches)
            }
            Ok(_) => Ok(Classification::FaceDoesNotMatch),
            Err(EngineError::Encode(EncodeError::NoFace)) => Ok(Classification::NoFaceDetected),
            Err(EngineError::Encode(err)) => {
                tracing::warn!(file = %path.display(), error = %err, "candidate unreadable, treating as no face");
                Ok(Classification::NoFaceDetected)
            }
            Err(other) => Err(RunError::Engine(other)),
        }
    }

    async fn emit(&self, task: &Task, event: &TaskEvent) -> Result<(), RunError> {
        let Err(err) = self.reporter.send(&task.id, event).await else {
            return Ok(());
        };
        match self.report_failure {
            ReportFailurePolicy::Continue => {
                tracing::warn!(task_id = %task.id, action = event.action(), error = %err, "event not delivered");
                Ok(())
            }
            ReportFailurePolicy::Abort => Err(err.into()),
        }
    }
}

/// Directory entries ending in `.jpg`, in enumeration order.
async fn list_candidates(dir: &Path) -> Result<Vec<PathBuf>, RunError> {
    let wrap = |source| RunError::TargetDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(wrap)?;
    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(wrap)? {
        let name = entry.file_name();
        if is_candidate(&name) {
            candidates.push(dir.join(name));
        }
    }
    Ok(candidates)
}

/// Suffix check on the raw name, so non-UTF-8 file names are still scanned.
#[cfg(unix)]
fn is_candidate(name: &OsStr) -> bool {
    use std::os::unix::ffi::OsStrExt;
    name.as_bytes().ends_with(CANDIDATE_SUFFIX.as_bytes())
}

#[cfg(not(unix))]
fn is_candidate(name: &OsStr) -> bool {
    name.to_string_lossy().ends_with(CANDIDATE_SUFFIX)
}
