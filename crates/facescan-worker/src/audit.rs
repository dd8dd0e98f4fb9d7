//! Append-only per-task audit log.
//!
//! One `.report` file per task id, never truncated. Each line starts with the
//! seconds elapsed since the log was opened. A candidate check is written in
//! two steps (`begin_check` then `finish_check`) so a crash mid-encode leaves
//! the unfinished prefix behind as evidence.

use crate::runner::Classification;
use std::fs::{self, File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("audit log {path}: {source}")]
pub struct AuditError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

pub struct AuditLog {
    out: LineWriter<File>,
    path: PathBuf,
    started: Instant,
}

impl AuditLog {
    /// Open `dir/file_name` for appending, creating `dir` if needed.
    pub fn open(dir: &Path, file_name: &str) -> Result<Self, AuditError> {
        let path = dir.join(file_name);
        let wrap = |source| AuditError {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(wrap)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(wrap)?;

        tracing::debug!(path = %path.display(), "audit log opened");
        Ok(Self {
            out: LineWriter::new(file),
            path,
            started: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loaded_source(&mut self, source: &Path) -> Result<(), AuditError> {
        let stamp = self.stamp();
        self.write(format_args!("{stamp} LOADED SOURCE {}\n", source.display()))
    }

    /// Start a candidate line; the outcome is appended by [`finish_check`](Self::finish_check).
    pub fn begin_check(&mut self, candidate: &Path) -> Result<(), AuditError> {
        let stamp = self.stamp();
        self.write(format_args!("{stamp} Check image {} ->", candidate.display()))
    }

    pub fn finish_check(&mut self, outcome: Classification) -> Result<(), AuditError> {
        self.write(format_args!("{}\n", outcome.audit_text()))
    }

    pub fn task_end(&mut self, task_id: &str, found: bool) -> Result<(), AuditError> {
        let stamp = self.stamp();
        self.write(format_args!("{stamp} TASK END. ID {task_id}, result {found}\n"))
    }

    fn stamp(&self) -> String {
        format!("[{:.6}]", self.started.elapsed().as_secs_f64())
    }

    fn write(&mut self, args: std::fmt::Arguments<'_>) -> Result<(), AuditError> {
        self.out.write_fmt(args).map_err(|source| AuditError {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        // An unfinished candidate line has no newline yet; push it out anyway.
        if let Err(err) = self.out.flush() {
            tracing::warn!(path = %self.path.display(), error = %err, "audit log flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_stamp(line: &str) -> &str {
        let end = line.find("] ").expect("stamp");
        &line[end + 2..]
    }

    #[test]
    fn test_lines_and_stamps() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = AuditLog::open(dir.path(), "abc.report").unwrap();
            log.loaded_source(Path::new("uploads/me.jpg")).unwrap();
            log.begin_check(Path::new("/photos/a.jpg")).unwrap();
            log.finish_check(Classification::FaceMatches).unwrap();
            log.begin_check(Path::new("/photos/b.jpg")).unwrap();
            log.finish_check(Classification::NoFaceDetected).unwrap();
            log.task_end("a-b-c", true).unwrap();
        }

        let text = std::fs::read_to_string(dir.path().join("abc.report")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|l| l.starts_with('[')));
        assert_eq!(strip_stamp(lines[0]), "LOADED SOURCE uploads/me.jpg");
        assert_eq!(strip_stamp(lines[1]), "Check image /photos/a.jpg ->FACE FOUND");
        assert_eq!(strip_stamp(lines[2]), "Check image /photos/b.jpg ->FACE ON IMAGE NOT FOUND");
        assert_eq!(strip_stamp(lines[3]), "TASK END. ID a-b-c, result true");

        // Six decimal places, e.g. "[0.000012]".
        let stamp = &lines[0][1..lines[0].find(']').unwrap()];
        assert_eq!(stamp.split('.').nth(1).map(str::len), Some(6));
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        for _ in 0..2 {
            let mut log = AuditLog::open(dir.path(), "t.report").unwrap();
            log.task_end("t", false).unwrap();
        }
        let text = std::fs::read_to_string(dir.path().join("t.report")).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("py_reports");
        let log = AuditLog::open(&nested, "x.report").unwrap();
        assert_eq!(log.path(), nested.join("x.report"));
        assert!(nested.is_dir());
    }

    #[test]
    fn test_partial_line_survives_drop() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut log = AuditLog::open(dir.path(), "p.report").unwrap();
            log.begin_check(Path::new("c.jpg")).unwrap();
        }
        let text = std::fs::read_to_string(dir.path().join("p.report")).unwrap();
        assert!(text.ends_with("Check image c.jpg ->"));
    }
}
