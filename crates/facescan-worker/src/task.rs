use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TaskError {
    #[error("task id {0:?} has no alphanumeric characters to name its report file")]
    UnusableId(String),
}

/// One comparison job: a reference photo against every `.jpg` in a directory.
///
/// Immutable once built; the id is used verbatim on every reporter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub source_image: PathBuf,
    pub target_dir: PathBuf,
    /// Base URL every life-cycle event is sent to.
    pub report_url: String,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        source_image: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
        report_url: impl Into<String>,
    ) -> Result<Self, TaskError> {
        let id = id.into();
        if report_stem(&id).is_empty() {
            return Err(TaskError::UnusableId(id));
        }
        Ok(Self {
            id,
            source_image: source_image.into(),
            target_dir: target_dir.into(),
            report_url: report_url.into(),
        })
    }

    /// Audit log file name: the id stripped to its alphanumerics, plus `.report`.
    pub fn report_file_name(&self) -> String {
        format!("{}.report", report_stem(&self.id))
    }
}

fn report_stem(id: &str) -> String {
    id.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}
