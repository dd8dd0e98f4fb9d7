use facescan_core::{Comparator, CosineComparator, EuclideanComparator};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key}: unknown value {value:?} (expected one of {expected})")]
    UnknownValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{key}: cannot parse {value:?} as a number")]
    InvalidNumber { key: &'static str, value: String },
}

/// How candidate descriptors are compared with the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparatorKind {
    Cosine,
    Euclidean,
}

impl FromStr for ComparatorKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            _ => Err(()),
        }
    }
}

/// What a failed reporter call does to the running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFailurePolicy {
    /// Log a warning and keep scanning.
    #[default]
    Continue,
    /// Fail the task with the reporter error.
    Abort,
}

impl FromStr for ReportFailurePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            _ => Err(()),
        }
    }
}

/// Spelling of the `status` parameter on the result event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusStyle {
    /// `true` / `false`
    #[default]
    Lowercase,
    /// `True` / `False`, as older task servers compare against.
    Capitalized,
}

impl StatusStyle {
    pub fn render(self, found: bool) -> &'static str {
        match (self, found) {
            (Self::Lowercase, true) => "true",
            (Self::Lowercase, false) => "false",
            (Self::Capitalized, true) => "True",
            (Self::Capitalized, false) => "False",
        }
    }
}

impl FromStr for StatusStyle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lowercase" => Ok(Self::Lowercase),
            "capitalized" => Ok(Self::Capitalized),
            _ => Err(()),
        }
    }
}

/// Worker configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Directory the per-task `.report` audit logs are appended to.
    pub reports_dir: PathBuf,
    /// Host of the task server receiving life-cycle events.
    pub report_host: String,
    pub comparator: ComparatorKind,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    /// Euclidean distance tolerance for a positive match.
    pub distance_tolerance: f32,
    pub report_failure: ReportFailurePolicy,
    pub status_style: StatusStyle,
}

impl Config {
    /// Load configuration from `FACESCAN_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let model_dir = var("FACESCAN_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(facescan_core::default_model_dir);

        Ok(Self {
            model_dir,
            reports_dir: var("FACESCAN_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("py_reports")),
            report_host: var("FACESCAN_REPORT_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            comparator: parse_choice(&var, "FACESCAN_COMPARATOR", "cosine, euclidean")?
                .unwrap_or(ComparatorKind::Cosine),
            similarity_threshold: parse_number(&var, "FACESCAN_SIMILARITY_THRESHOLD")?
                .unwrap_or(CosineComparator::default().threshold),
            distance_tolerance: parse_number(&var, "FACESCAN_DISTANCE_TOLERANCE")?
                .unwrap_or(EuclideanComparator::default().tolerance),
            report_failure: parse_choice(&var, "FACESCAN_REPORT_FAILURE", "continue, abort")?
                .unwrap_or_default(),
            status_style: parse_choice(&var, "FACESCAN_STATUS_STYLE", "lowercase, capitalized")?
                .unwrap_or_default(),
        })
    }

    /// Callback URL of the task server listening on `port`.
    pub fn report_url(&self, port: u16) -> String {
        format!("http://{}:{port}/taskResult", self.report_host)
    }

    /// The configured comparator with its threshold applied.
    pub fn build_comparator(&self) -> Box<dyn Comparator + Send + Sync> {
        match self.comparator {
            ComparatorKind::Cosine => Box::new(CosineComparator {
                threshold: self.similarity_threshold,
            }),
            ComparatorKind::Euclidean => Box::new(EuclideanComparator {
                tolerance: self.distance_tolerance,
            }),
        }
    }
}

fn parse_choice<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    var(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::UnknownValue { key, value, expected })
        })
        .transpose()
}

fn parse_number(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<f32>, ConfigError> {
    var(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { key, value })
        })
        .transpose()
}
