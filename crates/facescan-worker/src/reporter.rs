//! Life-cycle events sent to the task server.
//!
//! Every event is a single `GET <report_url>?action=...&id=...` request.
//! The server's answer is never inspected beyond logging a non-2xx status.

use crate::config::StatusStyle;
use thiserror::Error;

/// Error code carried by the `error` event when a candidate shows no face.
pub const FACE_NOT_FOUND_CODE: u16 = 0x10;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("report request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// Source face loaded; scanning begins.
    Start,
    /// A candidate could not be classified.
    Error { code: u16, file: String },
    /// Scan finished. `file` is the last candidate processed, `None` when the
    /// directory held no candidates.
    Result { found: bool, file: Option<String> },
}

impl TaskEvent {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Error { .. } => "error",
            Self::Result { .. } => "result",
        }
    }

    /// Query parameters, in wire order.
    pub fn query(&self, task_id: &str, style: StatusStyle) -> Vec<(&'static str, String)> {
        let mut params = vec![("action", self.action().to_string()), ("id", task_id.to_string())];
        match self {
            Self::Start => {}
            Self::Error { code, file } => {
                params.push(("code", code.to_string()));
                params.push(("file", file.clone()));
            }
            Self::Result { found, file } => {
                params.push(("status", style.render(*found).to_string()));
                params.push(("file", file.clone().unwrap_or_default()));
            }
        }
        params
    }
}

/// Receiver of task life-cycle events.
#[allow(async_fn_in_trait)]
pub trait Reporter {
    async fn send(&self, task_id: &str, event: &TaskEvent) -> Result<(), ReportError>;
}

/// Reporter that calls the task server over HTTP.
///
/// No timeout and no retry: a stalled server stalls the scan.
pub struct HttpReporter {
    http: reqwest::Client,
    url: String,
    style: StatusStyle,
}

impl HttpReporter {
    pub fn new(url: impl Into<String>, style: StatusStyle) -> Result<Self, ReportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("facescan/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            style,
        })
    }
}

impl Reporter for HttpReporter {
    async fn send(&self, task_id: &str, event: &TaskEvent) -> Result<(), ReportError> {
        let response = self
            .http
            .get(&self.url)
            .query(&event.query(task_id, self.style))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(task_id, action = event.action(), "event delivered");
        } else {
            tracing::warn!(task_id, action = event.action(), %status, "task server answered with an error status");
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use httpmock::prelude::*;

    /// A URL nothing listens on: the port is bound, then released.
    pub(crate) async fn dead_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/taskResult")
    }

    #[test]
    fn test_start_query() {
        let q = TaskEvent::Start.query("t-1", StatusStyle::Lowercase);
        assert_eq!(q, vec![("action", "start".to_string()), ("id", "t-1".to_string())]);
    }

    #[test]
    fn test_error_query_uses_decimal_code() {
        let event = TaskEvent::Error {
            code: FACE_NOT_FOUND_CODE,
            file: "/photos/a.jpg".into(),
        };
        let q = event.query("t", StatusStyle::Lowercase);
        assert_eq!(q[2], ("code", "16".to_string()));
        assert_eq!(q[3], ("file", "/photos/a.jpg".to_string()));
    }

    #[test]
    fn test_result_query() {
        let event = TaskEvent::Result {
            found: true,
            file: Some("/photos/b.jpg".into()),
        };
        assert_eq!(
            event.query("t", StatusStyle::Lowercase),
            vec![
                ("action", "result".to_string()),
                ("id", "t".to_string()),
                ("status", "true".to_string()),
                ("file", "/photos/b.jpg".to_string()),
            ]
        );
        assert_eq!(event.query("t", StatusStyle::Capitalized)[2].1, "True");
    }

    #[test]
    fn test_result_without_candidates_sends_empty_file() {
        let event = TaskEvent::Result { found: false, file: None };
        let q = event.query("t", StatusStyle::Lowercase);
        assert_eq!(q[3], ("file", String::new()));
    }

    #[tokio::test]
    async fn test_http_reporter_sends_get_with_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/taskResult")
                    .query_param("action", "error")
                    .query_param("id", "job-1")
                    .query_param("code", "16")
                    .query_param("file", "/photos/my pic.jpg");
                then.status(200);
            })
            .await;
        let reporter = HttpReporter::new(server.url("/taskResult"), StatusStyle::Lowercase).unwrap();

        let event = TaskEvent::Error {
            code: FACE_NOT_FOUND_CODE,
            file: "/photos/my pic.jpg".into(),
        };
        reporter.send("job-1", &event).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_reporter_sends_capitalized_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/taskResult")
                    .query_param("action", "result")
                    .query_param("status", "True")
                    .query_param_exists("file");
                then.status(200);
            })
            .await;
        let reporter = HttpReporter::new(server.url("/taskResult"), StatusStyle::Capitalized).unwrap();

        let event = TaskEvent::Result { found: true, file: None };
        reporter.send("job-1", &event).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_reporter_ignores_error_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/taskResult").query_param("action", "start");
                then.status(500);
            })
            .await;
        let reporter = HttpReporter::new(server.url("/taskResult"), StatusStyle::Lowercase).unwrap();

        assert!(reporter.send("job-1", &TaskEvent::Start).await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_reporter_unreachable() {
        let reporter = HttpReporter::new(dead_url().await, StatusStyle::Lowercase).unwrap();
        let err = reporter.send("job-1", &TaskEvent::Start).await.unwrap_err();
        assert!(matches!(err, ReportError::Http(_)));
    }
}
