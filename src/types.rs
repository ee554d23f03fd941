//! Core types: job descriptions, invocation parameters and attempt outcomes

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Names of the per-invocation parameters a host exposes through
/// [`ExecutionContext::parameter`](crate::transcript::ExecutionContext::parameter)
pub mod params {
    /// Runtime body override
    pub const DATA: &str = "Data";
    /// Number of retries the host has already performed
    pub const RETRY_COUNT: &str = "RetryCount";
    /// Value for the `x-job-agent-action` header
    pub const ACTION: &str = "Action";
}

/// Credentials for HTTP Basic authentication
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuth {
    /// Username
    #[serde(default)]
    pub user: String,
    /// Password
    #[serde(default)]
    pub password: String,
}

impl BasicAuth {
    /// Both halves present
    pub fn is_complete(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }
}

/// Declarative description of one HTTP job
///
/// Hosts usually persist this as JSON alongside the queued job; field names are
/// camelCase and everything except `url` and `method` may be omitted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    /// Target URL
    pub url: String,

    /// HTTP method, e.g. "GET" or "post"
    pub method: String,

    /// Media type sent as the `Accept` header
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Basic authentication credentials
    #[serde(default)]
    pub auth: BasicAuth,

    /// Request body (ignored for GET)
    #[serde(default)]
    pub body: Option<String>,

    /// Agent class forwarded as `x-job-agent-class`
    #[serde(default)]
    pub agent_class: Option<String>,

    /// Request timeout in milliseconds (values below 1 fall back to the default)
    #[serde(default)]
    pub timeout_ms: i64,

    /// Hand transient failures back to the host for another attempt
    #[serde(default)]
    pub enable_retry: bool,

    /// Mail the transcript after a successful attempt
    #[serde(default)]
    pub send_success_mail: bool,

    /// Mail the transcript and error after a final failure
    #[serde(default)]
    pub send_fail_mail: bool,

    /// Recipients replacing the global alert list (comma separated)
    #[serde(default)]
    pub mail: Option<String>,

    /// Name used in transcripts and mail subjects
    #[serde(default)]
    pub job_name: String,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

impl JobDescription {
    /// Create a job for the given method and URL with everything else defaulted
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            content_type: default_content_type(),
            ..Default::default()
        }
    }

    /// Timeout to enforce, falling back to `default` when unset or below 1 ms
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        if self.timeout_ms < 1 {
            default
        } else {
            Duration::from_millis(self.timeout_ms as u64)
        }
    }

    /// Replace the body with a runtime override, if one was supplied and is non-empty
    pub fn apply_data_override(&mut self, data: Option<String>) {
        if let Some(data) = data.filter(|d| !d.is_empty()) {
            self.body = Some(data);
        }
    }

    /// Copy with the basic-auth password masked, for transcripts and logs
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.auth.password.is_empty() {
            copy.auth.password = "******".to_string();
        }
        copy
    }
}

/// Parameters of the invocation as seen by the host scheduler
#[derive(Clone, Debug, Default)]
pub struct JobInvocation {
    /// Job name override (falls back to the description's `job_name`)
    pub job_name: Option<String>,
    /// Queue the job was taken from
    pub queue: Option<String>,
    /// Whether the host flagged this run as a retry
    pub is_retry: bool,
}

impl JobInvocation {
    /// Queue name, "DEFAULT" when unset
    pub fn queue_or_default(&self) -> &str {
        self.queue.as_deref().unwrap_or("DEFAULT")
    }

    /// Job name from the invocation, else from the description
    pub fn name<'a>(&'a self, job: &'a JobDescription) -> &'a str {
        self.job_name.as_deref().unwrap_or(&job.job_name)
    }

    /// Label a host dashboard can show for this run
    pub fn display_name(&self, job: &JobDescription) -> String {
        format!(
            "[{} | {} | Retry:{}]",
            self.name(job),
            self.queue_or_default(),
            self.is_retry
        )
    }
}

/// What the host tells us about the current attempt
///
/// Read once per invocation and never written back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttemptContext {
    /// Retries already performed by the host (None on the first run)
    pub retry_count: Option<u32>,
    /// Explicit agent action for this run
    pub action: Option<String>,
}

impl AttemptContext {
    /// Build from raw parameter values
    ///
    /// A retry count that is not a non-negative integer is treated as absent.
    pub fn from_raw(retry_count: Option<&str>, action: Option<String>) -> Self {
        Self {
            retry_count: retry_count.and_then(|c| c.trim().parse().ok()),
            action: action.filter(|a| !a.is_empty()),
        }
    }
}

/// A completed HTTP exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// Response status code
    pub status: u16,
    /// Full response body as text
    pub body: String,
    /// Time from send to end of body
    pub elapsed: Duration,
}

impl HttpResponse {
    /// Elapsed time in whole milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Result of executing one request
#[derive(Debug)]
pub enum Outcome {
    /// The server answered (any status code)
    Success(HttpResponse),
    /// No usable answer
    Failure(Error),
}

impl Outcome {
    /// Whether the exchange completed
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Convert into a `Result`
    pub fn into_result(self) -> Result<HttpResponse, Error> {
        match self {
            Outcome::Success(response) => Ok(response),
            Outcome::Failure(error) => Err(error),
        }
    }
}
