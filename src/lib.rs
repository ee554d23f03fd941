//! # http-job
//!
//! Execution core for background HTTP jobs. A host job scheduler calls
//! [`HttpJobRunner::run`] once per attempt; the runner sends exactly one HTTP request,
//! records a transcript, mails alerts, and tells the host whether to retry.
//!
//! ## Responsibilities
//!
//! - **Client reuse** - one pooled `reqwest::Client` per destination origin (or per proxy)
//! - **Request building** - declarative [`JobDescription`] to request, agent headers, Basic auth
//! - **Deadlines** - each attempt is cut off after the job's timeout
//! - **Retry decisions** - transient failures go back to the host until the final retry
//! - **Alerts** - success/failure mail with the transcript and the full error chain
//!
//! Persistence, attempt counting and backoff timing belong to the host.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use http_job::{
//!     ClientPool, Config, ConsoleColor, ConsoleSink, ExecutionContext, HttpJobRunner,
//!     JobDescription, JobInvocation, NoopMailSender, Notifier,
//! };
//!
//! struct Ctx;
//!
//! impl ConsoleSink for Ctx {
//!     fn set_color(&self, _color: ConsoleColor) {}
//!     fn write_line(&self, line: &str) {
//!         println!("{}", line);
//!     }
//! }
//!
//! impl ExecutionContext for Ctx {
//!     fn parameter(&self, _name: &str) -> Option<String> {
//!         None
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::default());
//!     config.validate()?;
//!
//!     let pool = Arc::new(ClientPool::new(config.client_pool.clone()));
//!     let notifier = Notifier::new(Arc::new(NoopMailSender), config.mail.alert_mail_list.clone());
//!     let runner = HttpJobRunner::new(config, pool, notifier);
//!
//!     let job = JobDescription::new("GET", "http://localhost:8080/ping");
//!     let outcome = runner.run(job, &JobInvocation::default(), &Ctx).await;
//!     if outcome.should_retry() {
//!         println!("host should retry: {:?}", outcome.error());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Pooled HTTP clients
pub mod client_pool;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Request execution with deadlines
pub mod executor;
/// Success/failure mail
pub mod notifier;
/// Request construction
pub mod request;
/// Retry decisions
pub mod retry;
/// Per-attempt entry point
pub mod runner;
/// Host context and transcripts
pub mod transcript;
/// Core types
pub mod types;

// Re-export commonly used types
pub use client_pool::{ClientPool, TargetKey};
pub use config::{ClientPoolConfig, Config, MailConfig, RetryConfig};
pub use error::{Error, ErrorKind, Result};
pub use notifier::{MailSender, NoopMailSender, Notifier};
pub use retry::{AttemptState, RetryCoordinator, RetryDecision};
pub use runner::{HttpJobRunner, JobOutcome};
pub use transcript::{ConsoleColor, ConsoleSink, ExecutionContext, Transcript};
pub use types::{
    AttemptContext, BasicAuth, HttpResponse, JobDescription, JobInvocation, Outcome, params,
};
