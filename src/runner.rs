//! Entry point the host scheduler calls for each job attempt
//!
//! One call is one attempt: build the request, send it once, record a transcript, and
//! tell the host whether to schedule another attempt. There is no retry loop in here.

use crate::client_pool::{ClientPool, TargetKey};
use crate::config::Config;
use crate::error::Error;
use crate::executor::execute;
use crate::notifier::Notifier;
use crate::request::build_request;
use crate::retry::{AttemptState, RetryCoordinator, RetryDecision};
use crate::transcript::{ConsoleColor, ExecutionContext, Transcript, format_timestamp};
use crate::types::{AttemptContext, HttpResponse, JobDescription, JobInvocation, params};
use chrono::Local;
use std::backtrace::Backtrace;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// What the host should do after an attempt
#[derive(Debug)]
pub enum JobOutcome {
    /// The request completed
    Succeeded(HttpResponse),
    /// The attempt failed and will not be retried; the failure has been reported
    Failed(Error),
    /// The attempt failed; schedule another one after `delay`
    Retry {
        /// Why the attempt failed
        error: Error,
        /// Suggested wait before the next attempt
        delay: Duration,
    },
}

impl JobOutcome {
    /// Terminal state of the attempt
    pub fn state(&self) -> AttemptState {
        match self {
            JobOutcome::Succeeded(_) => AttemptState::Succeeded,
            JobOutcome::Failed(_) => AttemptState::FailedSuppressed,
            JobOutcome::Retry { .. } => AttemptState::FailedPropagated,
        }
    }

    /// Whether the host should run the job again
    pub fn should_retry(&self) -> bool {
        matches!(self, JobOutcome::Retry { .. })
    }

    /// The failure, if the attempt failed
    pub fn error(&self) -> Option<&Error> {
        match self {
            JobOutcome::Succeeded(_) => None,
            JobOutcome::Failed(error) | JobOutcome::Retry { error, .. } => Some(error),
        }
    }
}

/// Runs HTTP job attempts
///
/// Cheap to clone; clones share the client pool and notifier.
#[derive(Clone)]
pub struct HttpJobRunner {
    config: Arc<Config>,
    pool: Arc<ClientPool>,
    notifier: Notifier,
    retry: RetryCoordinator,
}

impl HttpJobRunner {
    /// Create a runner from shared configuration, client pool and notifier
    pub fn new(config: Arc<Config>, pool: Arc<ClientPool>, notifier: Notifier) -> Self {
        let retry = RetryCoordinator::new(config.retry.clone());
        Self {
            config,
            pool,
            notifier,
            retry,
        }
    }

    /// The shared client pool
    pub fn pool(&self) -> &Arc<ClientPool> {
        &self.pool
    }

    /// Run one attempt of `job`
    pub async fn run(
        &self,
        mut job: JobDescription,
        invocation: &JobInvocation,
        ctx: &dyn ExecutionContext,
    ) -> JobOutcome {
        job.apply_data_override(ctx.parameter(params::DATA));
        let timeout = job.effective_timeout(self.config.default_timeout);
        let attempt = AttemptContext::from_raw(
            ctx.parameter(params::RETRY_COUNT).as_deref(),
            ctx.parameter(params::ACTION),
        );

        let span = tracing::info_span!(
            "http_job",
            job = %invocation.name(&job),
            queue = %invocation.queue_or_default(),
            retry_count = ?attempt.retry_count,
        );
        self.run_attempt(job, invocation, attempt, timeout, ctx)
            .instrument(span)
            .await
    }

    async fn run_attempt(
        &self,
        job: JobDescription,
        invocation: &JobInvocation,
        attempt: AttemptContext,
        timeout: Duration,
        ctx: &dyn ExecutionContext,
    ) -> JobOutcome {
        let mut transcript = Transcript::new(ctx);
        transcript.set_color(ConsoleColor::Yellow);
        transcript.record(format!("JobStart:{}", format_timestamp(Local::now())));
        transcript.record(format!(
            "JobName:{}|QueueName:{}",
            invocation.name(&job),
            invocation.queue_or_default()
        ));
        match serde_json::to_string_pretty(&job.redacted()) {
            Ok(json) => transcript.record(format!("JobParam:【{}】", json)),
            Err(e) => tracing::warn!(error = %e, "failed to serialize job parameters"),
        }

        match self.send(&job, &attempt, timeout, &mut transcript).await {
            Ok(response) => {
                transcript.record(format!("ResponseCode:{}", response.status));
                transcript.record(format!("JobResult:{}", response.body));
                transcript.record(format!("JobEnd:{}", format_timestamp(Local::now())));
                tracing::info!(
                    status = response.status,
                    elapsed_ms = response.elapsed_ms(),
                    "job attempt completed"
                );
                let body = transcript.finalize();
                self.notifier.notify_success(&job, &body).await;
                JobOutcome::Succeeded(response)
            }
            Err(error) => {
                let backtrace = Backtrace::capture();
                transcript.set_color(ConsoleColor::Red);
                tracing::error!(url = %job.url, error = %error, "job attempt failed");
                transcript.record(error.to_string());

                let decision = self
                    .retry
                    .on_failure(job.enable_retry, attempt.retry_count, &error);
                let body = transcript.finalize();
                match decision {
                    RetryDecision::Suppress => {
                        self.notifier
                            .notify_failure(&job, &body, &error, Some(&backtrace))
                            .await;
                        JobOutcome::Failed(error)
                    }
                    RetryDecision::Propagate { delay } => JobOutcome::Retry { error, delay },
                }
            }
        }
    }

    async fn send(
        &self,
        job: &JobDescription,
        attempt: &AttemptContext,
        timeout: Duration,
        transcript: &mut Transcript<'_>,
    ) -> Result<HttpResponse, Error> {
        let proxy = self.config.proxy();
        let key = TargetKey::for_url(&job.url, proxy)?;
        let client = self.pool.client(&key)?;
        if let Some(proxy) = proxy {
            transcript.record(format!("Proxy:{}", proxy));
        }

        let request = build_request(job, attempt)?;
        execute(&client, request, timeout).await.into_result()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::MailSender;
    use crate::transcript::ConsoleSink;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct TestContext {
        params: HashMap<String, String>,
        lines: Mutex<Vec<String>>,
        colors: Mutex<Vec<ConsoleColor>>,
    }

    impl TestContext {
        fn with(params: &[(&str, &str)]) -> Self {
            Self {
                params: params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl ConsoleSink for TestContext {
        fn set_color(&self, color: ConsoleColor) {
            self.colors.lock().unwrap().push(color);
        }

        fn write_line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    impl ExecutionContext for TestContext {
        fn parameter(&self, name: &str) -> Option<String> {
            self.params.get(name).cloned()
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MailSender for RecordingSender {
        async fn send(
            &self,
            _recipients: &[String],
            subject: &str,
            html_body: &str,
        ) -> crate::error::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), html_body.to_string()));
            Ok(())
        }
    }

    fn runner(config: Config) -> (HttpJobRunner, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::default());
        let notifier = Notifier::new(
            Arc::clone(&sender) as Arc<dyn MailSender>,
            vec!["ops@example.com".to_string()],
        );
        let pool = Arc::new(ClientPool::new(config.client_pool.clone()));
        (HttpJobRunner::new(Arc::new(config), pool, notifier), sender)
    }

    fn job(method: &str, url: String) -> JobDescription {
        let mut job = JobDescription::new(method, url);
        job.job_name = "unit".to_string();
        job.send_success_mail = true;
        job.send_fail_mail = true;
        job
    }

    #[tokio::test]
    async fn test_data_parameter_overrides_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_string("override"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (runner, _) = runner(Config::default());
        let mut job = job("POST", format!("{}/hook", mock_server.uri()));
        job.body = Some("original".to_string());
        let ctx = TestContext::with(&[(params::DATA, "override")]);

        let outcome = runner.run(job, &JobInvocation::default(), &ctx).await;
        assert_eq!(outcome.state(), AttemptState::Succeeded);
    }

    #[tokio::test]
    async fn test_action_parameter_sets_agent_header() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent"))
            .and(header("x-job-agent-class", "Reports.Agent"))
            .and(header("x-job-agent-action", "stop"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (runner, _) = runner(Config::default());
        let mut job = job("POST", format!("{}/agent", mock_server.uri()));
        job.agent_class = Some("Reports.Agent".to_string());
        let ctx = TestContext::with(&[(params::ACTION, "stop")]);

        let outcome = runner.run(job, &JobInvocation::default(), &ctx).await;
        assert!(!outcome.should_retry());
        assert!(outcome.error().is_none());
    }

    #[tokio::test]
    async fn test_transcript_lines_reach_console_and_mail() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&mock_server)
            .await;

        let (runner, sender) = runner(Config::default());
        let mut job = job("GET", format!("{}/ok", mock_server.uri()));
        job.auth.user = "svc".to_string();
        job.auth.password = "hunter2".to_string();
        let ctx = TestContext::default();
        let invocation = JobInvocation {
            queue: Some("critical".to_string()),
            ..Default::default()
        };

        runner.run(job, &invocation, &ctx).await;

        let lines = ctx.lines.lock().unwrap();
        assert!(lines[0].starts_with("JobStart:"));
        assert_eq!(lines[1], "JobName:unit|QueueName:critical");
        assert!(lines[2].starts_with("JobParam:"));
        assert!(!lines[2].contains("hunter2"), "password must be masked");
        assert!(lines.contains(&"ResponseCode:200".to_string()));
        assert!(lines.contains(&"JobResult:pong".to_string()));
        assert!(lines.last().unwrap().starts_with("JobEnd:"));
        assert_eq!(ctx.colors.lock().unwrap()[0], ConsoleColor::Yellow);

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "[JOB][Success] unit");
        assert!(sent[0].1.contains("ResponseCode:200<br/>JobResult:pong"));
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_retry() {
        let (runner, sender) = runner(Config::default());
        let mut job = job("GET", "not a url".to_string());
        job.enable_retry = true;
        let ctx = TestContext::default();

        let outcome = runner.run(job, &JobInvocation::default(), &ctx).await;

        assert_eq!(outcome.state(), AttemptState::FailedSuppressed);
        assert!(matches!(outcome.error(), Some(Error::InvalidRequest(_))));
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
        assert_eq!(
            ctx.colors.lock().unwrap().last(),
            Some(&ConsoleColor::Red)
        );
    }

    #[tokio::test]
    async fn test_failure_message_is_part_of_transcript() {
        let (runner, sender) = runner(Config::default());
        let job = job("GET", "not a url".to_string());
        let ctx = TestContext::default();

        let outcome = runner.run(job, &JobInvocation::default(), &ctx).await;
        let message = outcome.error().unwrap().to_string();

        assert_eq!(ctx.lines.lock().unwrap().last(), Some(&message));
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].0, "[JOB][Fail] unit");
        // Transcript first, rendered error chain after it
        let (transcript, chain) = sent[0].1.split_once("<br/>InvalidRequest<br/>").unwrap();
        assert!(transcript.ends_with(&message));
        assert!(chain.starts_with("Message:"));
    }

    #[tokio::test]
    async fn test_invalid_proxy_is_configuration_failure() {
        let config = Config {
            proxy: Some("::not a proxy::".to_string()),
            ..Default::default()
        };
        let (runner, _) = runner(config);
        let mut job = job("GET", "http://example.invalid/ok".to_string());
        job.enable_retry = true;
        let ctx = TestContext::default();

        let outcome = runner.run(job, &JobInvocation::default(), &ctx).await;

        assert!(!outcome.should_retry());
        assert!(matches!(outcome.error(), Some(Error::Config { .. })));
        assert!(runner.pool().is_empty());
    }

    #[tokio::test]
    async fn test_jobs_to_same_origin_share_a_client() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let (runner, _) = runner(Config::default());
        let ctx = TestContext::default();
        for p in ["/a", "/b", "/c"] {
            let job = job("GET", format!("{}{}", mock_server.uri(), p));
            let outcome = runner.run(job, &JobInvocation::default(), &ctx).await;
            assert_eq!(outcome.state(), AttemptState::Succeeded);
        }

        assert_eq!(runner.pool().created_count(), 1);
    }
}
