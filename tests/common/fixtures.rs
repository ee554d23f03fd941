//! Runner and job builders shared by the integration tests

use super::RecordingMailer;
use http_job::{ClientPool, Config, HttpJobRunner, JobDescription, MailSender, Notifier};
use std::sync::Arc;

pub const ALERT_RECIPIENT: &str = "ops@example.com";

/// Runner with the given config and mailer, alerting a single recipient
pub fn runner_with(config: Config, mailer: Arc<RecordingMailer>) -> HttpJobRunner {
    let pool = Arc::new(ClientPool::new(config.client_pool.clone()));
    let notifier = Notifier::new(
        mailer as Arc<dyn MailSender>,
        vec![ALERT_RECIPIENT.to_string()],
    );
    HttpJobRunner::new(Arc::new(config), pool, notifier)
}

pub fn test_runner() -> (HttpJobRunner, Arc<RecordingMailer>) {
    let mailer = Arc::new(RecordingMailer::default());
    (runner_with(Config::default(), Arc::clone(&mailer)), mailer)
}

/// Job with both mail flags on
pub fn job(
    method: &str,
    url: impl Into<String>,
    timeout_ms: i64,
    enable_retry: bool,
) -> JobDescription {
    let mut job = JobDescription::new(method, url);
    job.job_name = "integration".to_string();
    job.timeout_ms = timeout_ms;
    job.enable_retry = enable_retry;
    job.send_success_mail = true;
    job.send_fail_mail = true;
    job
}
