//! In-memory stand-ins for the host collaborators

use async_trait::async_trait;
use http_job::{ConsoleColor, ConsoleSink, Error, ExecutionContext, MailSender};
use std::collections::HashMap;
use std::sync::Mutex;

/// A mail that was handed to the transport
#[derive(Clone, Debug)]
pub struct SentMail {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Mail transport that records every message
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail: bool,
}

impl RecordingMailer {
    /// A transport whose every send fails after recording the message
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(
        &self,
        recipients: &[String],
        subject: &str,
        html_body: &str,
    ) -> http_job::Result<()> {
        self.sent.lock().unwrap().push(SentMail {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: html_body.to_string(),
        });
        if self.fail {
            Err(Error::Notification("mail relay refused connection".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Host context backed by a parameter map, recording console output
#[derive(Default)]
pub struct TestContext {
    params: HashMap<String, String>,
    lines: Mutex<Vec<(ConsoleColor, String)>>,
    color: Mutex<Option<ConsoleColor>>,
}

impl TestContext {
    pub fn with_params(params: &[(&str, &str)]) -> Self {
        Self {
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    /// Context for the given retry count (`RetryCount` parameter)
    pub fn retry_count(count: &str) -> Self {
        Self::with_params(&[(http_job::params::RETRY_COUNT, count)])
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| l.clone())
            .collect()
    }

    pub fn lines_in(&self, color: ConsoleColor) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == color)
            .map(|(_, l)| l.clone())
            .collect()
    }
}

impl ConsoleSink for TestContext {
    fn set_color(&self, color: ConsoleColor) {
        *self.color.lock().unwrap() = Some(color);
    }

    fn write_line(&self, line: &str) {
        let color = self.color.lock().unwrap().unwrap_or(ConsoleColor::Default);
        self.lines.lock().unwrap().push((color, line.to_string()));
    }
}

impl ExecutionContext for TestContext {
    fn parameter(&self, name: &str) -> Option<String> {
        self.params.get(name).cloned()
    }
}
