//! Success and failure mail for finished attempts
//!
//! Notifications are best-effort. A failing mail transport is logged and swallowed so it
//! can never change or hide the outcome of the job itself.

use crate::error::{Error, Result};
use crate::types::JobDescription;
use async_trait::async_trait;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;

/// Indentation added per level of nested cause
const CAUSE_INDENT: &str = "&nbsp;&nbsp;&nbsp;";

/// Outbound mail transport
///
/// Implemented by the host. The body is HTML.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send one message to all `recipients`
    async fn send(&self, recipients: &[String], subject: &str, html_body: &str) -> Result<()>;
}

/// Mail sender that only logs
///
/// Useful when the host has no mail transport configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMailSender;

#[async_trait]
impl MailSender for NoopMailSender {
    async fn send(&self, recipients: &[String], subject: &str, _html_body: &str) -> Result<()> {
        tracing::info!(?recipients, subject, "mail transport not configured, skipping");
        Ok(())
    }
}

/// Renders and dispatches job notifications
#[derive(Clone)]
pub struct Notifier {
    sender: Arc<dyn MailSender>,
    alert_mail_list: Vec<String>,
}

impl Notifier {
    /// Create a notifier using `alert_mail_list` for jobs without their own recipients
    pub fn new(sender: Arc<dyn MailSender>, alert_mail_list: Vec<String>) -> Self {
        Self {
            sender,
            alert_mail_list,
        }
    }

    /// Recipients for `job`: its own list if set, else the global alert list
    pub fn recipients(&self, job: &JobDescription) -> Vec<String> {
        match job.mail.as_deref().filter(|m| !m.is_empty()) {
            Some(mail) => split_recipients(mail),
            None => self
                .alert_mail_list
                .iter()
                .map(|r| r.trim())
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Mail the transcript of a successful attempt, if the job asks for it
    pub async fn notify_success(&self, job: &JobDescription, transcript: &str) {
        if !job.send_success_mail {
            return;
        }
        let subject = format!("[JOB][Success] {}", job.job_name);
        let body = line_breaks_to_html(transcript);
        self.dispatch(job, &subject, &body).await;
    }

    /// Mail the transcript and rendered error chain of a failed attempt, if the job asks for it
    pub async fn notify_failure(
        &self,
        job: &JobDescription,
        transcript: &str,
        error: &Error,
        backtrace: Option<&Backtrace>,
    ) {
        if !job.send_fail_mail {
            return;
        }
        let subject = format!("[JOB][Fail] {}", job.job_name);
        let mut body = line_breaks_to_html(transcript);
        body.push_str("<br/>");
        body.push_str(&render_error_chain(error, backtrace));
        self.dispatch(job, &subject, &body).await;
    }

    async fn dispatch(&self, job: &JobDescription, subject: &str, body: &str) {
        let recipients = self.recipients(job);
        if recipients.is_empty() {
            tracing::debug!(job = %job.job_name, "no mail recipients, skipping notification");
            return;
        }
        match self.sender.send(&recipients, subject, body).await {
            Ok(()) => tracing::debug!(job = %job.job_name, subject, "notification sent"),
            Err(e) => tracing::error!(
                job = %job.job_name,
                subject,
                error = %e,
                "failed to send notification"
            ),
        }
    }
}

/// Split a comma or semicolon separated recipient list, dropping blanks
pub fn split_recipients(list: &str) -> Vec<String> {
    list.split([',', ';'])
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Replace newlines with `<br/>`
pub fn line_breaks_to_html(text: &str) -> String {
    text.replace("\r\n", "<br/>").replace('\n', "<br/>")
}

/// Escape `&`, `<`, `>` and `"` for embedding in HTML
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render an error and all of its causes as HTML
///
/// Each level shows the type, the message and (for the outermost error, when one was
/// captured) the backtrace. Every nested cause is indented one step deeper than its parent.
pub fn render_error_chain(
    error: &(dyn std::error::Error + 'static),
    backtrace: Option<&Backtrace>,
) -> String {
    let mut out = String::new();
    let mut current = Some(error);
    let mut depth = 0;

    while let Some(err) = current {
        let indent = CAUSE_INDENT.repeat(depth);
        out.push_str(&format!("{}{}<br/>", indent, html_escape(&type_label(err))));
        out.push_str(&format!(
            "{}Message:{}<br/>",
            indent,
            line_breaks_to_html(&html_escape(&err.to_string()))
        ));
        if depth == 0
            && let Some(bt) = backtrace.filter(|bt| bt.status() == BacktraceStatus::Captured)
        {
            out.push_str(&format!(
                "{}StackTrace:<br/>{}<br/>",
                indent,
                line_breaks_to_html(&html_escape(&bt.to_string()))
            ));
        }
        current = err.source();
        depth += 1;
    }

    out
}

/// Type name for an error
///
/// `std::io::Error` is named with its kind, since its `Debug` output starts with an
/// internal representation. Everything else falls back to the leading identifier of
/// the `Debug` output.
fn type_label(err: &(dyn std::error::Error + 'static)) -> String {
    if let Some(io) = err.downcast_ref::<std::io::Error>() {
        return format!("std::io::Error({:?})", io.kind());
    }
    let debug = format!("{:?}", err);
    let end = debug
        .find(|c: char| c == '{' || c == '(' || c.is_whitespace())
        .unwrap_or(debug.len());
    let label = debug[..end].trim();
    if label.is_empty() || label.starts_with('"') {
        "Error".to_string()
    } else {
        label.to_string()
    }
}
