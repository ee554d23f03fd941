//! Turning a [`JobDescription`] into an outbound request
//!
//! [`build_request`] is pure: same job and attempt context, same request. Nothing is sent
//! and no client is involved, so the result can be inspected in tests.

use crate::error::{Error, Result};
use crate::types::{AttemptContext, JobDescription};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderName, HeaderValue};
use reqwest::{Body, Method, Request, Url};

/// Header carrying the job's agent class
pub const AGENT_CLASS_HEADER: &str = "x-job-agent-class";
/// Header carrying the requested agent action
pub const AGENT_ACTION_HEADER: &str = "x-job-agent-action";
/// Agent action sent when a job has an agent class but the host supplied no action
pub const DEFAULT_AGENT_ACTION: &str = "run";

/// Build the request for one attempt of `job`
///
/// - method and URL are taken verbatim
/// - `Accept` is the job's content type
/// - the body is attached only for non-GET methods with a non-empty body
/// - agent headers and Basic auth are added when configured
pub fn build_request(job: &JobDescription, attempt: &AttemptContext) -> Result<Request> {
    let method = parse_method(&job.method)?;
    let url = Url::parse(&job.url)
        .map_err(|e| Error::InvalidRequest(format!("invalid URL '{}': {}", job.url, e)))?;

    let mut request = Request::new(method, url);

    request
        .headers_mut()
        .insert(ACCEPT, header_value("Accept", &job.content_type)?);

    if !job.method.eq_ignore_ascii_case("GET")
        && let Some(body) = job.body.as_deref().filter(|b| !b.is_empty())
    {
        *request.body_mut() = Some(Body::from(body.as_bytes().to_vec()));
    }

    let agent_class = job.agent_class.as_deref().filter(|c| !c.is_empty());
    if let Some(agent_class) = agent_class {
        request.headers_mut().insert(
            HeaderName::from_static(AGENT_CLASS_HEADER),
            header_value(AGENT_CLASS_HEADER, agent_class)?,
        );
    }

    let action = match attempt.action.as_deref().filter(|a| !a.is_empty()) {
        Some(action) => Some(action),
        None => agent_class.map(|_| DEFAULT_AGENT_ACTION),
    };
    if let Some(action) = action {
        request.headers_mut().insert(
            HeaderName::from_static(AGENT_ACTION_HEADER),
            header_value(AGENT_ACTION_HEADER, action)?,
        );
    }

    if job.auth.is_complete() {
        request
            .headers_mut()
            .insert(AUTHORIZATION, basic_auth_value(&job.auth.user, &job.auth.password)?);
    }

    Ok(request)
}

/// Standard methods match case-insensitively and go out in their canonical form.
/// Anything else is sent as an extension token, exactly as given.
fn parse_method(name: &str) -> Result<Method> {
    let standard = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::HEAD,
        Method::OPTIONS,
        Method::TRACE,
        Method::CONNECT,
    ];
    if let Some(method) = standard.iter().find(|m| m.as_str().eq_ignore_ascii_case(name)) {
        return Ok(method.clone());
    }
    Method::from_bytes(name.as_bytes())
        .map_err(|_| Error::InvalidRequest(format!("invalid HTTP method '{}'", name)))
}

/// `Basic base64(user:password)`
///
/// Credentials must be ASCII.
fn basic_auth_value(user: &str, password: &str) -> Result<HeaderValue> {
    let credentials = format!("{}:{}", user, password);
    if !credentials.is_ascii() {
        return Err(Error::InvalidRequest(
            "basic auth credentials must be ASCII".to_string(),
        ));
    }
    let encoded = STANDARD.encode(credentials);
    let mut value = header_value("Authorization", &format!("Basic {}", encoded))?;
    value.set_sensitive(true);
    Ok(value)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::InvalidRequest(format!("invalid value for header {}", name)))
}
