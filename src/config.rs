//! Configuration types for http-job
//!
//! One [`Config`] is built per process and shared by `Arc`. Components receive it at
//! construction and never read ambient global state.

use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout applied when a job has none (or a non-positive one), in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Main configuration for the job runner
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Fallback request timeout for jobs that do not set one (default: 5000 ms)
    #[serde(default = "default_timeout", with = "millis_serde")]
    pub default_timeout: Duration,

    /// Proxy every job request is routed through (None = direct connections)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Alert mail settings
    #[serde(default)]
    pub mail: MailConfig,

    /// Retry policy shared with the host scheduler
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP client pool sizing
    #[serde(default)]
    pub client_pool: ClientPoolConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            proxy: None,
            mail: MailConfig::default(),
            retry: RetryConfig::default(),
            client_pool: ClientPoolConfig::default(),
        }
    }
}

impl Config {
    /// Check settings that would otherwise only fail on first use
    pub fn validate(&self) -> Result<()> {
        if let Some(proxy) = self.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            reqwest::Proxy::all(proxy)
                .map_err(|e| Error::config(format!("invalid proxy '{}': {}", proxy, e), "proxy"))?;
        }
        if self.client_pool.max_clients == 0 {
            return Err(Error::config(
                "max_clients must be greater than zero",
                "client_pool.max_clients",
            ));
        }
        if self.retry.delays.is_empty() {
            return Err(Error::config(
                "retry delay schedule must not be empty",
                "retry.delays",
            ));
        }
        if self.retry.notify_on_attempt > self.retry.max_attempts {
            return Err(Error::config(
                format!(
                    "notify_on_attempt ({}) exceeds max_attempts ({})",
                    self.retry.notify_on_attempt, self.retry.max_attempts
                ),
                "retry.notify_on_attempt",
            ));
        }
        Ok(())
    }

    /// The configured proxy, ignoring blank values
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Alert mail settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MailConfig {
    /// Recipients used when a job has no mail override
    #[serde(default)]
    pub alert_mail_list: Vec<String>,
}

/// Retry policy
///
/// Attempt counting and the actual waiting belong to the host scheduler. This struct
/// only tells the host how long to wait and tells the runner when to stop asking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of host-level retries (default: 3)
    ///
    /// The host scheduler enforces this bound; the runner only checks at validation time
    /// that `notify_on_attempt` is reachable within it.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before each successive retry (default: 20s, 30s, 60s)
    #[serde(default = "default_delays", with = "secs_vec_serde")]
    pub delays: Vec<Duration>,

    /// Retry count at which a failure is reported and no further retry requested (default: 3)
    #[serde(default = "default_notify_on_attempt")]
    pub notify_on_attempt: u32,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delays: default_delays(),
            notify_on_attempt: default_notify_on_attempt(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Delay the host should wait before the retry following `retry_count` previous retries
    ///
    /// Counts past the end of the schedule reuse its last entry.
    pub fn delay_for_attempt(&self, retry_count: u32) -> Duration {
        let Some(last) = self.delays.last() else {
            return Duration::ZERO;
        };
        let delay = self
            .delays
            .get(retry_count as usize)
            .copied()
            .unwrap_or(*last);
        if self.jitter { add_jitter(delay) } else { delay }
    }
}

/// Add random jitter to a delay to spread out retries of many jobs failing together
///
/// The actual delay lands between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

/// HTTP client pool settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientPoolConfig {
    /// Maximum number of cached clients before the least recently used is dropped (default: 256)
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// How long an idle connection stays open inside a client (default: 90 seconds)
    #[serde(default = "default_pool_idle_timeout", with = "secs_serde")]
    pub pool_idle_timeout: Duration,

    /// TCP connect timeout (None = bounded only by the job timeout)
    #[serde(default, with = "optional_secs_serde")]
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientPoolConfig {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            pool_idle_timeout: default_pool_idle_timeout(),
            connect_timeout: None,
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_millis(DEFAULT_TIMEOUT_MS)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delays() -> Vec<Duration> {
    vec![
        Duration::from_secs(20),
        Duration::from_secs(30),
        Duration::from_secs(60),
    ]
}

fn default_notify_on_attempt() -> u32 {
    3
}

fn default_max_clients() -> usize {
    256
}

fn default_pool_idle_timeout() -> Duration {
    Duration::from_secs(90)
}

mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod secs_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod optional_secs_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

mod secs_vec_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(delays: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(delays.iter().map(Duration::as_secs))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Vec::<u64>::deserialize(deserializer)?;
        Ok(secs.into_iter().map(Duration::from_secs).collect())
    }
}
