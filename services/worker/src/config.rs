use crate::error::WorkerResult;
use crate::executor::ExecutionProfile;
use rand::Rng;
use sortie_core::config::{env_opt, env_or, env_parse};
use sortie_core::LogFormat;
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Worker settings, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub broker_url: String,
    pub commander_url: String,
    pub worker_id: String,
    pub bootstrap_secret: Zeroizing<String>,
    pub concurrency: usize,
    pub refresh_margin: Duration,
    pub retry_delay: Duration,
    pub profile: ExecutionProfile,
    pub log_format: LogFormat,
}

/// `soldier-` plus eight random hex digits
pub fn generate_worker_id() -> String {
    format!("soldier-{:08x}", rand::thread_rng().gen::<u32>())
}

/// Positive slot count; zero or unparsable values fall back to 1.
pub fn parse_concurrency(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

impl Config {
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = ExecutionProfile::default();

        Ok(Config {
            broker_url: env_or("BROKER_URL", "redis://127.0.0.1:6379"),
            commander_url: env_or("COMMANDER_URL", "http://127.0.0.1:8080"),
            worker_id: env_opt("WORKER_ID").unwrap_or_else(generate_worker_id),
            bootstrap_secret: Zeroizing::new(env_or("WORKER_BOOTSTRAP_SECRET", "bootstrapsecret")),
            concurrency: parse_concurrency(env_opt("WORKER_CONCURRENCY").as_deref()),
            refresh_margin: Duration::from_secs(env_parse("TOKEN_REFRESH_MARGIN_SECS", 3u64)?),
            retry_delay: Duration::from_secs(env_parse("TOKEN_RETRY_SECS", 2u64)?.max(1)),
            profile: ExecutionProfile {
                min_units: env_parse("MISSION_MIN_SECS", defaults.min_units)?,
                max_units: env_parse("MISSION_MAX_SECS", defaults.max_units)?,
                unit: Duration::from_secs(1),
                success_rate: env_parse("MISSION_SUCCESS_RATE", defaults.success_rate)?,
            }
            .normalized(),
            log_format: LogFormat::parse(&env_or("LOG_FORMAT", "text")),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("broker_url", &self.broker_url)
            .field("commander_url", &self.commander_url)
            .field("worker_id", &self.worker_id)
            .field("bootstrap_secret", &"<redacted>")
            .field("concurrency", &self.concurrency)
            .field("refresh_margin", &self.refresh_margin)
            .field("retry_delay", &self.retry_delay)
            .field("profile", &self.profile)
            .field("log_format", &self.log_format)
            .finish()
    }
}
