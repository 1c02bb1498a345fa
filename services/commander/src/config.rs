use sortie_core::config::{env_opt, env_or, env_parse};
use sortie_core::{CoreResult, LogFormat};
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

/// Commander settings, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub broker_url: String,
    pub bootstrap_secret: Zeroizing<String>,
    pub token_ttl: Duration,
    pub admin_user: String,
    pub admin_pass: Zeroizing<String>,
    pub outbox_sweep: Duration,
    pub outbox_grace: Duration,
    /// Status consumer name; stable across restarts so pending entries are replayed
    pub consumer: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broker_url: "redis://127.0.0.1:6379".to_string(),
            bootstrap_secret: Zeroizing::new("bootstrapsecret".to_string()),
            token_ttl: Duration::from_secs(30),
            admin_user: "admin".to_string(),
            admin_pass: Zeroizing::new("adminpass".to_string()),
            outbox_sweep: Duration::from_secs(15),
            outbox_grace: Duration::from_secs(10),
            consumer: "commander-1".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> CoreResult<Self> {
        let defaults = Config::default();
        let redis_url = env_or("REDIS_URL", &defaults.redis_url);

        Ok(Config {
            port: env_parse("COMMANDER_PORT", defaults.port)?,
            broker_url: env_opt("BROKER_URL").unwrap_or_else(|| redis_url.clone()),
            redis_url,
            bootstrap_secret: Zeroizing::new(env_or(
                "WORKER_BOOTSTRAP_SECRET",
                &defaults.bootstrap_secret,
            )),
            token_ttl: Duration::from_secs(env_parse("TOKEN_TTL_SECS", 30u64)?.max(1)),
            admin_user: env_or("ADMIN_USER", &defaults.admin_user),
            admin_pass: Zeroizing::new(env_or("ADMIN_PASS", &defaults.admin_pass)),
            outbox_sweep: Duration::from_secs(env_parse("OUTBOX_SWEEP_SECS", 15u64)?.max(1)),
            outbox_grace: Duration::from_secs(env_parse("OUTBOX_GRACE_SECS", 10u64)?),
            consumer: env_or("COMMANDER_CONSUMER", &defaults.consumer),
            log_format: LogFormat::parse(&env_or("LOG_FORMAT", "text")),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("redis_url", &self.redis_url)
            .field("broker_url", &self.broker_url)
            .field("bootstrap_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("admin_user", &self.admin_user)
            .field("admin_pass", &"<redacted>")
            .field("outbox_sweep", &self.outbox_sweep)
            .field("outbox_grace", &self.outbox_grace)
            .field("consumer", &self.consumer)
            .field("log_format", &self.log_format)
            .finish()
    }
}
