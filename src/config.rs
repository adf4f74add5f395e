use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Screenshots larger than this are refused by the upload layer.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Falls back to `user` when unset.
    pub from: Option<String>,
}

impl SmtpConfig {
    pub fn sender(&self) -> Option<&str> {
        self.from.as_deref().or(self.user.as_deref())
    }

    pub fn has_credentials(&self) -> bool {
        self.user.is_some() && self.password.is_some()
    }
}

/// Everything read from the environment at startup. Never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub mail_timeout: Option<Duration>,
    pub smtp: SmtpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            mail_timeout: None,
            smtp: SmtpConfig {
                host: "smtp.gmail.com".to_string(),
                port: 465,
                user: None,
                password: None,
                from: None,
            },
        }
    }
}

// empty values count as unset, same as a missing variable
fn var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(lookup, key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {key}: {v}"))
        })
        .transpose()
}

/// Accepts the outcome of a `.env` load. Only a missing file is tolerated;
/// one that exists but cannot be read or parsed is a startup error.
pub fn tolerate_missing_env_file<T>(loaded: dotenvy::Result<T>) -> Result<Option<T>> {
    match loaded {
        Ok(found) => Ok(Some(found)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e).context("Failed to load .env"),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.log_summary();
        Ok(config)
    }

    /// Builds the config from any key/value source, `from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let mail_timeout = match parse_var::<u64>(&lookup, "MAIL_TIMEOUT_SECS")? {
            Some(0) => return Err(anyhow!("MAIL_TIMEOUT_SECS must be greater than 0")),
            secs => secs.map(Duration::from_secs),
        };

        Ok(Self {
            port: parse_var(&lookup, "PORT")?.unwrap_or(defaults.port),
            upload_dir: var(&lookup, "UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_bytes: defaults.max_upload_bytes,
            mail_timeout,
            smtp: SmtpConfig {
                host: var(&lookup, "SMTP_HOST").unwrap_or(defaults.smtp.host),
                port: parse_var(&lookup, "SMTP_PORT")?.unwrap_or(defaults.smtp.port),
                user: var(&lookup, "SMTP_USER"),
                password: var(&lookup, "SMTP_PASSWORD"),
                from: var(&lookup, "MAIL_FROM"),
            },
        })
    }

    fn log_summary(&self) {
        info!("Upload directory: {}", self.upload_dir.display());
        info!("SMTP relay: {}:{}", self.smtp.host, self.smtp.port);
        if !self.smtp.has_credentials() {
            warn!("SMTP_USER or SMTP_PASSWORD not set, confirmation emails will fail to send");
        }
        if let Some(timeout) = self.mail_timeout {
            info!("Mail send timeout: {}s", timeout.as_secs());
        }
    }
}
