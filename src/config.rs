//! Runtime configuration read from `MEMBERSHIP_*` environment variables.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub db_root: PathBuf,
    pub token_secret: Vec<u8>,
    pub token_valid_hours: i64,
    /// Base URL of the OTP verification service; `None` selects the in-process verifier.
    pub otp_url: Option<String>,
    pub snapshot_secs: u64,
    pub root_email: String,
    pub root_password: String,
    pub bucket_prefix: String,
    pub object_url: String,
    /// Prefix of the link mailed for email confirmation; the token is appended.
    pub email_confirmation_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8700,
            db_root: PathBuf::from("membership_db"),
            token_secret: b"membership-development-secret".to_vec(),
            token_valid_hours: 1,
            otp_url: None,
            snapshot_secs: 30,
            root_email: "root@membership.local".to_string(),
            root_password: "membership".to_string(),
            bucket_prefix: "membership".to_string(),
            object_url: "http://localhost:9000".to_string(),
            email_confirmation_url: "http://localhost:8700/email_confirmation/".to_string(),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_opt(key) {
        Some(raw) => raw.parse::<T>().with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let d = Config::default();
        let token_secret = match env_opt("MEMBERSHIP_TOKEN_SECRET") {
            Some(s) => s.into_bytes(),
            None => {
                warn!(target: "membership::config", "MEMBERSHIP_TOKEN_SECRET is unset; generating an ephemeral secret, issued tokens will not survive a restart");
                let mut buf = [0u8; 32];
                getrandom::getrandom(&mut buf).map_err(|e| anyhow::anyhow!(e.to_string()))?;
                buf.to_vec()
            }
        };
        let token_valid_hours: i64 = env_parse("MEMBERSHIP_TOKEN_VALID_HOURS", d.token_valid_hours)?;
        if token_valid_hours <= 0 {
            anyhow::bail!("MEMBERSHIP_TOKEN_VALID_HOURS must be positive, got {}", token_valid_hours);
        }
        Ok(Self {
            http_port: env_parse("MEMBERSHIP_HTTP_PORT", d.http_port)?,
            db_root: env_opt("MEMBERSHIP_DB_FOLDER").map(PathBuf::from).unwrap_or(d.db_root),
            token_secret,
            token_valid_hours,
            otp_url: env_opt("MEMBERSHIP_OTP_URL"),
            snapshot_secs: env_parse("MEMBERSHIP_SNAPSHOT_SECS", d.snapshot_secs)?,
            root_email: env_opt("MEMBERSHIP_ROOT_EMAIL").unwrap_or(d.root_email).to_lowercase(),
            root_password: env_opt("MEMBERSHIP_ROOT_PASSWORD").unwrap_or(d.root_password),
            bucket_prefix: env_opt("MEMBERSHIP_BUCKET_PREFIX").unwrap_or(d.bucket_prefix),
            object_url: env_opt("MEMBERSHIP_OBJECT_URL").unwrap_or(d.object_url),
            email_confirmation_url: env_opt("MEMBERSHIP_EMAIL_CONFIRMATION_URL").unwrap_or(d.email_confirmation_url),
        })
    }
}
