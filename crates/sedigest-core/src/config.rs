use std::{env, fs, path::Path};

use crate::{errors::Error, Result};

/// Which email backend submits the digest, with its credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryConfig {
    /// Postmark's transactional HTTP API.
    Postmark { server_token: String },
    /// Direct SMTP submission.
    Smtp(SmtpConfig),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

/// UTC window of messages to include: `[start_ts, end_ts)` in epoch seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub start_ts: f64,
    pub end_ts: f64,
}

/// Values resolved by the CLI layer (flag or its matching env var).
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub from: Option<String>,
    pub to: Option<String>,
    pub token: Option<String>,
    pub delivery: Option<String>,
    pub start_ts: Option<f64>,
    pub end_ts: Option<f64>,
}

/// Typed configuration for one digest run. Immutable once loaded.
#[derive(Clone, Debug)]
pub struct Config {
    pub token: String,
    pub from: String,
    pub to: String,
    pub delivery: DeliveryConfig,
    pub window: Window,
}

impl Config {
    /// Build the run configuration from CLI-resolved values plus the
    /// backend-specific environment variables.
    ///
    /// The delivery backend is validated here, before any network call, so a
    /// bad `--delivery` value fails the run without touching Slack.
    pub fn load(ov: Overrides) -> Result<Self> {
        let token = require(ov.token, "--token / SLACKEMAILDIGEST_TOKEN")?;
        let from = require(ov.from, "--from / SLACKEMAILDIGEST_FROM")?;
        let to = require(ov.to, "--to / SLACKEMAILDIGEST_TO")?;
        let delivery_raw = require(ov.delivery, "--delivery / SLACKEMAILDIGEST_DELIVERY")?;

        let delivery = match delivery_raw.trim() {
            "postmark" => {
                let server_token = env_str("SLACKEMAILDIGEST_POSTMARK_TOKEN")
                    .and_then(non_empty)
                    .ok_or_else(|| {
                        Error::Config(
                            "SLACKEMAILDIGEST_POSTMARK_TOKEN is required for postmark delivery"
                                .to_string(),
                        )
                    })?;
                DeliveryConfig::Postmark { server_token }
            }
            "smtp" => DeliveryConfig::Smtp(load_smtp_config()?),
            other => {
                return Err(Error::Config(format!(
                    "unknown delivery backend: {other} (expected postmark or smtp)"
                )))
            }
        };

        let window = Window::resolve(ov.start_ts, ov.end_ts)?;

        Ok(Self {
            token,
            from,
            to,
            delivery,
            window,
        })
    }
}

impl Window {
    const DAY_SECS: f64 = 86_400.0;

    /// Defaults to the start of yesterday (UTC), one day long.
    pub fn resolve(start_ts: Option<f64>, end_ts: Option<f64>) -> Result<Self> {
        let start_ts = match start_ts {
            Some(v) => v,
            None => {
                let today = chrono::Utc::now()
                    .date_naive()
                    .and_time(chrono::NaiveTime::MIN)
                    .and_utc();
                today.timestamp() as f64 - Self::DAY_SECS
            }
        };
        let end_ts = end_ts.unwrap_or(start_ts + Self::DAY_SECS);

        if end_ts <= start_ts {
            return Err(Error::Config(format!(
                "empty window: end {end_ts} is not after start {start_ts}"
            )));
        }

        Ok(Self { start_ts, end_ts })
    }
}

fn load_smtp_config() -> Result<SmtpConfig> {
    let host = env_str("SLACKEMAILDIGEST_SMTP_HOST").and_then(non_empty);
    let user = env_str("SLACKEMAILDIGEST_SMTP_USER").and_then(non_empty);
    let password = env_str("SLACKEMAILDIGEST_SMTP_PASSWORD").and_then(non_empty);

    let port = match env_str("SLACKEMAILDIGEST_SMTP_PORT") {
        None => 587,
        Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
            Error::Config(format!("invalid SLACKEMAILDIGEST_SMTP_PORT: {raw}"))
        })?,
    };

    let mut missing = Vec::new();
    if host.is_none() {
        missing.push("SLACKEMAILDIGEST_SMTP_HOST");
    }
    if user.is_none() {
        missing.push("SLACKEMAILDIGEST_SMTP_USER");
    }
    if password.is_none() {
        missing.push("SLACKEMAILDIGEST_SMTP_PASSWORD");
    }

    if let (Some(host), Some(user), Some(password)) = (host, user, password) {
        return Ok(SmtpConfig {
            host,
            port,
            user,
            password,
        });
    }

    Err(Error::Config(format!(
        "smtp delivery needs: {}",
        missing.join(", ")
    )))
}

fn require(v: Option<String>, what: &str) -> Result<String> {
    v.and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{what} is required")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Load a `.env` file if present, without overriding variables that are
/// already set in the environment.
pub fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}
