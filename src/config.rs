use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database: DatabaseConfig,
    pub sweep: SweepConfig,
    pub mailer: MailerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailerConfig {
    /// Email relay endpoint; emails are only logged when unset.
    pub webhook_url: Option<String>,
    pub webhook_secret: String,
    pub from_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Config {
            port: parse_or(&lookup, "PORT", 8080)?,

            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or_else(|| "mem://".to_string()),
                namespace: lookup("DATABASE_NAMESPACE").unwrap_or_else(|| "marketplace".to_string()),
                database: lookup("DATABASE_NAME").unwrap_or_else(|| "main".to_string()),
                username: lookup("DATABASE_USER"),
                password: lookup("DATABASE_PASS"),
            },

            sweep: SweepConfig {
                enabled: parse_or(&lookup, "SWEEP_ENABLED", true)?,
                interval_secs: parse_or(&lookup, "SWEEP_INTERVAL_SECS", 3600)?,
            },

            mailer: MailerConfig {
                webhook_url: lookup("MAIL_WEBHOOK_URL").filter(|url| !url.trim().is_empty()),
                webhook_secret: lookup("MAIL_WEBHOOK_SECRET").unwrap_or_default(),
                from_address: lookup("MAIL_FROM")
                    .unwrap_or_else(|| "no-reply@marketplace.local".to_string()),
            },
        };

        if config.sweep.interval_secs == 0 {
            return Err(anyhow!("SWEEP_INTERVAL_SECS must be greater than 0"));
        }
        if config.mailer.webhook_url.is_some() && config.mailer.webhook_secret.is_empty() {
            return Err(anyhow!("MAIL_WEBHOOK_SECRET is required when MAIL_WEBHOOK_URL is set"));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {} value {:?}: {}", key, raw, e)),
        None => {
            log::debug!("{} not set, using default", key);
            Ok(default)
        }
    }
}
