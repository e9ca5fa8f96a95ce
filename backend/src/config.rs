use anyhow::{anyhow, Context};
use std::env;
use std::str::FromStr;

use crate::coordination::CoordinationSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// Absent means rides are kept in memory only.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub livekit_url: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub intercom_grant_ttl_minutes: i64,
    pub intercom_grant_max_minutes: i64,
    pub location_history_limit: usize,
    pub location_max_future_skew_seconds: i64,
    pub default_checkpoint_radius_m: f64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let config = Config {
            bind_addr: text("BIND_ADDR", "0.0.0.0:3000"),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: text("JWT_SECRET", "your-secret-key-change-this-in-production"),
            livekit_url: text("LIVEKIT_URL", "ws://localhost:7880"),
            livekit_api_key: text("LIVEKIT_API_KEY", ""),
            livekit_api_secret: text("LIVEKIT_API_SECRET", ""),
            intercom_grant_ttl_minutes: parse_or(&lookup, "INTERCOM_GRANT_TTL_MINUTES", 60)?,
            intercom_grant_max_minutes: parse_or(&lookup, "INTERCOM_GRANT_MAX_MINUTES", 240)?,
            location_history_limit: parse_or(&lookup, "LOCATION_HISTORY_LIMIT", 200)?,
            location_max_future_skew_seconds: parse_or(
                &lookup,
                "LOCATION_MAX_FUTURE_SKEW_SECONDS",
                300,
            )?,
            default_checkpoint_radius_m: parse_or(
                &lookup,
                "DEFAULT_CHECKPOINT_RADIUS_METERS",
                100.0,
            )?,
        };

        if config.intercom_grant_ttl_minutes <= 0 || config.intercom_grant_max_minutes <= 0 {
            return Err(anyhow!("Intercom grant lifetimes must be positive"));
        }
        if config.location_max_future_skew_seconds < 0 {
            return Err(anyhow!("LOCATION_MAX_FUTURE_SKEW_SECONDS must not be negative"));
        }
        if !(config.default_checkpoint_radius_m > 0.0) {
            return Err(anyhow!("DEFAULT_CHECKPOINT_RADIUS_METERS must be positive"));
        }
        Ok(config)
    }

    pub fn settings(&self) -> CoordinationSettings {
        CoordinationSettings {
            location_history_limit: self.location_history_limit,
            max_future_skew: chrono::Duration::seconds(self.location_max_future_skew_seconds),
            default_checkpoint_radius_m: self.default_checkpoint_radius_m,
            grant_ttl: chrono::Duration::minutes(self.intercom_grant_ttl_minutes),
            grant_max_ttl: chrono::Duration::minutes(self.intercom_grant_max_minutes),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value: {}", key, raw)),
        _ => Ok(default),
    }
}
