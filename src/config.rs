use std::env;
use std::str::FromStr;

use crate::error::{Result, StatsError};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:bot_data.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_TIMELINE_DAYS: i64 = 7;
pub const MAX_TIMELINE_DAYS: i64 = 3650;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub timeline_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            timeline_days: DEFAULT_TIMELINE_DAYS,
        }
    }
}

impl Config {
    /// Reads settings from the process environment. Call `dotenvy::dotenv()`
    /// first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_connections = parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;
        if max_connections == 0 {
            return Err(StatsError::Config("DATABASE_MAX_CONNECTIONS must be at least 1".to_string()));
        }

        let timeline_days = parse_var(&lookup, "CLICK_TIMELINE_DAYS", defaults.timeline_days)?;
        if !(0..=MAX_TIMELINE_DAYS).contains(&timeline_days) {
            return Err(StatsError::Config(format!(
                "CLICK_TIMELINE_DAYS must be between 0 and {}",
                MAX_TIMELINE_DAYS
            )));
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections,
            timeline_days,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| StatsError::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}
