use std::time::Duration;

use anyhow::{Context, anyhow};
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub frontend_url: String,
    pub room_retention: time::Duration,
    pub reaper_interval: Duration,
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let database_url = lookup("DATABASE_URL").ok_or(anyhow!("DATABASE_URL is not set"))?;
        let port = parse_or(&lookup, "PORT", 5000u16)?;
        let frontend_url = lookup("FRONTEND_URL").unwrap_or("http://localhost:3000".to_owned());
        let retention_days = parse_or(&lookup, "ROOM_RETENTION_DAYS", 30i64)?;
        let reaper_secs = parse_or(&lookup, "REAPER_INTERVAL_SECS", 3600u64)?;

        if reaper_secs == 0 {
            return Err(anyhow!("REAPER_INTERVAL_SECS must be positive"));
        }
        let room_retention = retention_window(retention_days)?;

        Ok(Config {
            database_url,
            port,
            frontend_url,
            room_retention,
            reaper_interval: Duration::from_secs(reaper_secs),
        })
    }
}

/// The cutoff `now - window` must stay representable, or the reaper has nothing to compare with.
fn retention_window(days: i64) -> anyhow::Result<time::Duration> {
    if days <= 0 {
        return Err(anyhow!("ROOM_RETENTION_DAYS must be positive, got {days}"));
    }
    days.checked_mul(86_400)
        .map(time::Duration::seconds)
        .filter(|window| OffsetDateTime::now_utc().checked_sub(*window).is_some())
        .ok_or(anyhow!("ROOM_RETENTION_DAYS={days} is out of range"))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key}={raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_fill_everything_but_the_database() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.port, 5000);
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert_eq!(config.room_retention, time::Duration::days(30));
        assert_eq!(config.reaper_interval, Duration::from_secs(3600));
    }

    #[test]
    fn missing_database_is_an_error() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn bad_numbers_are_reported_not_defaulted() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "x"), ("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        assert!(Config::from_lookup(lookup(&[("DATABASE_URL", "x"), ("REAPER_INTERVAL_SECS", "0")])).is_err());

        for days in ["0", "-1", "10000000", "9223372036854775807"] {
            let err = Config::from_lookup(lookup(&[("DATABASE_URL", "x"), ("ROOM_RETENTION_DAYS", days)]))
                .unwrap_err();
            assert!(err.to_string().contains("ROOM_RETENTION_DAYS"), "{days}: {err}");
        }
    }

    #[test]
    fn overrides_are_honoured() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite://huddle.db"),
            ("PORT", "8080"),
            ("FRONTEND_URL", "https://chat.example"),
            ("ROOM_RETENTION_DAYS", "7"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.frontend_url, "https://chat.example");
        assert_eq!(config.room_retention, time::Duration::days(7));
    }
}
