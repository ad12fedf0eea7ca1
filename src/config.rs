use std::env;
use std::path::PathBuf;

use crate::date_utils::WeekStart;
use crate::store::DEFAULT_QUEUE_CAPACITY;

/// Settings for the remote "hours from gross pay" calculator.
#[derive(Debug, Clone)]
pub struct CalculatorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ai.gateway.lovable.dev/v1".into(),
            api_key: None,
            model: "google/gemini-2.5-flash".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub migrations_path: PathBuf,
    pub week_start: WeekStart,
    /// Changes a live view may have queued before it falls back to a full read.
    pub feed_capacity: usize,
    pub calculator: CalculatorConfig,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let week_start = match env::var("PAYLOG_WEEK_START") {
            Ok(value) => value.parse::<WeekStart>().unwrap_or_else(|_| {
                panic!(
                    "Invalid PAYLOG_WEEK_START: expected a weekday name such as 'sunday' or \
                     'mon'. Got: {}",
                    value
                )
            }),
            Err(_) => WeekStart::default(),
        };

        let defaults = CalculatorConfig::default();
        let calculator = CalculatorConfig {
            base_url: env::var("PAYLOG_CALCULATOR_URL").unwrap_or(defaults.base_url),
            api_key: env::var("PAYLOG_CALCULATOR_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            model: env::var("PAYLOG_CALCULATOR_MODEL").unwrap_or(defaults.model),
        };

        Self {
            host: env::var("PAYLOG_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PAYLOG_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(7070),
            database_path: env::var("PAYLOG_DATABASE_URL")
                .map(|v| {
                    PathBuf::from(
                        v.strip_prefix("sqlite://")
                            .or_else(|| v.strip_prefix("sqlite:"))
                            .unwrap_or(&v),
                    )
                })
                .unwrap_or_else(|_| PathBuf::from("data/paylog.db")),
            migrations_path: env::var("PAYLOG_MIGRATIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("migrations")),
            week_start,
            feed_capacity: env::var("PAYLOG_FEED_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            calculator,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
