use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::Quarter;

/// Program configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the school's Home Access Center instance.
    pub school_url: String,
    pub username: String,
    pub password: String,
    /// Student to select in the picker; None for single-student accounts.
    pub student_id: Option<String>,
    /// Quarter the consumer wants narrowed results for.
    pub quarter: String,
    /// Browserless `/function` endpoint.
    pub browserless_url: String,
    /// School year used in the quarter dropdown values when the document
    /// itself does not reveal one.
    pub school_year: u16,
    /// Upper bound of the random login stagger, in seconds. 0 disables it.
    pub stagger_max_secs: f64,
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            school_url: "https://homeaccess.example.org".to_string(),
            username: String::new(),
            password: String::new(),
            student_id: None,
            quarter: "Q2".to_string(),
            browserless_url: "http://homeassistant.local:3000/function".to_string(),
            school_year: 2026,
            stagger_max_secs: 5.0,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            school_url: std::env::var("HAC_SCHOOL_URL").unwrap_or(default.school_url),
            username: std::env::var("HAC_USERNAME").unwrap_or(default.username),
            password: std::env::var("HAC_PASSWORD").unwrap_or(default.password),
            student_id: std::env::var("HAC_STUDENT_ID").ok().or(default.student_id),
            quarter: std::env::var("HAC_QUARTER").unwrap_or(default.quarter),
            browserless_url: std::env::var("BROWSERLESS_URL").unwrap_or(default.browserless_url),
            school_year: std::env::var("HAC_SCHOOL_YEAR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.school_year),
            stagger_max_secs: std::env::var("HAC_STAGGER_MAX_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.stagger_max_secs),
            verbose_logging: std::env::var("VERBOSE_LOGGING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.verbose_logging),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// The configured quarter, defaulting to Q2 when unparsable.
    pub fn quarter(&self) -> Quarter {
        Quarter::parse(&self.quarter).unwrap_or(Quarter::Q2)
    }

    /// School URL without a trailing slash.
    pub fn school_url_trimmed(&self) -> &str {
        self.school_url.trim_end_matches('/')
    }
}
