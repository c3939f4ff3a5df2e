//! Runtime settings read from the YAML settings file.
//!
//! ```yaml
//! scheduling:
//!   enabled: true
//!   interval_hours: 2
//!   pull_limit: 20
//! feeds:
//!   - name: reuters-tech
//!     url: https://example.com/rss
//!     category: tech
//! analysis:
//!   topics: [semiconductors, export controls]
//! ```
//!
//! Every section is optional; missing keys fall back to defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::run::TriggerKind;

pub const DEFAULT_INTERVAL_HOURS: f64 = 2.0;
pub const DEFAULT_SCHEDULED_PULL_LIMIT: usize = 20;
pub const DEFAULT_MANUAL_PULL_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub scheduling: ScheduleConfig,
    pub feeds: Vec<FeedSource>,
    pub analysis: AnalysisSettings,
}

impl AppSettings {
    /// Parse and validate settings text. Blank text yields defaults.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Option<AppSettings> = serde_yaml::from_str(raw)?;
        let settings = settings.unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduling.validate()?;
        for (i, feed) in self.feeds.iter().enumerate() {
            feed.validate()
                .map_err(|e| ConfigError::Invalid(format!("feeds[{i}]: {e}")))?;
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// The `scheduling` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub interval_hours: f64,
    /// Items per run. `None` means the per-trigger default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_limit: Option<usize>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: DEFAULT_INTERVAL_HOURS,
            pull_limit: None,
        }
    }
}

impl ScheduleConfig {
    pub fn enabled_every(interval_hours: f64) -> Self {
        Self {
            enabled: true,
            interval_hours,
            pull_limit: None,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_pull_limit(mut self, limit: usize) -> Self {
        self.pull_limit = Some(limit);
        self
    }

    /// The interval only has to be usable when the schedule is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled {
            self.interval()?;
        }
        Ok(())
    }

    pub fn interval(&self) -> Result<Duration, ConfigError> {
        let hours = self.interval_hours;
        if !hours.is_finite() || hours <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "scheduling.interval_hours must be a positive number, got {hours}"
            )));
        }
        Duration::try_from_secs_f64(hours * 3600.0)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                ConfigError::Invalid(format!("scheduling.interval_hours out of range: {hours}"))
            })
    }

    pub fn pull_limit_for(&self, trigger: TriggerKind) -> usize {
        self.pull_limit.unwrap_or(match trigger {
            TriggerKind::Scheduled => DEFAULT_SCHEDULED_PULL_LIMIT,
            TriggerKind::Manual => DEFAULT_MANUAL_PULL_LIMIT,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub category: String,
}

impl FeedSource {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is empty".into());
        }
        let url = self.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("url '{}' is not http(s)", self.url));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Topics the analyzer scores relevance against.
    pub topics: Vec<String>,
}
