//! Harness configuration
//!
//! Defaults mirror the timeouts the demo site needs in practice: navigation is
//! slow on a cold CDN, and the delayed persona can hold the login button for
//! several seconds. Values can come from a YAML file and are then overridden
//! from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};
use crate::pages::PageKind;

pub const DEFAULT_BASE_URL: &str = "https://www.saucedemo.com/v1/";

/// Browser engine used by the live backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }

    pub fn parse(name: &str) -> HarnessResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" => Ok(BrowserKind::Webkit),
            other => Err(HarnessError::Config(format!("unknown browser `{other}`"))),
        }
    }
}

/// Time bounds, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub navigation_ms: u64,
    pub login_ms: u64,
    pub transition_ms: u64,
    pub poll_interval_ms: u64,
    pub scenario_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            login_ms: 45_000,
            transition_ms: 5_000,
            poll_interval_ms: 100,
            scenario_ms: 60_000,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn login(&self) -> Duration {
        Duration::from_millis(self.login_ms)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn scenario(&self) -> Duration {
        Duration::from_millis(self.scenario_ms)
    }
}

/// Top-level configuration shared by every page object in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Root of the site under test; page paths are joined onto it
    pub base_url: String,
    pub browser: BrowserKind,
    pub timeouts: Timeouts,
    /// Minimum login latency expected from the delayed persona
    pub login_delay_threshold_ms: u64,
    /// Retry a failed click once with `force` before giving up
    pub force_click_fallback: bool,
    /// Where failure screenshots go; none are taken when unset
    pub artifacts_dir: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            browser: BrowserKind::default(),
            timeouts: Timeouts::default(),
            login_delay_threshold_ms: 1_000,
            force_click_fallback: true,
            artifacts_dir: None,
        }
    }
}

impl HarnessConfig {
    /// Load from a YAML file; missing keys keep their defaults
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus process environment overrides
    pub fn from_env() -> HarnessResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `SAUCE_BASE_URL`, `BROWSER` and `SAUCE_ARTIFACTS_DIR`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> HarnessResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SAUCE_BASE_URL") {
            self.base_url = url;
        }
        if let Some(browser) = lookup("BROWSER") {
            self.browser = BrowserKind::parse(&browser)?;
        }
        if let Some(dir) = lookup("SAUCE_ARTIFACTS_DIR") {
            self.artifacts_dir = Some(PathBuf::from(dir));
        }
        self.validate()
    }

    fn validate(&self) -> HarnessResult<()> {
        if !self.base_url.starts_with("http://")
            && !self.base_url.starts_with("https://")
            && !self.base_url.starts_with("sim://")
        {
            return Err(HarnessError::Config(format!(
                "base_url must be an http(s) or sim:// address, got `{}`",
                self.base_url
            )));
        }
        if self.timeouts.poll_interval_ms == 0 {
            return Err(HarnessError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Canonical address of a logical page
    pub fn url_for(&self, page: PageKind) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), page.path())
    }

    pub fn login_delay_threshold(&self) -> Duration {
        Duration::from_millis(self.login_delay_threshold_ms)
    }
}
