//! Runtime settings: optional TOML/YAML/JSON file overlaid by `LEADS_SCOUT__*`
//! environment variables.
//!
//! Defaults reproduce the timings and selectors the tool has always used, so
//! an absent file is a valid configuration.
use crate::error::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "leads-scout.toml";
const ENV_PREFIX: &str = "LEADS_SCOUT";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub base_url: String,
    pub browser: BrowserConfig,
    pub delays: DelayConfig,
    pub selectors: SelectorConfig,
    pub challenge: ChallengeConfig,
    pub output: OutputConfig,
}

impl ScoutConfig {
    /// Settings for re-running over captured pages: no pauses, and nobody
    /// to solve a security check on a static page.
    pub fn for_replay(mut self) -> Self {
        self.delays = DelayConfig::instant();
        self.challenge.wait_for_solve = false;
        self
    }
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.zillow.com".to_string(),
            browser: BrowserConfig::default(),
            delays: DelayConfig::default(),
            selectors: SelectorConfig::default(),
            challenge: ChallengeConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    /// Chrome binary to launch instead of the auto-detected one
    pub chrome_path: Option<PathBuf>,
    /// Refuse to run against a browser whose major version differs
    pub expected_major_version: Option<u32>,
    pub args: Vec<String>,
    pub stealth: bool,
    pub idle_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            expected_major_version: None,
            args: vec![
                "--start-maximized".to_string(),
                "--disable-popup-blocking".to_string(),
            ],
            stealth: true,
            idle_timeout_secs: 600,
        }
    }
}

/// Inclusive range of milliseconds a randomized pause is drawn from.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    pub const ZERO: DelayRange = DelayRange::fixed(0);
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub after_navigation: DelayRange,
    pub after_scroll: DelayRange,
    pub after_page_turn: DelayRange,
    pub challenge_poll_ms: u64,
}

impl DelayConfig {
    pub fn challenge_poll(&self) -> Duration {
        Duration::from_millis(self.challenge_poll_ms)
    }

    /// No pauses at all; replay and tests have nobody to fool.
    pub fn instant() -> Self {
        Self {
            after_navigation: DelayRange::ZERO,
            after_scroll: DelayRange::ZERO,
            after_page_turn: DelayRange::ZERO,
            challenge_poll_ms: 0,
        }
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            after_navigation: DelayRange::new(4_000, 7_000),
            after_scroll: DelayRange::fixed(3_000),
            after_page_turn: DelayRange::new(5_000, 8_000),
            challenge_poll_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub card: String,
    pub price: String,
    pub price_fallback_tag: String,
    pub price_fallback_text: String,
    pub address: String,
    pub link: String,
    pub link_attribute: String,
    pub next_page: String,
    pub lazy_load_key: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            card: "article".to_string(),
            price: "[data-test='property-card-price']".to_string(),
            price_fallback_tag: "span".to_string(),
            price_fallback_text: "$".to_string(),
            address: "address".to_string(),
            link: "[data-test='property-card-link']".to_string(),
            link_attribute: "href".to_string(),
            next_page: "[title='Next page']".to_string(),
            lazy_load_key: "End".to_string(),
        }
    }
}

/// Phrases identifying a human-verification interstitial. Matched
/// case-insensitively.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChallengeConfig {
    pub title_phrases: Vec<String>,
    pub body_phrases: Vec<String>,
    /// Poll until someone solves the check; when off, a detected check ends
    /// the run
    pub wait_for_solve: bool,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            title_phrases: vec!["security check".to_string()],
            body_phrases: vec![
                "press and hold".to_string(),
                "verify you are human".to_string(),
            ],
            wait_for_solve: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Xlsx,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where result files go; desktop, then the working directory, when unset
    pub directory: Option<PathBuf>,
    pub format: OutputFormat,
    /// Save every visited results page here as `page_NNN.html`
    pub capture_dir: Option<PathBuf>,
}

/// Builder over the `config` crate wiring (file + env overrides).
pub struct ScoutConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ScoutConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoutConfigLoader {
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a config file; format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P, required: bool) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(required));
        self
    }

    #[cfg(test)]
    pub fn with_toml_str(mut self, toml: &str) -> Self {
        let source = File::from_str(toml, config::FileFormat::Toml);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Environment overrides are applied last so they win over any file.
    pub fn load(self) -> Result<ScoutConfig> {
        let config = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize::<ScoutConfig>()?)
    }
}
