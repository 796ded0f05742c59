use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::batch::FailurePolicy;
use crate::error::ConfigError;
use crate::indicator::rsi::RsiMethod;
use crate::model::Lookback;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_base_url() -> String {
    "https://query2.finance.yahoo.com".into()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_sma_short() -> usize {
    20
}

fn default_sma_long() -> usize {
    50
}

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_display_format() -> String {
    "text".into()
}

fn default_precision() -> usize {
    2
}

fn default_report_path() -> PathBuf {
    PathBuf::from("index.html")
}

const MAX_PRECISION: usize = 8;
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];
const VALID_DISPLAY_FORMATS: &[&str] = &["text", "json", "html"];

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub indicators: IndicatorSettings,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub range: Lookback,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            range: Lookback::default(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorSettings {
    #[serde(default = "default_sma_short")]
    pub sma_short: usize,
    #[serde(default = "default_sma_long")]
    pub sma_long: usize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default)]
    pub rsi_method: RsiMethod,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            sma_short: default_sma_short(),
            sma_long: default_sma_long(),
            rsi_period: default_rsi_period(),
            rsi_method: RsiMethod::default(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Deserialize)]
pub struct DisplayConfig {
    /// Accepted values: `"text"` | `"json"` | `"html"`
    #[serde(default = "default_display_format")]
    pub format: String,
    #[serde(default = "default_precision")]
    pub precision: usize,
    /// Where the `html` format writes its report.
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            format: default_display_format(),
            precision: default_precision(),
            report_path: default_report_path(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
///
/// A missing file is only an error when `required` is set; otherwise the
/// built-in defaults are used.
pub fn load(path: &Path, required: bool) -> Result<AppConfig, Report<ConfigError>> {
    if !required && !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config = parse(&content)?;
    validate(&config)?;

    Ok(config)
}

fn parse(content: &str) -> Result<AppConfig, Report<ConfigError>> {
    toml::from_str(content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })
}

pub fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_formats(config)?;
    validate_source(&config.source)?;
    validate_indicators(&config.indicators)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_formats(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            config.general.log_format
        )));
    }
    if !VALID_DISPLAY_FORMATS.contains(&config.display.format.as_str()) {
        return Err(invalid(format!(
            "display.format \"{}\" is not valid",
            config.display.format
        )));
    }
    if config.display.format == "html" && config.display.report_path.as_os_str().is_empty() {
        return Err(invalid("display.report_path must not be empty".into()));
    }
    if config.display.precision > MAX_PRECISION {
        return Err(invalid(format!(
            "display.precision must be <= {MAX_PRECISION}"
        )));
    }
    Ok(())
}

fn validate_source(source: &SourceConfig) -> Result<(), Report<ConfigError>> {
    if source.requests_per_second == 0 {
        return Err(invalid("source.requests_per_second must be > 0".into()));
    }
    if source.timeout_secs == 0 {
        return Err(invalid("source.timeout_secs must be > 0".into()));
    }
    if !source.base_url.starts_with("http://") && !source.base_url.starts_with("https://") {
        return Err(invalid(format!(
            "source.base_url \"{}\" must be an http(s) URL",
            source.base_url
        )));
    }
    Ok(())
}

fn validate_indicators(settings: &IndicatorSettings) -> Result<(), Report<ConfigError>> {
    let periods = [
        ("sma_short", settings.sma_short),
        ("sma_long", settings.sma_long),
        ("rsi_period", settings.rsi_period),
        ("macd_fast", settings.macd_fast),
        ("macd_slow", settings.macd_slow),
        ("macd_signal", settings.macd_signal),
    ];
    if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
        return Err(invalid(format!("indicators.{name} must be > 0")));
    }
    if settings.sma_short >= settings.sma_long {
        return Err(invalid(
            "indicators.sma_short must be < indicators.sma_long".into(),
        ));
    }
    if settings.macd_fast >= settings.macd_slow {
        return Err(invalid(
            "indicators.macd_fast must be < indicators.macd_slow".into(),
        ));
    }
    Ok(())
}
