use crate::core::matcher::MatchSettings;
use crate::core::report::ReportFormat;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{MatcherError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_required_field, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const YNAB_BASE_URL: &str = "https://api.ynab.com/v1";
pub const PAYPAL_LIVE_BASE_URL: &str = "https://api-m.paypal.com";
pub const PAYPAL_SANDBOX_BASE_URL: &str = "https://api-m.sandbox.paypal.com";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default)]
    pub ynab: YnabConfig,
    #[serde(default)]
    pub paypal: PayPalConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YnabConfig {
    pub api_token: Option<String>,
    pub budget_id: Option<String>,
    #[serde(default = "default_ynab_base_url")]
    pub base_url: String,
    /// Payee/memo fragments that mark a ledger entry as a PayPal payment.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorSourceKind {
    #[default]
    Csv,
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalConfig {
    #[serde(default)]
    pub source: ProcessorSourceKind,
    #[serde(default = "default_csv_path")]
    pub csv_path: String,
    /// strftime pattern tried before auto-detection; `auto` disables it.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Overrides the URL implied by `mode`.
    pub base_url: Option<String>,
    #[serde(default = "default_true")]
    pub outgoing_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_date_tolerance_days")]
    pub date_tolerance_days: i64,
    #[serde(default = "default_amount_tolerance_percent")]
    pub amount_tolerance_percent: f64,
    #[serde(default = "default_home_currency")]
    pub home_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<ReportFormat>,
    /// Bundle the rendered files into `matches.zip` instead of loose files.
    #[serde(default)]
    pub archive: bool,
    #[serde(default = "default_true")]
    pub show_unmatched: bool,
}

fn default_ynab_base_url() -> String {
    YNAB_BASE_URL.to_string()
}

fn default_keywords() -> Vec<String> {
    vec!["PayPal".to_string(), "PAYPAL".to_string(), "Pp *".to_string()]
}

fn default_csv_path() -> String {
    "paypal_transactions.csv".to_string()
}

fn default_date_format() -> String {
    "auto".to_string()
}

fn default_mode() -> String {
    "live".to_string()
}

fn default_true() -> bool {
    true
}

fn default_date_tolerance_days() -> i64 {
    7
}

fn default_amount_tolerance_percent() -> f64 {
    3.0
}

fn default_home_currency() -> String {
    "GBP".to_string()
}

fn default_output_path() -> String {
    "./output".to_string()
}

fn default_formats() -> Vec<ReportFormat> {
    vec![ReportFormat::Txt]
}

impl Default for YnabConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            budget_id: None,
            base_url: default_ynab_base_url(),
            keywords: default_keywords(),
        }
    }
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            source: ProcessorSourceKind::default(),
            csv_path: default_csv_path(),
            date_format: default_date_format(),
            client_id: None,
            client_secret: None,
            mode: default_mode(),
            base_url: None,
            outgoing_only: true,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            date_tolerance_days: default_date_tolerance_days(),
            amount_tolerance_percent: default_amount_tolerance_percent(),
            home_currency: default_home_currency(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            formats: default_formats(),
            archive: false,
            show_unmatched: true,
        }
    }
}

impl MatcherConfig {
    /// Reads `path` when it exists, otherwise falls back to environment variables.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!("Loading configuration from {}", path.display());
            Self::from_file(path)
        } else {
            tracing::warn!(
                "{} not found, using environment variables and defaults",
                path.display()
            );
            Self::from_env()
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MatcherError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| MatcherError::config(format!("invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Same settings from the flat environment variables the tool has always read.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        config.ynab.api_token = env_opt("YNAB_API_TOKEN");
        config.ynab.budget_id = env_opt("YNAB_BUDGET_ID");
        if let Some(keywords) = env_opt("PAYPAL_KEYWORDS") {
            config.ynab.keywords = keywords
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }

        config.paypal.client_id = env_opt("PAYPAL_CLIENT_ID");
        config.paypal.client_secret = env_opt("PAYPAL_CLIENT_SECRET");
        if let Some(mode) = env_opt("PAYPAL_MODE") {
            config.paypal.mode = mode;
        }
        if let Some(path) = env_opt("PAYPAL_CSV_PATH") {
            config.paypal.csv_path = path;
        }
        if let Some(format) = env_opt("PAYPAL_DATE_FORMAT") {
            config.paypal.date_format = format;
        }

        if let Some(days) = env_opt("DATE_TOLERANCE_DAYS") {
            config.matching.date_tolerance_days = parse_env("DATE_TOLERANCE_DAYS", &days)?;
        }
        if let Some(pct) = env_opt("AMOUNT_TOLERANCE_PERCENT") {
            config.matching.amount_tolerance_percent =
                parse_env("AMOUNT_TOLERANCE_PERCENT", &pct)?;
        }
        if let Some(currency) = env_opt("HOME_CURRENCY") {
            config.matching.home_currency = currency;
        }

        Ok(config)
    }

    pub fn validate_config(&self) -> Result<()> {
        self.match_settings().validate()?;

        validate_url("ynab.base_url", &self.ynab.base_url)?;
        if self.ynab.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(MatcherError::InvalidConfigValueError {
                field: "ynab.keywords".to_string(),
                value: String::new(),
                reason: "At least one keyword is required".to_string(),
            });
        }

        match self.paypal.source {
            ProcessorSourceKind::Csv => validate_path("paypal.csv_path", &self.paypal.csv_path)?,
            ProcessorSourceKind::Api => {
                self.paypal_credentials()?;
                validate_url("paypal.base_url", &self.paypal_base_url())?;
            }
        }

        validate_path("output.path", &self.output.path)?;
        Ok(())
    }

    pub fn ynab_credentials(&self) -> Result<(&str, &str)> {
        let token = validate_required_field("ynab.api_token", &self.ynab.api_token)?;
        let budget = validate_required_field("ynab.budget_id", &self.ynab.budget_id)?;
        validate_non_empty_string("ynab.api_token", token)?;
        validate_non_empty_string("ynab.budget_id", budget)?;
        Ok((token, budget))
    }

    pub fn paypal_credentials(&self) -> Result<(&str, &str)> {
        let id = validate_required_field("paypal.client_id", &self.paypal.client_id)?;
        let secret = validate_required_field("paypal.client_secret", &self.paypal.client_secret)?;
        validate_non_empty_string("paypal.client_id", id)?;
        validate_non_empty_string("paypal.client_secret", secret)?;
        Ok((id, secret))
    }

    pub fn has_paypal_api_credentials(&self) -> bool {
        self.paypal_credentials().is_ok()
    }

    pub fn paypal_base_url(&self) -> String {
        match &self.paypal.base_url {
            Some(url) => url.clone(),
            None if self.paypal.mode.eq_ignore_ascii_case("sandbox") => {
                PAYPAL_SANDBOX_BASE_URL.to_string()
            }
            None => PAYPAL_LIVE_BASE_URL.to_string(),
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| MatcherError::InvalidConfigValueError {
            field: name.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

impl ConfigProvider for MatcherConfig {
    fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            date_tolerance_days: self.matching.date_tolerance_days,
            amount_tolerance_pct: self.matching.amount_tolerance_percent,
            home_currency: self.matching.home_currency.trim().to_ascii_uppercase(),
        }
    }

    fn ledger_keywords(&self) -> &[String] {
        &self.ynab.keywords
    }

    fn processor_date_format(&self) -> Option<&str> {
        Some(self.paypal.date_format.as_str())
    }

    fn outgoing_only(&self) -> bool {
        self.paypal.outgoing_only
    }
}

impl Validate for MatcherConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
