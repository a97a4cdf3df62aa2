use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str, default: T) -> Result<T, ConfigError> {
    match profiled_env_opt(profile, key) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: v,
        }),
        None => Ok(default),
    }
}

/// `true`/`false`/`1`/`0`, any case.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn profiled_env_flag(profile: &str, key: &str, default: bool) -> Result<bool, ConfigError> {
    match profiled_env_opt(profile, key) {
        Some(v) => parse_flag(&v).ok_or_else(|| ConfigError::Invalid {
            key: key.to_string(),
            value: v,
        }),
        None => Ok(default),
    }
}

// ── Strategy selectors ────────────────────────────────────────

/// Which matching predicate the pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// City, state and material must all be equal.
    StrictCohort,
    /// Tender must be dated today; user state must appear in the tender location.
    DateGated,
}

impl FromStr for MatchPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict-cohort" | "strict" => Ok(Self::StrictCohort),
            "date-gated" | "date" => Ok(Self::DateGated),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StrictCohort => f.write_str("strict-cohort"),
            Self::DateGated => f.write_str("date-gated"),
        }
    }
}

/// Second path segment of a tender link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkSegment {
    /// The user's sheet row index.
    RowIndex,
    /// The user's secondary id column (row index when the cell is absent).
    SecondaryId,
}

impl FromStr for LinkSegment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "row-index" | "index" => Ok(Self::RowIndex),
            "secondary-id" | "id" => Ok(Self::SecondaryId),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LinkSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowIndex => f.write_str("row-index"),
            Self::SecondaryId => f.write_str("secondary-id"),
        }
    }
}

/// How notification payloads are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderStrategy {
    /// One human-readable message body.
    FreeText,
    /// Ordered placeholder values for a provider-side template.
    Placeholders,
}

impl FromStr for RenderStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free-text" | "text" => Ok(Self::FreeText),
            "placeholders" | "template" => Ok(Self::Placeholders),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RenderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreeText => f.write_str("free-text"),
            Self::Placeholders => f.write_str("placeholders"),
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub sheets: SheetsConfig,
    pub google: GoogleConfig,
    pub matching: MatchingConfig,
    pub infobip: InfobipConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TENDER_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = env_or("TENDER_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, ConfigError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Ok(Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p)?,
            sheets: SheetsConfig::from_env_profiled(p),
            google: GoogleConfig::from_env_profiled(p),
            matching: MatchingConfig::from_env_profiled(p)?,
            infobip: InfobipConfig::from_env_profiled(p)?,
        })
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:    {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  sheets:    tenders={} ({}), users={} ({})",
            self.sheets.tender_sheet_id.as_deref().unwrap_or("(none)"),
            self.sheets.tender_range,
            self.sheets.users_sheet_id.as_deref().unwrap_or("(none)"),
            self.sheets.users_range,
        );
        tracing::info!(
            "  matching:  policy={}, link={}/<tender>/<{}>",
            self.matching.policy,
            self.matching.link_base_url,
            self.matching.link_segment,
        );
        tracing::info!(
            "  infobip:   url={}, render={}, dry_run={}, key_configured={}",
            self.infobip.base_url.as_deref().unwrap_or("(none)"),
            self.infobip.render_strategy,
            self.infobip.dry_run,
            self.infobip.api_key.is_some(),
        );
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "matching": {
                "policy": self.matching.policy,
                "link_segment": self.matching.link_segment,
            },
            "infobip": {
                "render_strategy": self.infobip.render_strategy,
                "dry_run": self.infobip.dry_run,
                "configured": self.infobip.is_configured(),
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_parse(p, "PORT", 5050)?,
        })
    }
}

// ── Spreadsheets ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    pub tender_sheet_id: Option<String>,
    pub tender_range: String,
    pub users_sheet_id: Option<String>,
    pub users_range: String,
    pub api_base_url: String,
}

impl SheetsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            tender_sheet_id: profiled_env_opt(p, "TENDER_SHEET_ID"),
            tender_range: profiled_env_or(p, "TENDER_RANGE", "Tender"),
            users_sheet_id: profiled_env_opt(p, "USERS_SHEET_ID"),
            users_range: profiled_env_or(p, "USERS_RANGE", "User"),
            api_base_url: profiled_env_or(p, "SHEETS_API_BASE_URL", "https://sheets.googleapis.com"),
        }
    }
}

// ── Google OAuth ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
}

impl GoogleConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            credentials_path: PathBuf::from(profiled_env_or(p, "GOOGLE_CREDENTIALS_PATH", "credentials.json")),
            token_path: PathBuf::from(profiled_env_or(p, "GOOGLE_TOKEN_PATH", "token.json")),
        }
    }
}

// ── Matching ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub policy: MatchPolicy,
    pub link_base_url: String,
    pub link_segment: LinkSegment,
}

impl MatchingConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            policy: profiled_env_parse(p, "MATCH_POLICY", MatchPolicy::StrictCohort)?,
            link_base_url: profiled_env_or(p, "LINK_BASE_URL", "https://prcommerce-campaign.com"),
            link_segment: profiled_env_parse(p, "LINK_SEGMENT", LinkSegment::RowIndex)?,
        })
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::StrictCohort,
            link_base_url: "https://prcommerce-campaign.com".to_string(),
            link_segment: LinkSegment::RowIndex,
        }
    }
}

// ── Infobip (WhatsApp transport) ──────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfobipConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub sender: Option<String>,
    pub render_strategy: RenderStrategy,
    pub message_template_path: Option<PathBuf>,
    pub template_name: String,
    pub template_language: String,
    pub notify_url: String,
    pub callback_data: String,
    pub dry_run: bool,
}

impl InfobipConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: profiled_env_opt(p, "INFOBIP_BASE_URL"),
            api_key: profiled_env_opt(p, "INFOBIP_API_KEY"),
            sender: profiled_env_opt(p, "INFOBIP_REGISTERED_PHONE"),
            render_strategy: profiled_env_parse(p, "RENDER_STRATEGY", RenderStrategy::FreeText)?,
            message_template_path: profiled_env_opt(p, "MESSAGE_TEMPLATE_PATH").map(PathBuf::from),
            template_name: profiled_env_or(p, "INFOBIP_TEMPLATE_NAME", "tender_alert"),
            template_language: profiled_env_or(p, "INFOBIP_TEMPLATE_LANGUAGE", "en"),
            notify_url: profiled_env_or(p, "INFOBIP_NOTIFY_URL", "https://www.example.com/whatsapp"),
            callback_data: profiled_env_or(p, "INFOBIP_CALLBACK_DATA", "Callback data"),
            dry_run: profiled_env_flag(p, "DRY_RUN", false)?,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some() && self.sender.is_some()
    }
}
