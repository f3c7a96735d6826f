//! Tracker configuration: documented defaults with partial overrides.
//!
//! Callers supply any subset of keys (camelCase JSON or TOML); everything else
//! falls back to [`TrackerConfig::default`]. Caller-supplied connector
//! callables cannot be expressed in a file and are attached with
//! [`TrackerConfig::with_connector`].

use std::path::Path;

use serde::Deserialize;

use crate::connectors::ConnectorSpec;
use crate::error::{FootprintError, Result};

/// Key of the identity record in the durable store.
pub const STORAGE_KEY: &str = "userActivity";

pub const DEFAULT_USER_ID_TTL_MS: u64 = 13 * 30 * 24 * 60 * 60 * 1000; // 13 months
pub const DEFAULT_VISIT_ID_TTL_MS: u64 = 30 * 60 * 1000; // 30 minutes
pub const DEFAULT_ENGAGEMENT_DELAY_MS: u64 = 10_000;
pub const DEFAULT_VITALS_SUMMARY_DELAY_MS: u64 = 10_000;
pub const DEFAULT_COOKIE_NAME: &str = "uv_ids";

/// Payment and 3-D Secure redirect hosts that should not count as referrers.
pub const DEFAULT_EXCLUSION_LIST: &[&str] = &[
    "paypal.com",
    "3dsecure",
    "wlp-acs",
    "-3ds-",
    ".3ds.",
    "visa.com",
];

pub const DEFAULT_SOURCE_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_id",
    "utm_term",
    "utm_content",
];

/// Ad-platform click identifiers captured when auto-tagging is enabled.
pub const AUTO_TAG_PARAMS: &[&str] = &["gclid", "fbclid", "msclkid", "ttclid"];

pub const DEFAULT_SCROLL_THRESHOLDS: &[u8] = &[25, 50, 75, 100];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    pub user_id_expiration_time: u64,
    pub visit_id_expiration_time: u64,
    pub exclusion_list: Vec<String>,
    pub cookie_name: String,
    pub visit_engagement_delay: u64,
    pub source_params: Vec<String>,
    pub track_spa_navigation: bool,
    pub scroll_thresholds: Vec<u8>,
    pub track_errors: bool,
    pub detect_ad_block: bool,
    pub auto_tagging: bool,
    pub vitals_summary_delay: u64,
    pub connectors: Vec<ConnectorSpec>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            user_id_expiration_time: DEFAULT_USER_ID_TTL_MS,
            visit_id_expiration_time: DEFAULT_VISIT_ID_TTL_MS,
            exclusion_list: to_strings(DEFAULT_EXCLUSION_LIST),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            visit_engagement_delay: DEFAULT_ENGAGEMENT_DELAY_MS,
            source_params: to_strings(DEFAULT_SOURCE_PARAMS),
            track_spa_navigation: false,
            scroll_thresholds: DEFAULT_SCROLL_THRESHOLDS.to_vec(),
            track_errors: false,
            detect_ad_block: false,
            auto_tagging: false,
            vitals_summary_delay: DEFAULT_VITALS_SUMMARY_DELAY_MS,
            connectors: vec![ConnectorSpec::built_in("dataLayer")],
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl TrackerConfig {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| FootprintError::ConfigMalformed {
                details: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| FootprintError::ConfigMalformed {
                details: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file; `.toml` files parse as TOML, anything else as JSON.
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs_err::read_to_string(path).map_err(|source| FootprintError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Appends a connector after those already configured.
    pub fn with_connector(mut self, connector: ConnectorSpec) -> Self {
        self.connectors.push(connector);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("userIdExpirationTime", self.user_id_expiration_time),
            ("visitIdExpirationTime", self.visit_id_expiration_time),
            ("visitEngagementDelay", self.visit_engagement_delay),
            ("vitalsSummaryDelay", self.vitals_summary_delay),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        if self.cookie_name.trim().is_empty() {
            return Err(invalid("cookieName", "must not be empty"));
        }
        if self
            .cookie_name
            .chars()
            .any(|c| matches!(c, ';' | '=' | ',' | ' ') || c.is_control())
        {
            return Err(invalid("cookieName", "contains a reserved cookie character"));
        }

        if let Some(bad) = self
            .scroll_thresholds
            .iter()
            .find(|t| **t == 0 || **t > 100)
        {
            return Err(invalid(
                "scrollThresholds",
                &format!("{} is outside 1..=100", bad),
            ));
        }

        Ok(())
    }

    /// Query parameters that make up the attribution whitelist, in order.
    pub fn attribution_params(&self) -> Vec<&str> {
        let mut params: Vec<&str> = self.source_params.iter().map(String::as_str).collect();
        if self.auto_tagging {
            for param in AUTO_TAG_PARAMS {
                if !params.contains(param) {
                    params.push(param);
                }
            }
        }
        params
    }

    pub fn user_ttl_ms(&self) -> i64 {
        clamp_ms(self.user_id_expiration_time)
    }

    pub fn visit_ttl_ms(&self) -> i64 {
        clamp_ms(self.visit_id_expiration_time)
    }

    pub fn engagement_delay_ms(&self) -> i64 {
        clamp_ms(self.visit_engagement_delay)
    }

    pub fn vitals_delay_ms(&self) -> i64 {
        clamp_ms(self.vitals_summary_delay)
    }
}

fn clamp_ms(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn invalid(field: &str, reason: &str) -> FootprintError {
    FootprintError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.user_id_expiration_time, 33_696_000_000);
        assert_eq!(config.visit_id_expiration_time, 1_800_000);
        assert_eq!(config.cookie_name, "uv_ids");
        assert_eq!(config.source_params.len(), 6);
        assert_eq!(config.connectors.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_merges_over_defaults() {
        let config = TrackerConfig::from_json_str(
            r#"{"cookieName": "ids", "sourceParams": ["utm_source"], "trackErrors": true}"#,
        )
        .unwrap();
        assert_eq!(config.cookie_name, "ids");
        assert_eq!(config.source_params, vec!["utm_source".to_string()]);
        assert!(config.track_errors);
        assert_eq!(config.visit_engagement_delay, DEFAULT_ENGAGEMENT_DELAY_MS);
        assert_eq!(config.exclusion_list.len(), DEFAULT_EXCLUSION_LIST.len());
    }

    #[test]
    fn test_toml_config() {
        let config = TrackerConfig::from_toml_str(
            r#"
visitIdExpirationTime = 60000
connectors = ["console", "gtag"]
scrollThresholds = [50, 100]
"#,
        )
        .unwrap();
        assert_eq!(config.visit_id_expiration_time, 60_000);
        assert_eq!(config.scroll_thresholds, vec![50, 100]);
        let names: Vec<_> = config.connectors.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["console", "gtag"]);
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let err = TrackerConfig::from_json_str(r#"{"visitIdExpirationTime": 0}"#).unwrap_err();
        assert!(err.to_string().contains("visitIdExpirationTime"));
    }

    #[test]
    fn test_rejects_bad_threshold_and_cookie_name() {
        assert!(TrackerConfig::from_json_str(r#"{"scrollThresholds": [0]}"#).is_err());
        assert!(TrackerConfig::from_json_str(r#"{"scrollThresholds": [101]}"#).is_err());
        assert!(TrackerConfig::from_json_str(r#"{"cookieName": "a;b"}"#).is_err());
        assert!(TrackerConfig::from_json_str(r#"{"cookieName": ""}"#).is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = TrackerConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, FootprintError::ConfigMalformed { .. }));
    }

    #[test]
    fn test_auto_tagging_extends_params() {
        let mut config = TrackerConfig::default();
        assert!(!config.attribution_params().contains(&"gclid"));
        config.auto_tagging = true;
        let params = config.attribution_params();
        assert_eq!(params[0], "utm_source");
        assert!(params.contains(&"gclid"));
        assert!(params.contains(&"fbclid"));
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = TrackerConfig::load(&temp.path().join("missing.json")).unwrap();
        assert_eq!(config.cookie_name, DEFAULT_COOKIE_NAME);
    }

    #[test]
    fn test_load_selects_format_by_extension() {
        let temp = TempDir::new().unwrap();
        let toml_path = temp.path().join("footprint.toml");
        fs_err::write(&toml_path, "cookieName = \"from_toml\"\n").unwrap();
        let json_path = temp.path().join("footprint.json");
        fs_err::write(&json_path, r#"{"cookieName": "from_json"}"#).unwrap();

        assert_eq!(TrackerConfig::load(&toml_path).unwrap().cookie_name, "from_toml");
        assert_eq!(TrackerConfig::load(&json_path).unwrap().cookie_name, "from_json");
    }
}
