use crate::error::Result;
use crate::error::SearchError;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a search widget session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Base URL of the search backend, without the `/v1` suffix
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Store identity passed as `storeUrl` on every request
    #[serde(default)]
    pub store_url: String,

    /// Transport-level timeout for a single request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Input quiet period before typed text triggers autocomplete and search
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Results per page for search and load-more
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Catalog items fetched once to derive facet counts
    #[serde(default = "default_facet_fetch_limit")]
    pub facet_fetch_limit: u32,

    /// Retries after the first failed facet bootstrap attempt
    #[serde(default = "default_facet_retries")]
    pub facet_retries: u32,

    /// Fixed delay between facet bootstrap attempts
    #[serde(default = "default_facet_retry_delay_ms")]
    pub facet_retry_delay_ms: u64,

    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,

    #[serde(default = "default_max_recent_searches")]
    pub max_recent_searches: usize,

    #[serde(default = "default_max_popular_searches")]
    pub max_popular_searches: usize,

    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,

    /// Upper price bound used until the facet index reports a real maximum
    #[serde(default = "default_max_price")]
    pub default_max_price: f64,

    /// Viewports narrower than this use the compact (infinite scroll) layout
    #[serde(default = "default_compact_breakpoint_px")]
    pub compact_breakpoint_px: u32,

    /// Fraction of the load-more sentinel that must be visible to trigger
    #[serde(default = "default_load_more_visibility_threshold")]
    pub load_more_visibility_threshold: f32,

    /// Popular terms used when the backend cannot provide any
    #[serde(default = "default_popular_fallback")]
    pub popular_fallback: Vec<String>,

    /// JSON file holding recent searches. `None` keeps them in memory only.
    #[serde(default)]
    pub recent_searches_path: Option<PathBuf>,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_page_size() -> u32 {
    12
}

fn default_facet_fetch_limit() -> u32 {
    1000
}

fn default_facet_retries() -> u32 {
    3
}

fn default_facet_retry_delay_ms() -> u64 {
    1000
}

fn default_max_suggestions() -> usize {
    10
}

fn default_max_recent_searches() -> usize {
    10
}

fn default_max_popular_searches() -> usize {
    6
}

fn default_max_recommendations() -> usize {
    8
}

fn default_max_price() -> f64 {
    10_000.0
}

fn default_compact_breakpoint_px() -> u32 {
    1280
}

fn default_load_more_visibility_threshold() -> f32 {
    0.1
}

fn default_popular_fallback() -> Vec<String> {
    vec![
        "shirt".to_string(),
        "underwear".to_string(),
        "plan".to_string(),
    ]
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            store_url: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            debounce_ms: default_debounce_ms(),
            page_size: default_page_size(),
            facet_fetch_limit: default_facet_fetch_limit(),
            facet_retries: default_facet_retries(),
            facet_retry_delay_ms: default_facet_retry_delay_ms(),
            max_suggestions: default_max_suggestions(),
            max_recent_searches: default_max_recent_searches(),
            max_popular_searches: default_max_popular_searches(),
            max_recommendations: default_max_recommendations(),
            default_max_price: default_max_price(),
            compact_breakpoint_px: default_compact_breakpoint_px(),
            load_more_visibility_threshold: default_load_more_visibility_threshold(),
            popular_fallback: default_popular_fallback(),
            recent_searches_path: None,
        }
    }
}

impl WidgetConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_toml_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: WidgetConfig =
            toml::from_str(raw).map_err(|err| SearchError::Config(err.to_string()))?;
        config.validate().map_err(SearchError::Config)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.backend_url.trim().is_empty() {
            return Err("backend_url must not be empty".to_string());
        }

        if self.page_size == 0 {
            return Err("page_size must be > 0".to_string());
        }

        if self.facet_fetch_limit == 0 {
            return Err("facet_fetch_limit must be > 0".to_string());
        }

        if self.max_suggestions == 0 {
            return Err("max_suggestions must be > 0".to_string());
        }

        if self.max_recent_searches == 0 {
            return Err("max_recent_searches must be > 0".to_string());
        }

        if !self.default_max_price.is_finite() || self.default_max_price <= 0.0 {
            return Err(format!(
                "default_max_price must be a positive number, got {}",
                self.default_max_price
            ));
        }

        if !(0.0..=1.0).contains(&self.load_more_visibility_threshold) {
            return Err(format!(
                "load_more_visibility_threshold must be in [0.0, 1.0], got {}",
                self.load_more_visibility_threshold
            ));
        }

        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn facet_retry_delay(&self) -> Duration {
        Duration::from_millis(self.facet_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_valid() {
        let config = WidgetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.page_size, 12);
        assert_eq!(config.facet_fetch_limit, 1000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = WidgetConfig::from_toml_str(
            r#"
backend_url = "https://search.example.com/api"
store_url = "https://shop.example.com"
page_size = 24
"#,
        )
        .unwrap();

        assert_eq!(config.backend_url, "https://search.example.com/api");
        assert_eq!(config.store_url, "https://shop.example.com");
        assert_eq!(config.page_size, 24);
        assert_eq!(config.max_recent_searches, 10);
        assert_eq!(config.popular_fallback, vec!["shirt", "underwear", "plan"]);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = WidgetConfig::default();
        config.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = WidgetConfig::default();
        config.load_more_visibility_threshold = 1.5;
        assert!(config.validate().is_err());

        let err = WidgetConfig::from_toml_str("max_suggestions = 0").unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }
}
