use crate::adapters::{gleif, openaire, semantic_scholar};
use crate::app::routines::RoutineSettings;
use crate::domain::model::{DEFAULT_HORIZON_YEARS, MAX_HORIZON_YEARS, MIN_HORIZON_YEARS};
use crate::utils::error::{RadarError, Result};
use crate::utils::validation::{
    validate_json_path, validate_path, validate_positive_number, validate_range, validate_url,
    Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub radar: RadarSection,
    pub data: DataSection,
    pub openaire: OpenAireSection,
    pub semantic_scholar: SemanticScholarSection,
    pub gleif: GleifSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarSection {
    pub timeout_seconds: u64,
    pub default_horizon_years: i32,
    /// Last year of the analysis window; the current year when unset.
    pub reference_year: Option<i32>,
}

impl Default for RadarSection {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            default_horizon_years: DEFAULT_HORIZON_YEARS,
            reference_year: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub snapshot_path: String,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            snapshot_path: "./data/snapshot.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAireSection {
    pub enabled: bool,
    pub endpoint: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for OpenAireSection {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: openaire::DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            refresh_token: None,
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticScholarSection {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub max_papers: usize,
}

impl Default for SemanticScholarSection {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: semantic_scholar::DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout_seconds: 10,
            max_papers: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GleifSection {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub min_interval_ms: u64,
    pub max_lookups: usize,
    pub budget_seconds: u64,
    pub cache_path: Option<String>,
    pub cache_ttl_days: i64,
}

impl Default for GleifSection {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: gleif::DEFAULT_ENDPOINT.to_string(),
            timeout_seconds: 10,
            min_interval_ms: 1000,
            max_lookups: 5,
            budget_seconds: 8,
            cache_path: None,
            cache_ttl_days: gleif::DEFAULT_CACHE_TTL_DAYS,
        }
    }
}

impl RadarConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed)?)
    }

    /// Replaces `${VAR}` with the environment value. Unset variables are left
    /// as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RadarError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;
        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });
        Ok(result.to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.radar.timeout_seconds)
    }

    pub fn routine_settings(&self) -> RoutineSettings {
        RoutineSettings {
            enrichment_lookups: if self.gleif.enabled { self.gleif.max_lookups } else { 0 },
            enrichment_budget: Duration::from_secs(self.gleif.budget_seconds),
            max_papers: self.semantic_scholar.max_papers,
        }
    }
}

impl Validate for RadarConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("radar.timeout_seconds", self.radar.timeout_seconds, 1)?;
        validate_range(
            "radar.default_horizon_years",
            self.radar.default_horizon_years,
            MIN_HORIZON_YEARS,
            MAX_HORIZON_YEARS,
        )?;
        if let Some(year) = self.radar.reference_year {
            validate_range("radar.reference_year", year, 1900, 2200)?;
        }

        validate_json_path("data.snapshot_path", &self.data.snapshot_path)?;

        if self.openaire.enabled {
            validate_url("openaire.endpoint", &self.openaire.endpoint)?;
            validate_positive_number("openaire.timeout_seconds", self.openaire.timeout_seconds, 1)?;
        }
        if self.semantic_scholar.enabled {
            validate_url("semantic_scholar.endpoint", &self.semantic_scholar.endpoint)?;
            validate_positive_number(
                "semantic_scholar.timeout_seconds",
                self.semantic_scholar.timeout_seconds,
                1,
            )?;
            validate_positive_number(
                "semantic_scholar.max_papers",
                self.semantic_scholar.max_papers as u64,
                1,
            )?;
        }
        if self.gleif.enabled {
            validate_url("gleif.endpoint", &self.gleif.endpoint)?;
            validate_positive_number("gleif.timeout_seconds", self.gleif.timeout_seconds, 1)?;
            validate_positive_number("gleif.cache_ttl_days", self.gleif.cache_ttl_days.max(0) as u64, 1)?;
            if let Some(path) = &self.gleif.cache_path {
                validate_path("gleif.cache_path", path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RadarConfig::from_toml_str("").unwrap();
        assert_eq!(config, RadarConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.semantic_scholar.enabled);
        assert!(!config.gleif.enabled);
        assert_eq!(config.routine_settings().enrichment_lookups, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let config = RadarConfig::from_toml_str(
            r#"
[radar]
timeout_seconds = 12
reference_year = 2025

[data]
snapshot_path = "/srv/radar/snapshot.json"

[gleif]
enabled = true
max_lookups = 3
cache_path = "/tmp/gleif-cache.json"
"#,
        )
        .unwrap();

        assert_eq!(config.radar.timeout_seconds, 12);
        assert_eq!(config.radar.reference_year, Some(2025));
        assert_eq!(config.radar.default_horizon_years, 10);
        assert_eq!(config.data.snapshot_path, "/srv/radar/snapshot.json");
        assert_eq!(config.routine_settings().enrichment_lookups, 3);
        assert_eq!(config.gleif.cache_ttl_days, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("RADAR_TEST_S2_KEY", "secret-key");
        let config = RadarConfig::from_toml_str(
            r#"
[semantic_scholar]
api_key = "${RADAR_TEST_S2_KEY}"
"#,
        )
        .unwrap();
        assert_eq!(config.semantic_scholar.api_key.as_deref(), Some("secret-key"));
        std::env::remove_var("RADAR_TEST_S2_KEY");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = RadarConfig::from_toml_str(
            r#"
[openaire]
enabled = true
endpoint = "ftp://example.org"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(RadarError::InvalidConfigValueError { .. })
        ));

        let config = RadarConfig::from_toml_str("[radar]\ndefault_horizon_years = 50\n").unwrap();
        assert!(config.validate().is_err());

        let config = RadarConfig::from_toml_str("[data]\nsnapshot_path = \"data.csv\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_a_config_error() {
        let err = RadarConfig::from_toml_str("[radar\ntimeout_seconds = 1").unwrap_err();
        assert!(matches!(err, RadarError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[radar]\ntimeout_seconds = 5\n")
            .unwrap();
        let config = RadarConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.radar.timeout_seconds, 5);
    }
}
