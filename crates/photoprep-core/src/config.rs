//! Configuration management for photoprep.
//!
//! Loads configuration from ${PHOTOPREP_HOME}/config.toml with sensible defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::PlanId;

/// Environment variable overriding `base_url`.
pub const BASE_URL_ENV: &str = "PHOTOPREP_BASE_URL";

pub mod paths {
    //! Path resolution for photoprep configuration and data.
    //!
    //! PHOTOPREP_HOME resolution order:
    //! 1. PHOTOPREP_HOME environment variable (if set)
    //! 2. ~/.config/photoprep (default)
    //! 3. ./.photoprep when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the photoprep home directory.
    pub fn photoprep_home() -> PathBuf {
        if let Ok(home) = std::env::var("PHOTOPREP_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".photoprep"),
            |h| h.join(".config").join("photoprep"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        photoprep_home().join("config.toml")
    }

    /// Returns the path to the persisted session credential.
    pub fn credential_path() -> PathBuf {
        photoprep_home().join("session.json")
    }
}

/// Credit rules for one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanPolicy {
    /// Human-readable plan name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Whether each successful processing consumes a credit.
    pub metered: bool,
    /// Whether uploads are refused locally once credits reach zero.
    pub gate_uploads: bool,
    /// Credit allowance per month (`None` = unlimited).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_credits: Option<u32>,
}

impl PlanPolicy {
    /// Policy applied to plans missing from the catalog.
    pub const fn conservative() -> Self {
        Self {
            display_name: None,
            metered: true,
            gate_uploads: true,
            monthly_credits: None,
        }
    }

    fn named(name: &str, metered: bool, gate_uploads: bool, monthly: Option<u32>) -> Self {
        Self {
            display_name: Some(name.to_string()),
            metered,
            gate_uploads,
            monthly_credits: monthly,
        }
    }
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self::conservative()
    }
}

/// Lookup table from plan id to its credit rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    plans: BTreeMap<PlanId, PlanPolicy>,
}

impl PlanCatalog {
    pub fn new(plans: impl IntoIterator<Item = (PlanId, PlanPolicy)>) -> Self {
        Self {
            plans: plans.into_iter().collect(),
        }
    }

    /// Returns the policy for `plan`, falling back to the conservative one.
    pub fn policy(&self, plan: &PlanId) -> PlanPolicy {
        self.plans
            .get(plan)
            .cloned()
            .unwrap_or_else(PlanPolicy::conservative)
    }

    pub fn is_known(&self, plan: &PlanId) -> bool {
        self.plans.contains_key(plan)
    }

    pub fn is_metered(&self, plan: &PlanId) -> bool {
        self.plans.get(plan).is_none_or(|p| p.metered)
    }

    pub fn gates_uploads(&self, plan: &PlanId) -> bool {
        self.plans.get(plan).is_none_or(|p| p.gate_uploads)
    }

    pub fn monthly_credits(&self, plan: &PlanId) -> Option<u32> {
        self.plans.get(plan).and_then(|p| p.monthly_credits)
    }

    pub fn display_name(&self, plan: &PlanId) -> String {
        self.plans
            .get(plan)
            .and_then(|p| p.display_name.clone())
            .unwrap_or_else(|| plan.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlanId, &PlanPolicy)> {
        self.plans.iter()
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new(
            default_plans()
                .into_iter()
                .map(|(id, policy)| (PlanId::new(id), policy)),
        )
    }
}

fn default_plans() -> BTreeMap<String, PlanPolicy> {
    BTreeMap::from([
        (
            "free".to_string(),
            PlanPolicy::named("Free", true, true, Some(3)),
        ),
        (
            "starter".to_string(),
            PlanPolicy::named("Starter", true, false, Some(30)),
        ),
        (
            "pro".to_string(),
            PlanPolicy::named("Pro", false, false, None),
        ),
    ])
}

fn default_allowed_image_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/webp", "image/heic", "image/heif"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote authority base URL (without the `/api` prefix)
    pub base_url: String,

    /// Request timeout in seconds (0 disables)
    pub request_timeout_secs: u64,

    /// Directory for downloaded results
    pub download_dir: Option<String>,

    /// MIME types accepted for upload
    pub allowed_image_types: Vec<String>,

    /// Plan id -> credit rules
    pub plans: BTreeMap<String, PlanPolicy>,
}

impl Config {
    const DEFAULT_BASE_URL: &str = "http://localhost:8001";
    const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Loads configuration from the default config path, then applies
    /// environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&paths::config_path())?;
        config.apply_base_url_override(std::env::var(BASE_URL_ENV).ok());
        Ok(config)
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Parses a TOML document. Plan entries are merged over the defaults.
    ///
    /// # Errors
    /// Returns an error if the document is not valid config TOML.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;
        for (id, policy) in default_plans() {
            config.plans.entry(id).or_insert(policy);
        }
        Ok(config)
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Replaces `base_url` with a non-empty override.
    pub fn apply_base_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
    }

    /// Returns the base URL without trailing slashes.
    pub fn effective_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Returns the request timeout, or `None` when disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn plan_catalog(&self) -> PlanCatalog {
        PlanCatalog::new(
            self.plans
                .iter()
                .map(|(id, policy)| (PlanId::new(id.as_str()), policy.clone())),
        )
    }

    /// Returns true if `mime` is an accepted upload type.
    pub fn accepts_image_type(&self, mime: &str) -> bool {
        self.allowed_image_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            download_dir: None,
            allowed_image_types: default_allowed_image_types(),
            plans: default_plans(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.base_url, "http://localhost:8001");
    }

    #[test]
    fn test_template_matches_defaults() {
        let parsed = Config::from_toml(default_config_template()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_plan_override_keeps_other_defaults() {
        let config = Config::from_toml(
            "[plans.free]\nmetered = true\ngate_uploads = true\nmonthly_credits = 5\n",
        )
        .unwrap();
        let catalog = config.plan_catalog();
        assert_eq!(catalog.monthly_credits(&PlanId::new("free")), Some(5));
        assert_eq!(catalog.monthly_credits(&PlanId::new("starter")), Some(30));
        assert!(!catalog.is_metered(&PlanId::new("pro")));
    }

    #[test]
    fn test_custom_plan_from_config() {
        let config = Config::from_toml(
            "[plans.premium]\ndisplay_name = \"Premium\"\nmetered = false\ngate_uploads = false\n",
        )
        .unwrap();
        let catalog = config.plan_catalog();
        let premium = PlanId::new("premium");
        assert!(catalog.is_known(&premium));
        assert!(!catalog.is_metered(&premium));
        assert_eq!(catalog.display_name(&premium), "Premium");
    }

    #[test]
    fn test_unknown_plan_is_conservative() {
        let catalog = PlanCatalog::default();
        let unknown = PlanId::new("enterprise");
        assert!(!catalog.is_known(&unknown));
        assert!(catalog.is_metered(&unknown));
        assert!(catalog.gates_uploads(&unknown));
        assert_eq!(catalog.policy(&unknown), PlanPolicy::conservative());
    }

    #[test]
    fn test_default_catalog_rules() {
        let catalog = PlanCatalog::default();
        assert!(catalog.gates_uploads(&PlanId::new("free")));
        assert!(!catalog.gates_uploads(&PlanId::new("starter")));
        assert!(catalog.is_metered(&PlanId::new("starter")));
        assert!(!catalog.is_metered(&PlanId::new("pro")));
        assert_eq!(catalog.monthly_credits(&PlanId::new("pro")), None);
    }

    #[test]
    fn test_init_creates_config_and_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::init(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("base_url ="));
        assert!(contents.contains("[plans.free]"));
    }

    #[test]
    fn test_init_fails_if_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "").unwrap();

        assert!(Config::init(&path).is_err());
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "base_url = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn test_base_url_override_and_trailing_slash() {
        let mut config = Config::default();
        config.apply_base_url_override(Some("   ".to_string()));
        assert_eq!(config.base_url, "http://localhost:8001");

        config.apply_base_url_override(Some("https://api.example.com/".to_string()));
        assert_eq!(config.effective_base_url(), "https://api.example.com");
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), None);
        assert_eq!(
            Config::default().request_timeout(),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_accepts_image_type_case_insensitive() {
        let config = Config::default();
        assert!(config.accepts_image_type("IMAGE/PNG"));
        assert!(!config.accepts_image_type("image/gif"));
    }
}
