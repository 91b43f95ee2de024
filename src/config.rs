//! Site configuration module.
//!
//! Handles loading, validating, and merging `markdoc.toml`. Stock defaults are
//! the base layer; the site's `markdoc.toml` overrides any subset of them.
//! `env` and `site_params.img_url` have no stock value and must be set by the
//! site.
//!
//! ## Config File Location
//!
//! ```text
//! site/
//! ├── markdoc.toml                 # Site config (overrides stock defaults)
//! ├── content/
//! │   ├── en/
//! │   └── ja/
//! ├── partials/
//! └── preferences_config/options/
//!     ├── en/
//!     └── ja/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! env = "development"               # Required: development | preview | live
//! languages = ["en"]
//! base_url = "http://localhost:1313/"
//!
//! [site_params]
//! img_url = "https://static.example.com/images/"   # Required
//! # branch = "my-feature"          # Required when env = "preview"
//!
//! [dirs]
//! content = "content"
//! partials = "partials"
//! options = "preferences_config/options"
//!
//! [processing]
//! max_processes = 4                 # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the site configuration file.
pub const CONFIG_FILE: &str = "markdoc.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Deployment environment the site is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Preview,
    Live,
}

/// Site configuration loaded from `markdoc.toml`.
///
/// Every field except `env` and `site_params.img_url` has a stock default.
/// Those two stay `None` until the site sets them, and [`SiteConfig::validate`]
/// rejects a config that leaves either unset. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Environment>,
    /// Language codes; each has a content and an options subdirectory.
    pub languages: Vec<String>,
    pub base_url: String,
    pub site_params: SiteParams,
    pub dirs: DirsConfig,
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            env: None,
            languages: vec!["en".to_string()],
            base_url: "http://localhost:1313/".to_string(),
            site_params: SiteParams::default(),
            dirs: DirsConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.languages.is_empty() {
            return Err(ConfigError::Validation(
                "languages must not be empty".into(),
            ));
        }
        for (idx, lang) in self.languages.iter().enumerate() {
            if !is_language_code(lang) {
                return Err(ConfigError::Validation(format!(
                    "languages[{idx}] {lang:?} is not a language code"
                )));
            }
            if self.languages[..idx].contains(lang) {
                return Err(ConfigError::Validation(format!(
                    "language {lang:?} is listed twice"
                )));
            }
        }
        let env = self
            .env
            .ok_or_else(|| ConfigError::Validation("env is required".into()))?;
        check_url("base_url", &self.base_url)?;
        let img_url = self.site_params.img_url.as_deref().ok_or_else(|| {
            ConfigError::Validation("site_params.img_url is required".into())
        })?;
        check_url("site_params.img_url", img_url)?;
        if env == Environment::Preview
            && self
                .site_params
                .branch
                .as_deref()
                .is_none_or(|b| b.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "site_params.branch is required when env is \"preview\"".into(),
            ));
        }
        for (name, dir) in [
            ("dirs.content", &self.dirs.content),
            ("dirs.partials", &self.dirs.partials),
            ("dirs.options", &self.dirs.options),
        ] {
            if dir.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// Image host prefix; empty until `site_params.img_url` is set.
    pub fn img_url(&self) -> &str {
        self.site_params.img_url.as_deref().unwrap_or_default()
    }

    /// `<site>/<dirs.content>/<lang>`
    pub fn content_dir(&self, site_dir: &Path, lang: &str) -> PathBuf {
        site_dir.join(&self.dirs.content).join(lang)
    }

    /// `<site>/<dirs.options>/<lang>`
    pub fn options_dir(&self, site_dir: &Path, lang: &str) -> PathBuf {
        site_dir.join(&self.dirs.options).join(lang)
    }

    /// `<site>/<dirs.partials>`
    pub fn partials_dir(&self, site_dir: &Path) -> PathBuf {
        site_dir.join(&self.dirs.partials)
    }
}

fn is_language_code(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn check_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{field} must be an http(s) URL, got {url:?}"
        )))
    }
}

/// Parameters exposed to page templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteParams {
    /// Host prefix for `img` tag sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    /// Branch name of a preview deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Site subdirectories, relative to the site root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirsConfig {
    pub content: String,
    pub partials: String,
    pub options: String,
}

impl Default for DirsConfig {
    fn default() -> Self {
        Self {
            content: "content".to_string(),
            partials: "partials".to_string(),
            options: "preferences_config/options".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel page compilation workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a TOML table: the layer `markdoc.toml` is merged onto.
///
/// `env` and `site_params.img_url` are absent, so a site file that omits them
/// fails validation instead of inheriting a value.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("stock config must serialize")
}

/// Overlay a site's TOML onto the stock table.
///
/// Nested tables such as `[dirs]` merge key by key, so a site can change one
/// directory and keep the others. Scalars and arrays (`languages`) replace the
/// stock value whole.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read `<site>/markdoc.toml` without interpreting it. `None` when absent.
pub fn load_raw_config(site_dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = site_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Build a [`SiteConfig`] from the stock table and the site's table, if any.
///
/// A site without `markdoc.toml` gets the stock values alone, which fails
/// validation on the required keys.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load and validate the config of the site rooted at `site_dir`.
pub fn load_config(site_dir: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(site_dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `markdoc.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# mdoc-hugo Configuration
# =======================
# `env` and `site_params.img_url` are required. Every other value shown is
# the default and can be removed.
#
# Place this file at the site root as markdoc.toml.
# Unknown keys will cause an error.

# Deployment environment: "development", "preview" or "live". Required.
env = "development"

# Language codes. Each needs content/<lang>/ and an options/<lang>/ directory.
languages = ["en"]

# Public base URL of the Hugo site.
base_url = "http://localhost:1313/"

# ---------------------------------------------------------------------------
# Site parameters
# ---------------------------------------------------------------------------
[site_params]
# Prefix for the src of {% img %} tags. Required.
img_url = "https://static.example.com/images/"

# Branch name of a preview deployment. Required when env = "preview".
# branch = "my-feature"

# ---------------------------------------------------------------------------
# Directories (relative to the site root)
# ---------------------------------------------------------------------------
[dirs]
# Markdoc pages, one subdirectory per language.
content = "content"

# Files referenced by {% partial file="..." /%}.
partials = "partials"

# Filter allow-lists and option sets, one subdirectory per language.
options = "preferences_config/options"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel page compilation workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
