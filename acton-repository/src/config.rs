//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: ACTON_, nested keys separated by `__`,
//!    e.g. `ACTON_PAGINATION__MAX_PAGE_SIZE=50`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/acton-repository/{service_name}/config.toml
//! 4. System directory: /etc/acton-repository/{service_name}/config.toml
//! 5. Default values
//!
//! # Example
//!
//! ```toml
//! [service]
//! name = "users"
//! log_level = "debug"
//!
//! [pagination]
//! default_page_size = 25
//! max_page_size = 200
//!
//! [store]
//! id_seed = 1000
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::repository::{PaginationSpec, RepositoryError, RepositoryOperation, RepositoryResult};

const CONFIG_PREFIX: &str = "acton-repository";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Page size defaults and limits
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Storage engine settings
    #[serde(default)]
    pub store: StoreConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Pagination configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size used when a caller does not ask for one
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Largest page size a caller may ask for
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
}

/// Storage engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// First surrogate key handed out by a new store
    #[serde(default = "default_id_seed")]
    pub id_seed: i64,
}

fn default_service_name() -> String {
    CONFIG_PREFIX.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_page_size() -> u64 {
    20
}

fn default_max_page_size() -> u64 {
    100
}

fn default_id_seed() -> i64 {
    1
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id_seed: default_id_seed(),
        }
    }
}

impl PaginationConfig {
    /// Turn optional caller input into a validated page request
    ///
    /// A missing page number means the first page; a missing size means
    /// [`default_page_size`](Self::default_page_size).
    ///
    /// # Errors
    ///
    /// Returns a validation error for page `0`, size `0`, or a size above
    /// [`max_page_size`](Self::max_page_size).
    pub fn resolve(
        &self,
        page_number: Option<u64>,
        page_size: Option<u64>,
    ) -> RepositoryResult<PaginationSpec> {
        let page_size = page_size.unwrap_or(self.default_page_size);
        if page_size > self.max_page_size {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::FindAllPaged,
                format!(
                    "page_size must be <= {}, got {page_size}",
                    self.max_page_size
                ),
            ));
        }
        PaginationSpec::new(page_number.unwrap_or(1), page_size)
    }
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (first found is used):
    /// 1. Current working directory: ./config.toml
    /// 2. XDG config directory: ~/.config/acton-repository/{service_name}/config.toml
    /// 3. System directory: /etc/acton-repository/{service_name}/config.toml
    ///
    /// Environment variables (ACTON_ prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        // Try to infer service name from binary name or use default
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(default_service_name);

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Self::env());

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses XDG directories and loads directly from the given path.
    /// Environment variables still override the file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Self::env())
            .extract()?;

        Ok(config)
    }

    fn env() -> Env {
        Env::prefixed("ACTON_").split("__")
    }

    /// Find all possible config file paths for a service
    ///
    /// Returns paths in priority order (highest first).
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_PREFIX);
        if let Some(path) = xdg_dirs.find_config_file(Path::new(service_name).join("config.toml")) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }
}
