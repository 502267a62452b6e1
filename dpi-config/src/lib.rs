//! # DPI Configuration System
//!
//! Hierarchical configuration for the slot pool, the capture/inspect pipeline,
//! telemetry and classification rules.
//!
//! ## Features
//! - **Layered sources**: defaults, YAML files, then `DPI_*` environment variables
//! - **Validation**: every section is checked before it is handed out

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

mod classifier;
mod error;
mod pipeline;
mod pool;
mod telemetry;
mod validation;

pub use classifier::ClassifierConfig;
pub use error::ConfigError;
pub use pipeline::PipelineConfig;
pub use pool::PoolConfig;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/dpi.yaml";
const ENV_PREFIX: &str = "DPI_";

/// Top‑level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct DpiConfig {
    /// Packet buffer pool.
    #[validate(nested)]
    #[serde(default)]
    pub pool: PoolConfig,

    /// Capture and inspection workers.
    #[validate(nested)]
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging and metrics.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// SNI classification rules.
    #[validate(nested)]
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl DpiConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default Values
    /// 2. `config/dpi.yaml`, if present
    /// 3. `config/<DPI_ENV>.yaml` (`DPI_ENV` defaults to `production`), if present
    /// 4. `DPI_*` environment variables, `__` separating nested keys
    ///    (`DPI_POOL__SLOT_COUNT=8192`)
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(DpiConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        } else {
            debug!("{BASE_FILE} not found, using default configuration");
        }

        let env = std::env::var("DPI_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment)
    }

    /// Load configuration from a specific file, then apply environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        let figment =
            Figment::from(Serialized::defaults(DpiConfig::default())).merge(Yaml::file(path));
        Self::extract(figment)
    }

    /// `load_from_path` when a path is given, `load` otherwise.
    pub fn load_optional<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Re-checks every bound, e.g. after command-line overrides were applied.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(Self::validated)
    }
}
