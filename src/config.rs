//! Application configuration loading.
//!
//! Sources, lowest priority first:
//! 1. Serialized defaults (when using [`load_config_with_defaults`])
//! 2. The first config file from `paths` that exists (format by extension:
//!    TOML, YAML, JSON, INI, RON, JSON5)
//! 3. Environment variables `APP__<SECTION>__<KEY>` (`APP__DB__HOST` → `db.host`)
//!
//! ```no_run
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Db {
//!     host: String,
//!     port: u16,
//! }
//!
//! #[derive(Deserialize)]
//! struct AppConfig {
//!     db: Db,
//! }
//!
//! # fn main() -> service_kit::Result<()> {
//! let cfg: AppConfig = service_kit::config::load_config(&["config.yaml", "config.json"])?;
//! println!("{}:{}", cfg.db.host, cfg.db.port);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use ::config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Default prefix of environment overrides.
pub const ENV_PREFIX: &str = "APP";

/// Separator between prefix, section and key in environment overrides.
pub const ENV_SEPARATOR: &str = "__";

/// Configurable loader behind [`load_config`] and [`load_config_with_defaults`].
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    paths: Vec<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        ConfigLoader {
            paths: Vec::new(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate config files, tried in order.
    pub fn paths<P: AsRef<Path>>(mut self, paths: &[P]) -> Self {
        self.paths = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        self
    }

    /// Prefix of environment overrides (`<PREFIX>__DB__HOST`).
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// First candidate that exists, if any.
    fn resolve(&self) -> Result<Option<&Path>> {
        if self.paths.is_empty() {
            return Ok(None);
        }
        match self.paths.iter().find(|p| p.is_file()) {
            Some(path) => Ok(Some(path.as_path())),
            None => Err(Error::ConfigError(format!(
                "No config file found in paths: {:?}",
                self.paths
            ))),
        }
    }

    /// Load configuration without defaults.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if paths were given and none exists, a
    /// file cannot be parsed, or the merged values do not fit `T`.
    pub fn load<T: DeserializeOwned>(&self) -> Result<T> {
        self.build(None)?.try_deserialize().map_err(Error::from)
    }

    /// Load configuration on top of `defaults`.
    ///
    /// # Errors
    /// Same as [`ConfigLoader::load`], plus `defaults` failing to serialize.
    pub fn load_with_defaults<T: Serialize + DeserializeOwned>(&self, defaults: &T) -> Result<T> {
        let base = Config::try_from(defaults)?;
        self.build(Some(base))?.try_deserialize().map_err(Error::from)
    }

    fn build(&self, defaults: Option<Config>) -> Result<Config> {
        let mut builder = Config::builder();
        if let Some(defaults) = defaults {
            builder = builder.add_source(defaults);
        }

        if let Some(path) = self.resolve()? {
            info!("» Loading config from {}", path.display());
            builder = builder.add_source(File::from(path));
        }

        builder
            .add_source(Environment::with_prefix(&self.env_prefix).separator(ENV_SEPARATOR))
            .build()
            .map_err(Error::from)
    }
}

/// Load configuration from the first existing file in `paths`, with
/// `APP__*` environment overrides.
///
/// # Errors
/// Returns `Error::ConfigError` if paths were given and none exists, the file
/// cannot be parsed, or the values do not fit `T`.
pub fn load_config<T: DeserializeOwned, P: AsRef<Path>>(paths: &[P]) -> Result<T> {
    ConfigLoader::new().paths(paths).load()
}

/// Like [`load_config`], with `defaults` as the lowest-priority source.
///
/// Fields missing from the file and environment keep their default value.
///
/// # Errors
/// Returns `Error::ConfigError` if paths were given and none exists, the file
/// cannot be parsed, or the values do not fit `T`.
pub fn load_config_with_defaults<T, P>(defaults: T, paths: &[P]) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    P: AsRef<Path>,
{
    ConfigLoader::new().paths(paths).load_with_defaults(&defaults)
}
