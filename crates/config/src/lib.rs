//! Configuration loading and validation.
//!
//! Configuration is layered with [`figment`], lowest priority first:
//! 1. built-in defaults,
//! 2. an optional config file (YAML, TOML or JSON, picked by extension),
//! 3. `SHELF_`-prefixed environment variables, with `__` separating nested
//!    keys (`SHELF_SCAN__MAX_CONCURRENT_FILES=8`).
//!
//! The loaded [`Config`] is validated before being returned, so callers can
//! rely on every invariant documented on the individual fields.

pub mod error;
mod models;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use globset::GlobBuilder;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub use crate::models::{CatalogConfig, Config, ImportPath, LibraryConfig, ScanConfig};

const ENV_PREFIX: &str = "SHELF_";
const ENV_SEPARATOR: &str = "__";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "shelf").ok_or_raise(|| ErrorKind::NoHomeDirectory)
}

/// Platform default location of the config file (`~/.config/shelf/config.toml` on Linux).
pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Platform default location of the catalog database.
pub fn default_database_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().join("catalog.sqlite3"))
}

fn file_provider(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// When `path` is `None` the platform default config file is used if it
    /// exists; an explicitly given path that doesn't exist is an error.
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) => figment = file_provider(figment, path)?,
            None => {
                let default = default_config_path()?;
                if default.is_file() {
                    figment = file_provider(figment, &default)?;
                }
            },
        }
        let figment = figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR));
        Self::from_figment(figment)
    }

    /// Extract and validate configuration from an already-assembled [`Figment`].
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let mut config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        if config.catalog.database.as_os_str().is_empty() {
            config.catalog.database = default_database_path()?;
        }
        config.library.supported_extensions = config
            .library
            .supported_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        config.validate()?;
        Ok(config)
    }

    /// Check every constraint that serde can't express.
    pub fn validate(&self) -> Result<()> {
        if let Some(import) = self.library.import_paths.iter().find(|i| !i.path.is_absolute()) {
            exn::bail!(ErrorKind::invalid(
                "library.import_paths",
                format!("import path must be absolute: {}", import.path.display())
            ));
        }
        if self.library.supported_extensions.is_empty() {
            exn::bail!(ErrorKind::invalid("library.supported_extensions", "at least one extension is required"));
        }
        for pattern in &self.library.exclude_patterns {
            if let Err(e) = GlobBuilder::new(pattern).case_insensitive(true).build() {
                exn::bail!(ErrorKind::invalid("library.exclude_patterns", format!("{pattern}: {e}")));
            }
        }
        if self.scan.max_concurrent_files == 0 {
            exn::bail!(ErrorKind::invalid("scan.max_concurrent_files", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.scan.mismatch_tolerance) {
            exn::bail!(ErrorKind::invalid("scan.mismatch_tolerance", "must be between 0 and 1"));
        }
        Ok(())
    }
}
