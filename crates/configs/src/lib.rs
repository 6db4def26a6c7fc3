//! # configs
//!
//! Layered settings for the archive tools. Later layers win:
//!
//! 1. built-in defaults
//! 2. `hypernews.toml` in the working directory, if present
//! 3. `HN_*` environment variables, `__` between levels (`HN_ARCHIVE__ROOT`)
//! 4. the legacy variables `HNFILES` (archive root) and `HNDATABASE` (index)
//!
//! A `.env` file is loaded into the environment first.

use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use hn_core::layout::{ArchiveLayout, DEFAULT_CATEGORIES_FILE, DEFAULT_PEOPLE_DIR};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "hypernews.toml";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub archive: ArchiveSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSettings {
    /// Directory holding the forum records
    pub root: PathBuf,
    /// Relative to `root` unless absolute
    pub people_dir: PathBuf,
    pub categories_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite index; when set, queries go to the index instead of the files
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Records kept per kind; 0 disables the cache
    pub capacity: usize,
}

impl ArchiveSettings {
    pub fn layout(&self) -> ArchiveLayout {
        ArchiveLayout::new(&self.root)
            .with_people_dir(&self.people_dir)
            .with_categories_file(&self.categories_file)
    }
}

impl Settings {
    /// Load from `hypernews.toml` and the process environment.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE), env::vars().collect())
    }

    /// Load from an explicit config file (optional) and variable set.
    pub fn load_from(file: &Path, vars: config::Map<String, String>) -> Result<Self, SettingsError> {
        let hnfiles = vars.get("HNFILES").cloned();
        let hndatabase = vars.get("HNDATABASE").cloned();

        let settings = Config::builder()
            .set_default("archive.root", ".")?
            .set_default("archive.people_dir", DEFAULT_PEOPLE_DIR)?
            .set_default("archive.categories_file", DEFAULT_CATEGORIES_FILE)?
            .set_default("database.max_connections", 4)?
            .set_default("cache.capacity", 256)?
            .add_source(File::from(file.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("HN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars)),
            )
            .set_override_option("archive.root", hnfiles)?
            .set_override_option("database.path", hndatabase)?
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
