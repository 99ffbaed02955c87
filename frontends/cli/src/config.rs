use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const MAX_RECENT: usize = 10;

/// One video frame of cycles.
pub const DEFAULT_CYCLE_BUDGET: u64 = 280_896;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub recent_roms: Vec<PathBuf>,
    pub bios: Option<PathBuf>,
    pub cycle_budget: u64,
    pub log_level: String,
    pub log_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recent_roms: Vec::new(),
            bios: None,
            cycle_budget: DEFAULT_CYCLE_BUDGET,
            log_level: "info".to_string(),
            log_capacity: arm7gba_core::log_buffer::DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// `config.toml` in the platform config directory.
    pub fn path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "arm7gba", "arm7gba")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// A missing file is the default config; a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        match Self::path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let text = toml::to_string_pretty(self).context("serializing config")?;
        fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }

    /// Moves `path` to the front of the recent list.
    pub fn add_recent(&mut self, path: PathBuf) {
        self.recent_roms.retain(|p| p != &path);
        self.recent_roms.insert(0, path);
        self.recent_roms.truncate(MAX_RECENT);
    }
}
