use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use alert_core::{config::DeviceConfig, hardware::ConfigStore};
use anyhow::{Context, Result};
use log::{debug, info};
use ron::ser::PrettyConfig;

/// Device configuration persisted as a RON file.
///
/// Saves go through a temporary file that is synced and renamed over the
/// old one, so a save that returned is on disk.
pub struct RonStore {
    path: PathBuf,
}

impl RonStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ConfigStore for RonStore {
    fn load(&mut self) -> Result<DeviceConfig> {
        if !self.path.exists() {
            info!("No stored configuration at {}", self.path.display());
            return Ok(DeviceConfig::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let config = ron::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(config)
    }

    fn save(&mut self, config: &DeviceConfig) -> Result<()> {
        let contents = ron::ser::to_string_pretty(config, PrettyConfig::default())?;
        let tmp = self.path.with_extension("ron.tmp");

        let mut file = File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Configuration saved to {}", self.path.display());
        Ok(())
    }
}
