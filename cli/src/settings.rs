use anyhow::{Context, Result};
use coredump::restore::{DEFAULT_DUMP_DIR, DEFAULT_EXTENSION, DEFAULT_PREFIX};
use coredump::{ClearPolicy, ConfigStore, PropertyFile, RestoreOptions, StaticConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DEVICE: &str = "/dev/coredump";
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ClearPolicySetting {
    #[default]
    Always,
    OnSuccess,
}

impl From<ClearPolicySetting> for ClearPolicy {
    fn from(setting: ClearPolicySetting) -> Self {
        match setting {
            ClearPolicySetting::Always => ClearPolicy::Always,
            ClearPolicySetting::OnSuccess => ClearPolicy::OnSuccess,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Raw volume: a device node or an image file
    pub device: PathBuf,
    pub sector_size: u32,
    pub dump_dir: PathBuf,
    pub prefix: String,
    pub extension: String,
    /// `key=value` property file holding `coredump.enable`
    pub properties: Option<PathBuf>,
    /// Overrides the property file when set
    pub enable: Option<bool>,
    pub clear_policy: ClearPolicySetting,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            sector_size: DEFAULT_SECTOR_SIZE,
            dump_dir: PathBuf::from(DEFAULT_DUMP_DIR),
            prefix: DEFAULT_PREFIX.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            properties: None,
            enable: None,
            clear_policy: ClearPolicySetting::default(),
        }
    }
}

impl Settings {
    pub fn restore_options(&self) -> RestoreOptions {
        RestoreOptions {
            dir: self.dump_dir.clone(),
            prefix: self.prefix.clone(),
            extension: self.extension.clone(),
        }
    }

    pub fn config_store(&self) -> Result<Box<dyn ConfigStore>> {
        if let Some(enable) = self.enable {
            return Ok(Box::new(StaticConfig(enable)));
        }
        match &self.properties {
            Some(path) => {
                let props = PropertyFile::load(path)
                    .with_context(|| format!("read property file {}", path.display()))?;
                Ok(Box::new(props))
            }
            None => Ok(Box::new(StaticConfig(false))),
        }
    }
}

pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read settings {}", path.display()))?;
    let mut settings: Settings = serde_yaml::from_str(&raw)
        .with_context(|| format!("parse settings {}", path.display()))?;
    // Relative paths are relative to the settings file.
    let base = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if settings.device.is_relative() {
        settings.device = base.join(&settings.device);
    }
    if settings.dump_dir.is_relative() {
        settings.dump_dir = base.join(&settings.dump_dir);
    }
    if let Some(props) = settings.properties.as_mut() {
        if props.is_relative() {
            *props = base.join(&*props);
        }
    }
    Ok(settings)
}
