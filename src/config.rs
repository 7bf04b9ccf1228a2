// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving the daemon settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::hfp::{HfpSettings, DEFAULT_SUPPORTED_FEATURES, RING_INTERVAL};
use crate::opp::{OppSettings, PROGRESS_INTERVAL};

const APP_DIR: &str = "rfcomm-profiles";

/// Daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bluetooth: BluetoothConfig,
    pub opp: OppConfig,
    pub hfp: HfpConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Adapter name such as `hci0`; the default adapter when unset.
    pub adapter: Option<String>,
    pub encrypt: bool,
    pub authenticate: bool,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            encrypt: true,
            authenticate: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OppConfig {
    pub channel: u8,
    /// Where received files go. Defaults to `<downloads>/bluetooth`.
    pub download_dir: Option<PathBuf>,
    pub max_packet_length: u16,
    /// Bytes between progress notifications.
    pub progress_interval: u64,
    pub auto_accept: bool,
}

impl Default for OppConfig {
    fn default() -> Self {
        Self {
            channel: 10,
            download_dir: None,
            max_packet_length: 0xFFFE,
            progress_interval: PROGRESS_INTERVAL,
            auto_accept: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HfpConfig {
    pub channel: u8,
    pub headset_channel: u8,
    pub supported_features: u32,
    pub ring_interval_secs: u64,
}

impl Default for HfpConfig {
    fn default() -> Self {
        Self {
            channel: 13,
            headset_channel: 12,
            supported_features: DEFAULT_SUPPORTED_FEATURES,
            ring_interval_secs: RING_INTERVAL.as_secs(),
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default file or create it with defaults.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            return Self::load_from(&path);
        }

        let config = Self::default();
        config.save_to(&path)?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn opp_settings(&self) -> OppSettings {
        let defaults = OppSettings::default();
        OppSettings {
            channel: self.opp.channel,
            max_packet_length: self.opp.max_packet_length,
            progress_interval: self.opp.progress_interval,
            auto_accept: self.opp.auto_accept,
            encrypt: self.bluetooth.encrypt,
            authenticate: self.bluetooth.authenticate,
            download_dir: self.opp.download_dir.clone().unwrap_or(defaults.download_dir),
        }
    }

    pub fn hfp_settings(&self) -> HfpSettings {
        HfpSettings {
            channel: self.hfp.channel,
            headset_channel: self.hfp.headset_channel,
            supported_features: self.hfp.supported_features,
            ring_interval: Duration::from_secs(self.hfp.ring_interval_secs.max(1)),
            encrypt: self.bluetooth.encrypt,
            authenticate: self.bluetooth.authenticate,
        }
    }
}
