//! Frontend settings: which WireGuard config to manage and what to run on change

use crate::notify::CommandNotifier;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current config version for migration support
pub const CONFIG_VERSION: u32 = 1;

/// Settings for the frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendConfig {
    pub version: u32,
    pub wireguard: WireguardSection,
    #[serde(default)]
    pub hooks: HooksSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireguardSection {
    /// The WireGuard config file to read and write
    pub config_file: PathBuf,
    /// Directory for generated client configs and QR codes
    pub libdir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HooksSection {
    /// Shell command run after the WireGuard config changed,
    /// e.g. `sudo systemctl reload wg-quick@wg_rw`
    pub on_change_command: Option<String>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            wireguard: WireguardSection {
                config_file: PathBuf::from("/etc/wireguard/wg_rw.conf"),
                libdir: PathBuf::from("/var/lib/wgfrontend"),
            },
            hooks: HooksSection::default(),
        }
    }
}

impl FrontendConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("wgfrontend")
            .join("config.toml")
    }

    /// Load config from the default path, or use defaults if it does not exist
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;

        if config.version != CONFIG_VERSION {
            return Err(Error::config(format!(
                "Unsupported config version {} in {}",
                config.version,
                path.display()
            )));
        }

        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.wireguard.config_file.as_os_str().is_empty() {
            return Err(Error::validation("WireGuard config file cannot be empty"));
        }
        if self.wireguard.libdir.as_os_str().is_empty() {
            return Err(Error::validation("Library directory cannot be empty"));
        }
        if let Some(cmd) = &self.hooks.on_change_command {
            if cmd.trim().is_empty() {
                return Err(Error::validation("on_change_command cannot be blank"));
            }
        }
        Ok(())
    }

    /// Notifier for the configured on-change command, if any
    pub fn change_notifier(&self) -> Option<CommandNotifier> {
        self.hooks
            .on_change_command
            .as_deref()
            .map(CommandNotifier::new)
    }
}
