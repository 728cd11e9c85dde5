//! Configuration loading and merging logic.
//!
//! Configuration is loaded in the following order (later sources override
//! earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.punchd/config.toml` (global user preferences)
//! 3. **Project config** - `./.punchd/config.toml` (project-specific overrides)
//!
//! Overrides apply at section granularity: a project file that only
//! contains `[refresh]` leaves the user's `[portal]` settings intact.

use crate::config::types::{
    ChatConfig, HeartbeatConfig, PortalConfig, PunchdConfig, RefreshConfig, UiConfig,
};
use crate::config::validation::validate_config;
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A config file as written: only the sections the author spelled out.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    portal: Option<PortalConfig>,
    chat: Option<ChatConfig>,
    refresh: Option<RefreshConfig>,
    heartbeat: Option<HeartbeatConfig>,
    ui: Option<UiConfig>,
}

/// Load configuration from the hierarchy of config files.
///
/// # Errors
///
/// Returns an error if a present file fails to parse or the merged
/// configuration fails validation. Missing config files are not errors.
pub fn load_hierarchy() -> Result<PunchdConfig, ConfigError> {
    let mut config = PunchdConfig::default();

    if let Some(home) = dirs::home_dir() {
        apply_overlay_file(&mut config, &home.join(".punchd").join("config.toml"))?;
    }

    let project_path = std::env::current_dir()
        .map(|cwd| cwd.join(".punchd").join("config.toml"))
        .ok();
    if let Some(path) = project_path {
        apply_overlay_file(&mut config, &path)?;
    }

    validate_config(&config)?;

    Ok(config)
}

/// Merge one config file into `config` if it exists.
fn apply_overlay_file(config: &mut PunchdConfig, path: &Path) -> Result<(), ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ConfigError::IoError { source: e }),
    };

    let overlay: ConfigOverlay =
        toml::from_str(&content).map_err(|e| ConfigError::ConfigParseError {
            message: format!("'{}': {}", path.display(), e),
        })?;

    apply_overlay(config, overlay);
    Ok(())
}

fn apply_overlay(config: &mut PunchdConfig, overlay: ConfigOverlay) {
    if let Some(portal) = overlay.portal {
        config.portal = portal;
    }
    if let Some(chat) = overlay.chat {
        config.chat = chat;
    }
    if let Some(refresh) = overlay.refresh {
        config.refresh = refresh;
    }
    if let Some(heartbeat) = overlay.heartbeat {
        config.heartbeat = heartbeat;
    }
    if let Some(ui) = overlay.ui {
        config.ui = ui;
    }
}
