//! # Configuration System
//!
//! Hierarchical TOML configuration for the punchd daemon.
//!
//! ## Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.punchd/config.toml` (global user preferences)
//! 3. **Project config** - `./.punchd/config.toml` (project-specific overrides)
//!
//! ## Usage Example
//!
//! ```toml
//! # ~/.punchd/config.toml
//! [portal]
//! domain = "portal.example.com"
//! base_url = "https://portal.example.com"
//! email_domain = "example.com"
//!
//! [refresh]
//! debounce_ms = 5000
//! retry_interval_ms = 10000
//! ```
//!
//! ## Loading Configuration
//!
//! ```rust,no_run
//! use punchd_core::config::PunchdConfig;
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PunchdConfig::load_hierarchy()?;
//!     let window = config.refresh.debounce();
//!     Ok(())
//! }
//! ```

pub mod defaults;
pub mod loading;
pub mod types;
pub mod validation;

// Public API exports
pub use types::{
    ChatConfig, HeartbeatConfig, PortalConfig, PunchdConfig, RefreshConfig, UiConfig,
};
pub use validation::validate_config;

impl PunchdConfig {
    /// Load configuration from the hierarchy of config files.
    ///
    /// See [`loading::load_hierarchy`] for details.
    pub fn load_hierarchy() -> Result<Self, crate::errors::ConfigError> {
        loading::load_hierarchy()
    }

    /// Validate the configuration.
    ///
    /// See [`validation::validate_config`] for details.
    pub fn validate(&self) -> Result<(), crate::errors::ConfigError> {
        validation::validate_config(self)
    }
}
