//! punchd-core: Core library for the attendance portal countdown companion
//!
//! This library provides the shared building blocks used by the punchd
//! daemon: configuration, error taxonomy, logging bootstrap, date window
//! helpers, attendance payload types, and the persistent key-value store.
//!
//! # Main Entry Points
//!
//! - [`config`] - Hierarchical TOML configuration
//! - [`attendance`] - Portal payload types and the freshness rule
//! - [`storage`] - Persistent key-value store and fixed keys
//! - [`time`] - Daily/monthly fetch window computation

pub mod attendance;
pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod storage;
pub mod time;

// Re-export commonly used types at crate root for convenience
pub use attendance::{AttendanceResponse, DailyRecord, EmployeeRecord, PortalResponse, RecordSet};
pub use config::PunchdConfig;
pub use storage::{KeyValueStore, LoginStatus, StorageError};

// Re-export logging initialization
pub use logging::init_logging;
