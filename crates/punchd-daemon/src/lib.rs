//! punchd-daemon: background refresh orchestrator.
//!
//! Watches browser signals (cookie changes, navigations, tab closes)
//! forwarded by the browser-side host, keeps the user's session identity
//! cached, drives the attendance refresh pipeline against the portal, and
//! tracks which chat frames have a live countdown UI instance.

pub mod bridge;
pub mod browser;
pub mod frames;
pub mod orchestrator;
pub mod portal;
pub mod protocol;
pub mod server;
pub mod session;

pub use bridge::{BridgeCommand, BridgeError, BridgeHandle};
pub use frames::FrameLifecycleManager;
pub use orchestrator::{RefreshOrchestrator, RefreshOrigin};
pub use portal::{OdooPortalClient, PortalClient, PortalError};
pub use session::SessionCache;
