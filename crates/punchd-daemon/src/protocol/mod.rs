//! JSONL wire protocol between the daemon and the browser-side host.

pub mod codec;
pub mod messages;

pub use codec::{ProtocolError, read_message, write_message};
pub use messages::{DaemonMessage, HostMessage};
