//! Portal payload types and the attendance freshness rule.

pub mod de;
pub mod freshness;
pub mod types;

pub use freshness::{is_fresh, needs_update};
pub use types::{
    AttendanceResponse, DailyRecord, EmployeeRecord, EmployeeResponse, PortalResponse, RecordSet,
};
