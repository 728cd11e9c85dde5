//! Typed shapes for the portal's `search_read` responses.
//!
//! Responses are persisted to the store as opaque JSON; these types are the
//! views the orchestrator needs for decisions (freshness, identity lookup).

use serde::{Deserialize, Serialize};

/// JSON-RPC response envelope returned by the portal.
///
/// Exactly one of `result` / `error` is expected to be populated; a missing
/// `result` is treated the same as an explicit error by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalResponse<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default = "none_result")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

fn none_result<T>() -> Option<T> {
    None
}

impl<T> PortalResponse<T> {
    /// Whether this response carries usable data.
    pub fn is_ok(&self) -> bool {
        self.result.is_some() && self.error.is_none()
    }

    /// Short error description for logging.
    pub fn error_text(&self) -> String {
        match &self.error {
            Some(e) => e.to_string(),
            None => "missing result".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSet<T> {
    #[serde(default = "Vec::new")]
    pub records: Vec<T>,
}

impl<T> RecordSet<T> {
    pub fn first(&self) -> Option<&T> {
        self.records.first()
    }
}

/// One `hr.attendance` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date_check: String,

    #[serde(
        default,
        deserialize_with = "super::de::false_as_none",
        serialize_with = "super::de::none_as_false"
    )]
    pub check_in: Option<String>,

    #[serde(
        default,
        deserialize_with = "super::de::false_as_none",
        serialize_with = "super::de::none_as_false"
    )]
    pub check_out: Option<String>,

    #[serde(default)]
    pub is_weekend: Option<bool>,

    #[serde(default)]
    pub is_holiday: Option<bool>,

    /// Remaining row fields (work numbers, leave ids, ...) carried opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One `hr.employee` row from the identity lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRecord {
    #[serde(default, deserialize_with = "super::de::id_as_string")]
    pub attendance_machine_id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub work_email: Option<String>,
}

pub type AttendanceResponse = PortalResponse<RecordSet<DailyRecord>>;
pub type EmployeeResponse = PortalResponse<RecordSet<EmployeeRecord>>;
