//! Attendance portal client boundary.
//!
//! Transport failures are tagged here and surfaced as values; nothing in
//! this module is allowed to panic or to leak a raw HTTP error across the
//! orchestrator boundary.

pub mod client;

use std::future::Future;

use chrono::NaiveDate;

use punchd_core::attendance::{AttendanceResponse, EmployeeResponse};
use punchd_core::errors::PunchdError;

pub use client::OdooPortalClient;

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("Portal returned HTTP {status}")]
    Http { status: u16 },

    #[error("Network error talking to portal: {message}")]
    Network { message: String },

    #[error("Failed to decode portal response: {message}")]
    Decode { message: String },
}

impl PunchdError for PortalError {
    fn error_code(&self) -> &'static str {
        match self {
            PortalError::Http { .. } => "PORTAL_HTTP_ERROR",
            PortalError::Network { .. } => "PORTAL_NETWORK_ERROR",
            PortalError::Decode { .. } => "PORTAL_DECODE_ERROR",
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => PortalError::Http {
                status: status.as_u16(),
            },
            None => PortalError::Network {
                message: e.to_string(),
            },
        }
    }
}

/// Stateless request/response wrapper around the remote attendance API.
///
/// Every call takes the session credential explicitly; the client itself
/// holds no authentication state.
pub trait PortalClient: Send + Sync + 'static {
    /// Fetch the portal homepage HTML (carries the session-info script).
    fn fetch_homepage(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<String, PortalError>> + Send;

    /// Look up the employee record (and attendance machine id) by email.
    fn search_employee(
        &self,
        credential: &str,
        email: &str,
    ) -> impl Future<Output = Result<EmployeeResponse, PortalError>> + Send;

    /// Fetch attendance rows for one employee in the half-open window
    /// `[from, to)`.
    fn fetch_attendance(
        &self,
        credential: &str,
        machine_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<AttendanceResponse, PortalError>> + Send;

    /// Fetch the overview attendance-analysis snapshot (kept opaque).
    fn fetch_overview(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<serde_json::Value, PortalError>> + Send;
}
