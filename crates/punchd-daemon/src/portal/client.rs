//! Concrete portal client speaking the Odoo `search_read` JSON-RPC shape.

use chrono::NaiveDate;
use tracing::{debug, warn};

use punchd_core::attendance::{AttendanceResponse, EmployeeResponse};
use punchd_core::config::PortalConfig;
use punchd_core::time::format_date;

use super::{PortalClient, PortalError};

pub struct OdooPortalClient {
    http: reqwest::Client,
    base_url: String,
}

impl OdooPortalClient {
    pub fn new(portal: &PortalConfig) -> Result<Self, PortalError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(PortalError::from)?;

        Ok(Self {
            http,
            base_url: portal.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST one `web/dataset/search_read` call and return the raw JSON body.
    async fn search_read(
        &self,
        credential: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, PortalError> {
        let url = format!("{}/web/dataset/search_read", self.base_url);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": params,
            "id": 0,
        });

        debug!(event = "daemon.portal.search_read_started", url = %url);

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::COOKIE, credential)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                event = "daemon.portal.search_read_http_error",
                status = status.as_u16()
            );
            return Err(PortalError::Http {
                status: status.as_u16(),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PortalError::Decode {
                message: e.to_string(),
            })
    }

    fn decode<T: serde::de::DeserializeOwned>(
        raw: serde_json::Value,
    ) -> Result<T, PortalError> {
        serde_json::from_value(raw).map_err(|e| PortalError::Decode {
            message: e.to_string(),
        })
    }
}

impl PortalClient for OdooPortalClient {
    async fn fetch_homepage(&self, credential: &str) -> Result<String, PortalError> {
        let url = format!("{}/web", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::COOKIE, credential)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortalError::Http {
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(PortalError::from)
    }

    async fn search_employee(
        &self,
        credential: &str,
        email: &str,
    ) -> Result<EmployeeResponse, PortalError> {
        let raw = self
            .search_read(
                credential,
                serde_json::json!({
                    "limit": 1,
                    "model": "hr.employee",
                    "sort": "create_date DESC",
                    "domain": ["|", ["work_email", "ilike", email], ["name", "ilike", email]],
                    "context": {"lang": "en_US"},
                    "fields": ["attendance_machine_id", "name", "work_email"],
                }),
            )
            .await?;

        Self::decode(raw)
    }

    async fn fetch_attendance(
        &self,
        credential: &str,
        machine_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AttendanceResponse, PortalError> {
        let raw = self
            .search_read(
                credential,
                serde_json::json!({
                    "model": "hr.attendance",
                    "domain": [
                        "&", "&",
                        ["date_check", ">=", format_date(from)],
                        ["date_check", "<", format_date(to)],
                        ["employee_id.attendance_machine_id", "=", machine_id],
                    ],
                    "fields": [
                        "timekeeping_code",
                        "employee_id",
                        "date_check",
                        "check_in",
                        "check_out",
                        "minus_fund",
                        "work_lack",
                        "work_number",
                        "leave_ids",
                        "total_work_number",
                        "is_weekend",
                        "is_holiday",
                    ],
                    "limit": 100,
                    "sort": "",
                    "context": {"lang": "en_US"},
                }),
            )
            .await?;

        Self::decode(raw)
    }

    async fn fetch_overview(&self, credential: &str) -> Result<serde_json::Value, PortalError> {
        self.search_read(
            credential,
            serde_json::json!({
                "model": "employee.attendance.analysis",
                "domain": [],
                "fields": ["order_id", "name", "operation", "time_display", "amount", "line_number"],
                "limit": 40,
                "sort": "",
                "context": {"lang": "en_US"},
            }),
        )
        .await
    }
}
