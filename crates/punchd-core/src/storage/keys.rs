//! Fixed store keys.
//!
//! Key names are part of the persisted format; renaming one orphans the
//! previously stored value.

/// Today's daily attendance record (raw portal response).
pub const EMPLOYEE_DATA: &str = "employee_data";

/// Current calendar month's attendance records (raw portal response).
pub const EMPLOYEE_MONTH_DATA: &str = "employee_month_data";

/// Overview attendance-analysis snapshot (raw portal response).
pub const EMPLOYEE_ATTENDANCE: &str = "employee_attendance";

/// Portal login state, see [`crate::storage::LoginStatus`].
pub const LOGIN_PORTAL_STATUS: &str = "login_portal_status";

/// Cached resolved user email.
pub const USER_EMAIL: &str = "user_email";

/// Cached "go home" message of the day, written by the UI.
pub const GO_HOME_MESSAGE: &str = "go_home_message";

/// Every key the daemon owns; used when resetting persisted state.
pub const ALL: &[&str] = &[
    EMPLOYEE_DATA,
    EMPLOYEE_MONTH_DATA,
    EMPLOYEE_ATTENDANCE,
    LOGIN_PORTAL_STATUS,
    USER_EMAIL,
    GO_HOME_MESSAGE,
];
