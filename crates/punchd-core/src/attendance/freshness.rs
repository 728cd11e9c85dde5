//! When is a stored daily record still usable?
//!
//! A daily record is fresh only when it is for today AND the portal has
//! already pushed a check-in time. A row for today with no check-in means
//! the attendance machine data has not landed yet, so a refetch (and
//! retry) is still required.

use super::types::DailyRecord;

pub fn is_fresh(record: Option<&DailyRecord>, today: &str) -> bool {
    matches!(record, Some(r) if r.date_check == today && r.check_in.is_some())
}

pub fn needs_update(record: Option<&DailyRecord>, today: &str) -> bool {
    !is_fresh(record, today)
}
