//! Serde helpers for the portal's Odoo-flavored JSON.
//!
//! Odoo serializes null-ish fields as the literal `false`, and numeric
//! identifiers sometimes arrive as JSON numbers and sometimes as strings.

use serde::{Deserialize, Deserializer, Serializer};

/// Deserialize a field that is either a string or the literal `false`.
pub fn false_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Flag(bool),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => Ok(Some(s)),
        Some(Raw::Flag(_)) | None => Ok(None),
    }
}

/// Serialize the inverse of [`false_as_none`]: `None` becomes `false`.
pub fn none_as_false<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(s) => serializer.serialize_str(s),
        None => serializer.serialize_bool(false),
    }
}

/// Deserialize an identifier that may be a string, a number, or `false`.
pub fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Flag(bool),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => Ok(Some(s)),
        Some(Raw::Int(n)) => Ok(Some(n.to_string())),
        Some(Raw::Flag(_)) | None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct CheckIn {
        #[serde(deserialize_with = "super::false_as_none")]
        check_in: Option<String>,
    }

    #[derive(Deserialize)]
    struct Machine {
        #[serde(deserialize_with = "super::id_as_string")]
        attendance_machine_id: Option<String>,
    }

    #[test]
    fn test_false_maps_to_none() {
        let parsed: CheckIn = serde_json::from_str(r#"{"check_in": false}"#).unwrap();
        assert!(parsed.check_in.is_none());
    }

    #[test]
    fn test_time_string_is_kept() {
        let parsed: CheckIn =
            serde_json::from_str(r#"{"check_in": "2025-06-02 01:12:44"}"#).unwrap();
        assert_eq!(parsed.check_in.as_deref(), Some("2025-06-02 01:12:44"));
    }

    #[test]
    fn test_numeric_id_becomes_string() {
        let parsed: Machine =
            serde_json::from_str(r#"{"attendance_machine_id": 4021}"#).unwrap();
        assert_eq!(parsed.attendance_machine_id.as_deref(), Some("4021"));
    }

    #[test]
    fn test_string_id_is_kept() {
        let parsed: Machine =
            serde_json::from_str(r#"{"attendance_machine_id": "4021"}"#).unwrap();
        assert_eq!(parsed.attendance_machine_id.as_deref(), Some("4021"));
    }

    #[test]
    fn test_false_id_becomes_none() {
        let parsed: Machine =
            serde_json::from_str(r#"{"attendance_machine_id": false}"#).unwrap();
        assert!(parsed.attendance_machine_id.is_none());
    }
}
