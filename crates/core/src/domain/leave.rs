use chrono::{DateTime, Utc};

pub const FIELD_PLACEHOLDER: &str = "-";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

impl UserId {
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

/// A single leave submission. Lives only for the duration of one modal
/// submission and is never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaveRequest {
    pub submitter_id: UserId,
    pub name: String,
    pub date_range: String,
    pub reason: String,
    pub submitted_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Blank or absent values collapse to [`FIELD_PLACEHOLDER`]. The modal marks
    /// every field required, so this only matters for malformed payloads.
    pub fn from_fields(
        submitter_id: UserId,
        name: Option<&str>,
        date_range: Option<&str>,
        reason: Option<&str>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            submitter_id,
            name: field_or_placeholder(name),
            date_range: field_or_placeholder(date_range),
            reason: field_or_placeholder(reason),
            submitted_at,
        }
    }

    pub fn submitter_mention(&self) -> String {
        self.submitter_id.mention()
    }
}

fn field_or_placeholder(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.trim().is_empty() => value.to_owned(),
        _ => FIELD_PLACEHOLDER.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{LeaveRequest, UserId, FIELD_PLACEHOLDER};

    #[test]
    fn keeps_submitted_values_verbatim() {
        let request = LeaveRequest::from_fields(
            UserId("42".to_string()),
            Some("Alice"),
            Some("09/08"),
            Some("Sick\nback on Monday"),
            Utc::now(),
        );

        assert_eq!(request.name, "Alice");
        assert_eq!(request.date_range, "09/08");
        assert_eq!(request.reason, "Sick\nback on Monday");
    }

    #[test]
    fn empty_and_missing_values_fall_back_to_placeholder() {
        let request = LeaveRequest::from_fields(
            UserId("42".to_string()),
            Some(""),
            None,
            Some("   "),
            Utc::now(),
        );

        assert_eq!(request.name, FIELD_PLACEHOLDER);
        assert_eq!(request.date_range, FIELD_PLACEHOLDER);
        assert_eq!(request.reason, FIELD_PLACEHOLDER);
    }

    #[test]
    fn mention_uses_platform_user_syntax() {
        assert_eq!(UserId("123456".to_string()).mention(), "<@123456>");
    }
}
