use serde::{Deserialize, Serialize};

/// One entry of the recent-activity feed, as produced by `get_user_activities`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Activity {
    #[serde(rename = "type", alias = "activity_type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "created_at")]
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_both_column_spellings() {
        let a: Activity = serde_json::from_value(json!({
            "type": "booking",
            "description": "Booked A-101",
            "timestamp": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        let b: Activity = serde_json::from_value(json!({
            "activity_type": "vote",
            "description": "Voted",
            "created_at": "2024-05-02T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(a.kind, "booking");
        assert_eq!(b.kind, "vote");
        assert_eq!(b.timestamp, "2024-05-02T10:00:00Z");
    }
}
