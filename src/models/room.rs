use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Room {
    pub room_id: i64,
    pub room_number: String,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub building_id: Option<i64>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub has_projector: bool,
    #[serde(default)]
    pub has_ac: bool,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Embedded resources such as `buildings` or `room_facilities`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Building {
    pub building_id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Booking {
    pub booking_id: i64,
    pub room_id: i64,
    pub user_id: String,
    pub start_time: String,
    pub end_time: String,
    pub status: BookingStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Booking request as inserted into `room_bookings`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub room_id: i64,
    pub user_id: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    pub status: BookingStatus,
}

/// Optional filters for listing available rooms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomFilters {
    pub building_id: Option<i64>,
    pub room_type: Option<String>,
    pub min_capacity: Option<i64>,
    pub has_projector: bool,
    pub has_ac: bool,
    pub search_query: Option<String>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn room_keeps_embedded_resources() {
        let room: Room = serde_json::from_value(json!({
            "room_id": 7,
            "room_number": "A-101",
            "capacity": 30,
            "has_projector": true,
            "buildings": {"name": "Main", "address": "1 Campus Rd"}
        }))
        .unwrap();

        assert_eq!(room.room_id, 7);
        assert!(room.is_available);
        assert!(!room.has_ac);
        assert_eq!(room.extra["buildings"]["name"], "Main");
    }

    #[test]
    fn booking_status_round_trips_lowercase() {
        let value = serde_json::to_value(BookingStatus::Cancelled).unwrap();
        assert_eq!(value, json!("cancelled"));
        assert_eq!(BookingStatus::Approved.as_str(), "approved");
    }
}
