#![allow(dead_code)]

use std::sync::Arc;

use figment::{
    Figment,
    providers::{Format, Yaml},
};
use roomboard::config::{parse_config, ConfigV1};
use roomboard::state::AppState;

pub const TEST_CONFIG: &str = r#"
version: "1.0.0"
logging:
  level: "debug"
  format: "json"
app:
  site_url: "http://localhost:5173"
  default_role: "student"
dashboard:
  recent_activity_limit: 2
  clock_refresh_secs: 1
backend:
  type: "memory"
  storage_bucket: "rooms"
  users:
    - id: "auth-ada"
      email: "ada@example.com"
      password: "secret"
      metadata:
        full_name: "Ada Lovelace"
  tables:
    users:
      - user_id: "u-ada"
        auth_id: "auth-ada"
        username: "ada.lovelace"
        email: "ada@example.com"
        full_name: "Ada Lovelace"
        is_active: true
    room_bookings:
      - booking_id: 1
        user_id: "u-ada"
        room_id: 10
        status: "confirmed"
      - booking_id: 2
        user_id: "u-ada"
        room_id: 11
        status: "pending"
      - booking_id: 3
        user_id: "u-other"
        room_id: 10
        status: "confirmed"
    polls:
      - poll_id: 1
        start_date: "2000-01-01T00:00:00.000Z"
        end_date: "2999-01-01T00:00:00.000Z"
      - poll_id: 2
        start_date: "2000-01-01T00:00:00.000Z"
        end_date: "2001-01-01T00:00:00.000Z"
    votes:
      - vote_id: 1
        user_id: "u-ada"
        poll_id: 1
    user_activities:
      - user_id: "u-ada"
        type: "booking"
        description: "Booked room 10"
        timestamp: "2024-05-01T10:00:00Z"
      - user_id: "u-ada"
        type: "vote"
        description: "Voted in poll 1"
        timestamp: "2024-05-03T10:00:00Z"
      - user_id: "u-ada"
        type: "booking"
        description: "Booked room 11"
        timestamp: "2024-05-02T10:00:00Z"
    rooms:
      - room_id: 10
        room_number: "A-101"
        capacity: 30
        is_available: true
"#;

pub fn test_config() -> ConfigV1 {
    parse_config(Figment::new().merge(Yaml::string(TEST_CONFIG)))
        .expect("test config should parse")
}

pub fn build_state() -> AppState {
    AppState::new(Arc::new(test_config()))
}
