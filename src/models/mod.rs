pub mod activity;
pub mod identity;
pub mod profile;
pub mod room;

// Re-export so callers can do "use crate::models::{Identity, Profile};"
pub use activity::Activity;
pub use identity::{AuthSession, Identity};
pub use profile::{Profile, ProfileForm, UserSettings};
pub use room::{Booking, BookingStatus, Building, NewBooking, Room, RoomFilters};

/// A single row as returned by the relational store.
pub type Row = serde_json::Map<String, serde_json::Value>;
