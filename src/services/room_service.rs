use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::error::AppError;
use crate::models::{Booking, BookingStatus, Building, NewBooking, Room, RoomFilters, Row};
use crate::store::base::{first_row, from_row, from_rows, to_row};
use crate::store::{Query, RemoteStore};

const ROOMS: &str = "rooms";
const BUILDINGS: &str = "buildings";
const BOOKINGS: &str = "room_bookings";

fn single(key: &str, value: Value) -> Row {
    Row::from_iter([(key.to_string(), value)])
}

/// Rooms, buildings and bookings.
#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn RemoteStore>,
}

impl RoomService {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        RoomService { store }
    }

    /// Available rooms matching every filter that is set.
    pub async fn get_rooms(&self, filters: &RoomFilters) -> Result<Vec<Room>, AppError> {
        let mut query = Query::table(ROOMS)
            .select("*, buildings(name, address)")
            .eq("is_available", true);
        if let Some(building_id) = filters.building_id {
            query = query.eq("building_id", building_id);
        }
        if let Some(room_type) = filters.room_type.as_deref().filter(|t| !t.is_empty()) {
            query = query.eq("room_type", room_type);
        }
        if let Some(capacity) = filters.min_capacity {
            query = query.gte("capacity", capacity);
        }
        if filters.has_projector {
            query = query.eq("has_projector", true);
        }
        if filters.has_ac {
            query = query.eq("has_ac", true);
        }
        if let Some(search) = filters.search_query.as_deref().filter(|s| !s.is_empty()) {
            query = query.ilike("room_number", &format!("%{}%", search));
        }
        from_rows(self.store.select(&query).await?)
    }

    pub async fn get_room_by_id(&self, room_id: i64) -> Result<Room, AppError> {
        let query = Query::table(ROOMS)
            .select("*, buildings(name, address), room_facilities(*)")
            .eq("room_id", room_id);
        from_row(self.store.select_one(&query).await?)
    }

    pub async fn create_booking(&self, booking: &NewBooking) -> Result<Booking, AppError> {
        let rows = self.store.insert(BOOKINGS, vec![to_row(booking)?]).await?;
        from_row(first_row(rows, BOOKINGS)?)
    }

    /// True when no non-cancelled booking overlaps `[start_time, end_time)`.
    pub async fn check_room_availability(
        &self,
        room_id: i64,
        start_time: &str,
        end_time: &str,
    ) -> Result<bool, AppError> {
        let query = Query::table(BOOKINGS)
            .eq("room_id", room_id)
            .lt("start_time", end_time)
            .gt("end_time", start_time)
            .neq("status", BookingStatus::Cancelled.as_str());
        Ok(self.store.count(&query).await? == 0)
    }

    /// The user's bookings, newest first.
    pub async fn get_user_bookings(&self, user_id: &str) -> Result<Vec<Booking>, AppError> {
        let query = Query::table(BOOKINGS)
            .select("*, rooms(room_number, room_type, building_id, buildings(name))")
            .eq("user_id", user_id)
            .order("created_at", false);
        from_rows(self.store.select(&query).await?)
    }

    pub async fn add_room(&self, room: Row) -> Result<Room, AppError> {
        let rows = self.store.insert(ROOMS, vec![room]).await?;
        from_row(first_row(rows, ROOMS)?)
    }

    pub async fn update_room(&self, room_id: i64, patch: Row) -> Result<Room, AppError> {
        let rows = self
            .store
            .update(&Query::table(ROOMS).eq("room_id", room_id), patch)
            .await?;
        from_row(first_row(rows, ROOMS)?)
    }

    pub async fn toggle_room_availability(
        &self,
        room_id: i64,
        is_available: bool,
    ) -> Result<Room, AppError> {
        self.update_room(room_id, single("is_available", json!(is_available)))
            .await
    }

    /// Deletes a room that has never been booked.
    pub async fn delete_room(&self, room_id: i64) -> Result<(), AppError> {
        let bookings = self
            .store
            .count(&Query::table(BOOKINGS).eq("room_id", room_id))
            .await?;
        if bookings > 0 {
            return Err(AppError::conflict(
                "Cannot delete room with existing bookings",
            ));
        }
        self.store
            .delete(&Query::table(ROOMS).eq("room_id", room_id))
            .await?;
        info!(
            event_name = "rooms.deleted",
            event_domain = "roomboard",
            room_id,
            "Room deleted"
        );
        Ok(())
    }

    pub async fn update_booking_status(
        &self,
        booking_id: i64,
        status: BookingStatus,
    ) -> Result<Booking, AppError> {
        let rows = self
            .store
            .update(
                &Query::table(BOOKINGS).eq("booking_id", booking_id),
                single("status", json!(status.as_str())),
            )
            .await?;
        from_row(first_row(rows, BOOKINGS)?)
    }

    /// Active buildings only.
    pub async fn get_buildings(&self) -> Result<Vec<Building>, AppError> {
        let query = Query::table(BUILDINGS).eq("is_active", true);
        from_rows(self.store.select(&query).await?)
    }

    pub async fn add_building(&self, building: Row) -> Result<Building, AppError> {
        let rows = self.store.insert(BUILDINGS, vec![building]).await?;
        from_row(first_row(rows, BUILDINGS)?)
    }
}
