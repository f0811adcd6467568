use super::Scheduler;
use crate::error::PortalError;
use crate::model::{Booking, is_valid_date};

impl Scheduler {
    /// Bookings for one room and date, sorted by start time.
    pub async fn list_bookings(
        &self,
        room_id: &str,
        date: &str,
    ) -> Result<Vec<Booking>, PortalError> {
        if self.room(room_id).is_none() {
            return Err(PortalError::RoomNotFound(room_id.to_string()));
        }
        if !is_valid_date(date) {
            return Err(PortalError::InvalidInput("date must be YYYY-MM-DD".into()));
        }
        Ok(self.store.list_by_room_date(room_id, date).await)
    }

    /// Full collection snapshot for the admin view.
    pub async fn all_bookings(&self) -> Vec<Booking> {
        self.store.all().await
    }
}
