mod grid;
mod mutations;
mod queries;

pub use grid::{DayGrid, GridSlot, SlotState};
pub use mutations::{AllocateRequest, CancelOutcome, CancelRequest};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::directory::Directory;
use crate::error::PortalError;
use crate::model::{Identity, Room, SlotGrid};
use crate::store::BookingStore;

/// The booking scheduler: the only component that creates or mutates
/// bookings. Reads (list, grid) go straight to the store snapshot; every
/// mutation runs inside the per-(room, date) critical section.
pub struct Scheduler {
    pub(crate) grid: SlotGrid,
    pub(crate) store: Arc<dyn BookingStore>,
    pub(crate) directory: Arc<dyn Directory>,
    rooms: Vec<Room>,
    /// Mutation locks keyed by (roomId, date). Never taken by reads. Grows
    /// with the number of distinct days ever touched, which is fine for a
    /// single-deployment portal.
    day_locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl Scheduler {
    pub fn new(
        grid: SlotGrid,
        store: Arc<dyn BookingStore>,
        directory: Arc<dyn Directory>,
        rooms: Vec<Room>,
    ) -> Self {
        Self {
            grid,
            store,
            directory,
            rooms,
            day_locks: DashMap::new(),
        }
    }

    pub fn grid(&self) -> &SlotGrid {
        &self.grid
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub(crate) fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub(crate) fn day_lock(&self, room_id: &str, date: &str) -> Arc<Mutex<()>> {
        self.day_locks
            .entry((room_id.to_string(), date.to_string()))
            .or_default()
            .clone()
    }

    pub(crate) async fn resolve_identity(&self, pin: &str) -> Result<Identity, PortalError> {
        self.directory
            .resolve(pin)
            .await
            .ok_or(PortalError::Unauthorized)
    }
}
