use serde::Serialize;
use ulid::Ulid;

use super::Scheduler;
use crate::error::PortalError;
use crate::model::{Span, is_valid_date};

/// One rendered day for one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayGrid {
    #[serde(rename = "roomId")]
    pub room_id: String,
    pub date: String,
    pub slots: Vec<GridSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridSlot {
    #[serde(flatten)]
    pub span: Span,
    #[serde(flatten)]
    pub state: SlotState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SlotState {
    Free,
    Busy {
        #[serde(rename = "bookingId")]
        booking_id: Ulid,
        topic: String,
        #[serde(rename = "ownerName")]
        owner_name: String,
        #[serde(rename = "ownerContact")]
        owner_contact: String,
        /// The booking's full displayed range, present only on its first slot.
        #[serde(skip_serializing_if = "Option::is_none")]
        range: Option<Span>,
    },
}

impl Scheduler {
    /// Render the day's slot grid for one room: each step-sized slot is free
    /// or busy with the covering booking. Pure function of the stored set;
    /// identical stored data yields identical output.
    pub async fn build_grid(&self, room_id: &str, date: &str) -> Result<DayGrid, PortalError> {
        if self.room(room_id).is_none() {
            return Err(PortalError::RoomNotFound(room_id.to_string()));
        }
        if !is_valid_date(date) {
            return Err(PortalError::InvalidInput("date must be YYYY-MM-DD".into()));
        }

        let day = self.store.list_by_room_date(room_id, date).await;
        let slots = self
            .grid
            .slots()
            .map(|slot| {
                let state = match day.iter().find(|b| b.span.contains_instant(slot.start)) {
                    Some(b) => SlotState::Busy {
                        booking_id: b.id,
                        topic: b.topic.clone(),
                        owner_name: b.owner_name.clone(),
                        owner_contact: b.owner_contact.clone(),
                        range: (b.span.start == slot.start).then_some(b.span),
                    },
                    None => SlotState::Free,
                };
                GridSlot { span: slot, state }
            })
            .collect();

        Ok(DayGrid {
            room_id: room_id.to_string(),
            date: date.to_string(),
            slots,
        })
    }
}
