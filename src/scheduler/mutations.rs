use ulid::Ulid;

use super::Scheduler;
use crate::error::PortalError;
use crate::limits::MAX_TOPIC_LEN;
use crate::model::{Booking, Span, is_valid_date, now_ms};

#[derive(Debug, Clone)]
pub struct AllocateRequest {
    pub owner_pin: String,
    pub room_id: String,
    pub date: String,
    pub span: Span,
    pub topic: String,
}

#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub requester_pin: String,
    pub booking_id: Ulid,
    /// Absent for a full cancel; a single step-sized sub-slot otherwise.
    pub slot: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The booking is gone entirely.
    Removed,
    /// The booking lost one edge slot.
    Shrunk(Booking),
    /// An interior slot was released: the original (truncated) and the new
    /// tail booking.
    Split(Booking, Booking),
}

impl Scheduler {
    /// Reserve an interval. Validation order is part of the contract:
    /// identity, room, then input shape; the overlap check runs inside the
    /// day lock so two racing requests cannot both pass it.
    pub async fn allocate(&self, req: AllocateRequest) -> Result<Booking, PortalError> {
        let identity = self.resolve_identity(&req.owner_pin).await?;
        if self.room(&req.room_id).is_none() {
            return Err(PortalError::RoomNotFound(req.room_id));
        }
        if !is_valid_date(&req.date) {
            return Err(PortalError::InvalidInput("date must be YYYY-MM-DD".into()));
        }
        let topic = req.topic.trim();
        if topic.is_empty() {
            return Err(PortalError::InvalidInput("topic must not be empty".into()));
        }
        if topic.len() > MAX_TOPIC_LEN {
            return Err(PortalError::InvalidInput("topic too long".into()));
        }
        self.grid
            .validate(&req.span)
            .map_err(|msg| PortalError::InvalidInput(msg.into()))?;

        let lock = self.day_lock(&req.room_id, &req.date);
        let _guard = lock.lock().await;

        let mut day = self.store.list_by_room_date(&req.room_id, &req.date).await;
        for existing in &day {
            if existing.span.overlaps(&req.span) {
                return Err(PortalError::Conflict(existing.id));
            }
        }

        let booking = Booking {
            id: Ulid::new(),
            room_id: req.room_id.clone(),
            date: req.date.clone(),
            span: req.span,
            owner_pin: identity.pin,
            owner_name: identity.full_name,
            owner_contact: identity.contact,
            topic: topic.to_string(),
            created_at: now_ms(),
        };
        day.push(booking.clone());
        self.store.replace_day(&req.room_id, &req.date, day).await?;
        Ok(booking)
    }

    /// Cancel a booking outright, or release one slot of it (shrinking or
    /// splitting the remainder). Only the owner or an admin may do either.
    pub async fn cancel(&self, req: CancelRequest) -> Result<CancelOutcome, PortalError> {
        let identity = self.resolve_identity(&req.requester_pin).await?;
        let target = self
            .store
            .find(req.booking_id)
            .await
            .ok_or(PortalError::BookingNotFound(req.booking_id))?;
        if target.owner_pin != identity.pin && !self.directory.is_admin(&identity) {
            return Err(PortalError::Forbidden);
        }

        let lock = self.day_lock(&target.room_id, &target.date);
        let _guard = lock.lock().await;

        // Re-read under the lock: the booking may have been reshaped or
        // removed between `find` and here.
        let mut day = self
            .store
            .list_by_room_date(&target.room_id, &target.date)
            .await;
        let pos = day
            .iter()
            .position(|b| b.id == req.booking_id)
            .ok_or(PortalError::BookingNotFound(req.booking_id))?;
        let booking = day[pos].clone();

        let outcome = match req.slot {
            None => {
                day.remove(pos);
                CancelOutcome::Removed
            }
            Some(slot) if slot.start >= slot.end => {
                return Err(PortalError::InvalidInput(
                    "cancel range start must be before its end".into(),
                ));
            }
            // A range covering the whole booking is a full cancel.
            Some(slot) if slot.contains_span(&booking.span) => {
                day.remove(pos);
                CancelOutcome::Removed
            }
            Some(slot) => {
                let step = self.grid.step;
                if slot.duration() != step || !self.grid.is_aligned(slot.start) {
                    return Err(PortalError::InvalidInput(
                        "cancel range must be a single slot".into(),
                    ));
                }
                let h = slot.start;
                if !booking.span.contains_instant(h) {
                    return Err(PortalError::InvalidInput(
                        "cancel range is outside the booking".into(),
                    ));
                }

                if booking.span.duration() <= step {
                    day.remove(pos);
                    CancelOutcome::Removed
                } else if h == booking.span.start {
                    day[pos].span.start += step;
                    CancelOutcome::Shrunk(day[pos].clone())
                } else if h == booking.span.end - step {
                    day[pos].span.end -= step;
                    CancelOutcome::Shrunk(day[pos].clone())
                } else {
                    // Interior slot: the original keeps its identity up to the
                    // released slot; a new booking covers the tail.
                    let tail = Booking {
                        id: Ulid::new(),
                        span: Span::new(h + step, booking.span.end),
                        created_at: now_ms(),
                        ..booking.clone()
                    };
                    day[pos].span.end = h;
                    let front = day[pos].clone();
                    day.push(tail.clone());
                    CancelOutcome::Split(front, tail)
                }
            }
        };

        self.store
            .replace_day(&target.room_id, &target.date, day)
            .await?;
        Ok(outcome)
    }
}
