use std::io;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use ulid::Ulid;

use crate::directory::Directory;
use crate::error::PortalError;
use crate::intake::TicketKind;
use crate::limits::MAX_LINE_LEN;
use crate::model::{Identity, Span};
use crate::observability;
use crate::portal::Portal;
use crate::scheduler::{AllocateRequest, CancelOutcome, CancelRequest};

/// One request line. The field names are the external contract: booking
/// bounds travel as `startTime`/`endTime` fractional hours, identities as
/// `ownerPin`, and a partial cancel carries `cancelRange`.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Login {
        pin: String,
    },
    Register {
        #[serde(rename = "fullName")]
        full_name: String,
        contact: String,
    },
    Settings,
    Rooms,
    CrmConfig,
    Schedule {
        #[serde(rename = "roomId")]
        room_id: String,
        date: String,
    },
    ListBookings {
        #[serde(rename = "roomId")]
        room_id: String,
        date: String,
    },
    CreateBooking {
        #[serde(rename = "ownerPin")]
        owner_pin: String,
        #[serde(rename = "roomId")]
        room_id: String,
        date: String,
        #[serde(flatten)]
        span: Span,
        topic: String,
    },
    CancelBooking {
        #[serde(rename = "ownerPin")]
        owner_pin: String,
        #[serde(rename = "bookingId")]
        booking_id: Ulid,
        #[serde(rename = "cancelRange", default)]
        cancel_range: Option<Span>,
    },
    SubmitTicket {
        pin: String,
        #[serde(rename = "type")]
        kind: TicketKind,
        module: String,
        #[serde(default)]
        category: Option<String>,
        description: String,
    },
    SubmitSuggestion {
        pin: String,
        text: String,
    },
    AdminBookings {
        pin: String,
    },
    AdminUsers {
        pin: String,
    },
    AdminTickets {
        pin: String,
    },
    AdminSuggestions {
        pin: String,
    },
}

/// Serve one client: newline-delimited JSON requests in, one envelope per
/// line out. Protocol errors never tear the connection down; only transport
/// errors do.
pub async fn process_connection(socket: TcpStream, portal: Arc<Portal>) -> io::Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    while let Some(line) = framed.next().await {
        let line = line.map_err(io::Error::other)?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(&portal, &line).await;
        framed.send(reply.to_string()).await.map_err(io::Error::other)?;
    }
    Ok(())
}

async fn handle_line(portal: &Portal, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            metrics::counter!(observability::REQUESTS_TOTAL, "op" => "invalid", "status" => "400")
                .increment(1);
            return json!({ "status": 400, "message": format!("bad request: {e}") });
        }
    };

    let label = observability::request_label(&request);
    let started = std::time::Instant::now();
    let outcome = dispatch(portal, request).await;
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => label)
        .record(started.elapsed().as_secs_f64());

    match outcome {
        Ok((status, mut body)) => {
            metrics::counter!(observability::REQUESTS_TOTAL, "op" => label, "status" => status.to_string())
                .increment(1);
            if let Value::Object(map) = &mut body {
                map.insert("status".into(), json!(status));
            }
            body
        }
        Err(e) => {
            let status = e.status();
            metrics::counter!(observability::REQUESTS_TOTAL, "op" => label, "status" => status.to_string())
                .increment(1);
            tracing::debug!("{label} failed: {e}");
            json!({ "status": status, "message": e.to_string() })
        }
    }
}

async fn dispatch(portal: &Portal, request: Request) -> Result<(u16, Value), PortalError> {
    match request {
        Request::Login { pin } => {
            let identity = portal
                .directory
                .resolve(&pin)
                .await
                .ok_or(PortalError::Unauthorized)?;
            let admin = portal.directory.is_admin(&identity);
            Ok((200, identity_body(&identity, admin)))
        }
        Request::Register { full_name, contact } => {
            let identity = portal.directory.register(&full_name, &contact).await?;
            Ok((201, identity_body(&identity, false)))
        }
        Request::Settings => {
            let grid = portal.scheduler.grid();
            Ok((
                200,
                json!({
                    "appName": portal.app_name,
                    "openHour": f64::from(grid.open) / 60.0,
                    "closeHour": f64::from(grid.close) / 60.0,
                    "step": f64::from(grid.step) / 60.0,
                }),
            ))
        }
        Request::Rooms => Ok((200, json!({ "rooms": portal.scheduler.rooms() }))),
        Request::CrmConfig => Ok((200, serde_json::to_value(portal.intake.config())?)),
        Request::Schedule { room_id, date } => {
            let grid = portal.scheduler.build_grid(&room_id, &date).await?;
            Ok((200, serde_json::to_value(grid)?))
        }
        Request::ListBookings { room_id, date } => {
            let bookings = portal.scheduler.list_bookings(&room_id, &date).await?;
            Ok((200, json!({ "bookings": bookings })))
        }
        Request::CreateBooking {
            owner_pin,
            room_id,
            date,
            span,
            topic,
        } => {
            let booking = portal
                .scheduler
                .allocate(AllocateRequest {
                    owner_pin,
                    room_id,
                    date,
                    span,
                    topic,
                })
                .await?;
            Ok((201, serde_json::to_value(booking)?))
        }
        Request::CancelBooking {
            owner_pin,
            booking_id,
            cancel_range,
        } => {
            let outcome = portal
                .scheduler
                .cancel(CancelRequest {
                    requester_pin: owner_pin,
                    booking_id,
                    slot: cancel_range,
                })
                .await?;
            let body = match outcome {
                CancelOutcome::Removed => json!({ "message": "booking removed" }),
                CancelOutcome::Shrunk(booking) => {
                    json!({ "message": "slot released", "booking": booking })
                }
                CancelOutcome::Split(front, tail) => {
                    json!({ "message": "slot released", "bookings": [front, tail] })
                }
            };
            Ok((200, body))
        }
        Request::SubmitTicket {
            pin,
            kind,
            module,
            category,
            description,
        } => {
            let identity = portal
                .directory
                .resolve(&pin)
                .await
                .ok_or(PortalError::Unauthorized)?;
            let ticket = portal
                .intake
                .submit_ticket(&identity, kind, &module, category.as_deref(), &description)
                .await?;
            Ok((201, json!({ "message": "ticket accepted", "id": ticket.id })))
        }
        Request::SubmitSuggestion { pin, text } => {
            let identity = portal
                .directory
                .resolve(&pin)
                .await
                .ok_or(PortalError::Unauthorized)?;
            let suggestion = portal.intake.submit_suggestion(&identity, &text).await?;
            Ok((201, json!({ "message": "suggestion accepted", "id": suggestion.id })))
        }
        Request::AdminBookings { pin } => {
            require_admin(portal, &pin).await?;
            Ok((200, json!({ "bookings": portal.scheduler.all_bookings().await })))
        }
        Request::AdminUsers { pin } => {
            require_admin(portal, &pin).await?;
            Ok((200, json!({ "users": portal.directory.all_users() })))
        }
        Request::AdminTickets { pin } => {
            require_admin(portal, &pin).await?;
            Ok((200, json!({ "tickets": portal.intake.tickets().await })))
        }
        Request::AdminSuggestions { pin } => {
            require_admin(portal, &pin).await?;
            Ok((200, json!({ "suggestions": portal.intake.suggestions().await })))
        }
    }
}

fn identity_body(identity: &Identity, admin: bool) -> Value {
    json!({
        "pin": identity.pin,
        "fullName": identity.full_name,
        "contact": identity.contact,
        "admin": admin,
    })
}

async fn require_admin(portal: &Portal, pin: &str) -> Result<(), PortalError> {
    let identity = portal
        .directory
        .resolve(pin)
        .await
        .ok_or(PortalError::Unauthorized)?;
    if !portal.directory.is_admin(&identity) {
        return Err(PortalError::Forbidden);
    }
    Ok(())
}
