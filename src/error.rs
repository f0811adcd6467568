use ulid::Ulid;

/// Service-wide error taxonomy. Every variant maps to one wire status; none
/// are retried internally.
#[derive(Debug)]
pub enum PortalError {
    InvalidInput(String),
    Unauthorized,
    Forbidden,
    RoomNotFound(String),
    BookingNotFound(Ulid),
    Conflict(Ulid),
    Store(String),
}

impl PortalError {
    /// HTTP-status-equivalent classification for the wire envelope.
    pub fn status(&self) -> u16 {
        match self {
            PortalError::InvalidInput(_) => 400,
            PortalError::Unauthorized => 401,
            PortalError::Forbidden => 403,
            PortalError::RoomNotFound(_) | PortalError::BookingNotFound(_) => 404,
            PortalError::Conflict(_) => 409,
            PortalError::Store(_) => 500,
        }
    }
}

impl std::fmt::Display for PortalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortalError::InvalidInput(msg) => write!(f, "{msg}"),
            PortalError::Unauthorized => write!(f, "unknown PIN"),
            PortalError::Forbidden => write!(f, "not allowed to change this booking"),
            PortalError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            PortalError::BookingNotFound(id) => write!(f, "booking not found: {id}"),
            PortalError::Conflict(id) => {
                write!(f, "interval already taken by booking {id}")
            }
            PortalError::Store(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for PortalError {}

impl From<std::io::Error> for PortalError {
    fn from(e: std::io::Error) -> Self {
        PortalError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(e: serde_json::Error) -> Self {
        PortalError::Store(e.to_string())
    }
}
