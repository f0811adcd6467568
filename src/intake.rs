use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::error::PortalError;
use crate::limits::*;
use crate::model::{Identity, now_ms};
use crate::store::{load_collection, write_collection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketKind {
    Error,
    Suggestion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Ulid,
    pub pin: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub contact: String,
    #[serde(rename = "type")]
    pub kind: TicketKind,
    pub module: String,
    /// Only error tickets carry a category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub description: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: Ulid,
    pub pin: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub contact: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// Dropdown values offered by the portal form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeConfig {
    pub modules: Vec<String>,
    #[serde(rename = "errorCategories")]
    pub error_categories: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            modules: ["Booking", "Schedule", "Profile", "Other"]
                .map(String::from)
                .to_vec(),
            error_categories: ["Display", "Wrong data", "Access", "Other"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Ticket and suggestion intake. Simple append-then-persist handlers; the
/// only invariants are input validation and the atomic collection write.
pub struct Intake {
    config: IntakeConfig,
    tickets_path: PathBuf,
    suggestions_path: PathBuf,
    tickets: RwLock<Vec<Ticket>>,
    suggestions: RwLock<Vec<Suggestion>>,
}

impl Intake {
    pub fn open(data_dir: &Path, config: IntakeConfig) -> Self {
        let tickets_path = data_dir.join("tickets.json");
        let suggestions_path = data_dir.join("suggestions.json");
        let tickets = RwLock::new(load_collection(&tickets_path));
        let suggestions = RwLock::new(load_collection(&suggestions_path));
        Self {
            config,
            tickets_path,
            suggestions_path,
            tickets,
            suggestions,
        }
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub async fn submit_ticket(
        &self,
        identity: &Identity,
        kind: TicketKind,
        module: &str,
        category: Option<&str>,
        description: &str,
    ) -> Result<Ticket, PortalError> {
        let module = module.trim();
        let description = description.trim();
        if !self.config.modules.iter().any(|m| m == module) {
            return Err(PortalError::InvalidInput(format!("unknown module: {module}")));
        }
        let category = match kind {
            TicketKind::Error => {
                let category = category.unwrap_or("").trim();
                if !self.config.error_categories.iter().any(|c| c == category) {
                    return Err(PortalError::InvalidInput(format!(
                        "unknown error category: {category}"
                    )));
                }
                Some(category.to_string())
            }
            // Suggestions have no category; a stray one is dropped.
            TicketKind::Suggestion => None,
        };
        if description.len() < MIN_DESCRIPTION_LEN {
            return Err(PortalError::InvalidInput(
                "describe the problem in at least 10 characters".into(),
            ));
        }
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(PortalError::InvalidInput("description too long".into()));
        }

        let ticket = Ticket {
            id: Ulid::new(),
            pin: identity.pin.clone(),
            full_name: identity.full_name.clone(),
            contact: identity.contact.clone(),
            kind,
            module: module.to_string(),
            category,
            description: description.to_string(),
            created_at: now_ms(),
        };

        let mut guard = self.tickets.write().await;
        guard.push(ticket.clone());
        if let Err(e) = write_collection(&self.tickets_path, &guard) {
            guard.pop();
            return Err(e.into());
        }
        Ok(ticket)
    }

    pub async fn submit_suggestion(
        &self,
        identity: &Identity,
        text: &str,
    ) -> Result<Suggestion, PortalError> {
        let text = text.trim();
        if text.len() < MIN_SUGGESTION_LEN {
            return Err(PortalError::InvalidInput(
                "suggestion must be at least 5 characters".into(),
            ));
        }
        if text.len() > MAX_SUGGESTION_LEN {
            return Err(PortalError::InvalidInput("suggestion too long".into()));
        }

        let suggestion = Suggestion {
            id: Ulid::new(),
            pin: identity.pin.clone(),
            full_name: identity.full_name.clone(),
            contact: identity.contact.clone(),
            text: text.to_string(),
            created_at: now_ms(),
        };

        let mut guard = self.suggestions.write().await;
        guard.push(suggestion.clone());
        if let Err(e) = write_collection(&self.suggestions_path, &guard) {
            guard.pop();
            return Err(e.into());
        }
        Ok(suggestion)
    }

    pub async fn tickets(&self) -> Vec<Ticket> {
        self.tickets.read().await.clone()
    }

    pub async fn suggestions(&self) -> Vec<Suggestion> {
        self.suggestions.read().await.clone()
    }
}
