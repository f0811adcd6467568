use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::error::PortalError;
use crate::limits::*;
use crate::model::{Identity, is_valid_contact, now_ms};
use crate::store::{load_collection, write_collection};

/// Identity lookup capability injected into the scheduler. Test code swaps in
/// a stub; production uses [`FileDirectory`].
#[async_trait]
pub trait Directory: Send + Sync {
    async fn resolve(&self, pin: &str) -> Option<Identity>;
    fn is_admin(&self, identity: &Identity) -> bool;
}

/// PIN → identity map over `users.json`. Admin PINs come from configuration
/// so admin status cannot be minted through self-registration.
pub struct FileDirectory {
    path: PathBuf,
    users: DashMap<String, Identity>,
    admin_pins: HashSet<String>,
    /// Serializes register → persist sequences.
    write_lock: Mutex<()>,
}

impl FileDirectory {
    pub fn open(path: &Path, admin_pins: HashSet<String>) -> Self {
        let users = DashMap::new();
        for identity in load_collection::<Identity>(path) {
            users.insert(identity.pin.clone(), identity);
        }
        Self {
            path: path.to_path_buf(),
            users,
            admin_pins,
            write_lock: Mutex::new(()),
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn all_users(&self) -> Vec<Identity> {
        let mut users: Vec<Identity> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by_key(|u| u.created_at);
        users
    }

    /// Create a user with a freshly minted, unused PIN and persist the map.
    pub async fn register(&self, full_name: &str, contact: &str) -> Result<Identity, PortalError> {
        let full_name = full_name.trim();
        let contact = contact.trim();
        if full_name.len() < MIN_NAME_LEN {
            return Err(PortalError::InvalidInput(
                "full name must be at least 3 characters".into(),
            ));
        }
        if full_name.len() > MAX_NAME_LEN {
            return Err(PortalError::InvalidInput("full name too long".into()));
        }
        if !is_valid_contact(contact) {
            return Err(PortalError::InvalidInput(
                "contact must look like @username".into(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        let pin = self.mint_pin()?;
        let identity = Identity {
            pin: pin.clone(),
            full_name: full_name.to_string(),
            contact: contact.to_string(),
            created_at: now_ms(),
        };
        self.users.insert(pin.clone(), identity.clone());

        if let Err(e) = write_collection(&self.path, &self.all_users()) {
            self.users.remove(&pin);
            return Err(e.into());
        }
        Ok(identity)
    }

    /// Draw PIN candidates from ULID entropy until one is unused.
    fn mint_pin(&self) -> Result<String, PortalError> {
        let space = 10u128.pow(PIN_DIGITS as u32);
        for _ in 0..MAX_PIN_ATTEMPTS {
            let candidate = format!("{:0width$}", Ulid::new().random() % space, width = PIN_DIGITS);
            if !self.users.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(PortalError::Store("PIN space exhausted".into()))
    }
}

#[async_trait]
impl Directory for FileDirectory {
    async fn resolve(&self, pin: &str) -> Option<Identity> {
        self.users.get(pin.trim()).map(|e| e.value().clone())
    }

    fn is_admin(&self, identity: &Identity) -> bool {
        self.admin_pins.contains(&identity.pin)
    }
}
