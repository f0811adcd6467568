use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::directory::FileDirectory;
use crate::intake::{Intake, IntakeConfig};
use crate::model::{Room, SlotGrid};
use crate::scheduler::Scheduler;
use crate::store::{JsonStore, load_collection};

pub struct PortalConfig {
    pub data_dir: PathBuf,
    pub grid: SlotGrid,
    pub admin_pins: HashSet<String>,
    pub app_name: String,
}

/// One deployment's wired-up service: scheduler over the JSON data dir,
/// identity directory, intake, and presentation settings.
pub struct Portal {
    pub scheduler: Scheduler,
    pub directory: Arc<FileDirectory>,
    pub intake: Intake,
    pub app_name: String,
}

impl Portal {
    /// Build the service over `data_dir`, creating it if needed. Must be
    /// called from within a tokio runtime (the store spawns its writer).
    pub fn open(config: PortalConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let rooms: Vec<Room> = load_collection(&config.data_dir.join("rooms.json"));
        if rooms.is_empty() {
            tracing::warn!("no rooms configured; every booking will fail until rooms.json exists");
        }

        let store = Arc::new(JsonStore::open(&config.data_dir.join("bookings.json")));
        let directory = Arc::new(FileDirectory::open(
            &config.data_dir.join("users.json"),
            config.admin_pins,
        ));
        let intake = Intake::open(&config.data_dir, load_intake_config(&config.data_dir));
        let scheduler = Scheduler::new(config.grid, store, directory.clone(), rooms);

        Ok(Self {
            scheduler,
            directory,
            intake,
            app_name: config.app_name,
        })
    }
}

fn load_intake_config(data_dir: &std::path::Path) -> IntakeConfig {
    let path = data_dir.join("crm-config.json");
    match std::fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!("corrupt {}: {e}; using default form values", path.display());
            IntakeConfig::default()
        }),
        Err(_) => IntakeConfig::default(),
    }
}
