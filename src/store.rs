use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::Booking;

/// Narrow persistence interface for the booking collection, so the backing
/// medium is swappable without touching the scheduler.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Bookings for one (room, date), sorted by start time. No side effects.
    async fn list_by_room_date(&self, room_id: &str, date: &str) -> Vec<Booking>;

    /// The booking with this id, if any.
    async fn find(&self, id: Ulid) -> Option<Booking>;

    /// Full snapshot of the collection.
    async fn all(&self) -> Vec<Booking>;

    /// Atomically overwrite the whole persisted set.
    async fn replace_all(&self, bookings: Vec<Booking>) -> io::Result<()>;

    /// Atomically swap one (room, date) partition and persist the entire
    /// updated set. Concurrent mutations of other days are never clobbered.
    async fn replace_day(&self, room_id: &str, date: &str, day: Vec<Booking>) -> io::Result<()>;
}

/// Read a JSON collection file. Missing or unreadable content degrades to the
/// empty collection (a fresh deployment has no file yet); the degradation is
/// logged, never silent.
pub(crate) fn load_collection<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!("cannot read {}: {e}; starting empty", path.display());
            return Vec::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!("corrupt collection {}: {e}; starting empty", path.display());
            Vec::new()
        }
    }
}

/// All-or-nothing collection write: serialize to a temp file, fsync, rename
/// over the target. Concurrent readers of the file only ever see the old or
/// the new content.
pub(crate) fn write_collection<T: Serialize>(path: &Path, items: &[T]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut payload =
        serde_json::to_vec_pretty(items).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    payload.push(b'\n');
    let mut file = File::create(&tmp)?;
    file.write_all(&payload)?;
    file.sync_all()?;
    std::fs::rename(&tmp, path)
}

enum StoreCommand {
    Flush {
        response: oneshot::Sender<io::Result<()>>,
    },
}

/// Background task that owns the collection file and batches flushes for
/// group commit:
/// 1. Block until the first Flush arrives.
/// 2. Drain all immediately available Flush requests.
/// 3. Snapshot the in-memory collection once, write it atomically.
/// 4. Respond to every waiter.
async fn store_writer_loop(
    path: PathBuf,
    bookings: Arc<RwLock<Vec<Booking>>>,
    mut rx: mpsc::Receiver<StoreCommand>,
) {
    while let Some(StoreCommand::Flush { response }) = rx.recv().await {
        let mut waiters = vec![response];
        while let Ok(StoreCommand::Flush { response }) = rx.try_recv() {
            waiters.push(response);
        }
        metrics::histogram!(crate::observability::STORE_FLUSH_BATCH_SIZE)
            .record(waiters.len() as f64);

        let snapshot = bookings.read().await.clone();
        let flush_start = std::time::Instant::now();
        let result = write_collection(&path, &snapshot);
        metrics::histogram!(crate::observability::STORE_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());

        for tx in waiters {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }
    }
}

/// File-backed store: authoritative copy in memory behind an `RwLock`, every
/// mutation flushed through the group-commit writer.
pub struct JsonStore {
    bookings: Arc<RwLock<Vec<Booking>>>,
    flush_tx: mpsc::Sender<StoreCommand>,
}

impl JsonStore {
    /// Load (or start empty) and spawn the writer task. Must be called from
    /// within a tokio runtime.
    pub fn open(path: &Path) -> Self {
        let bookings = Arc::new(RwLock::new(load_collection(path)));
        let (flush_tx, flush_rx) = mpsc::channel(1024);
        tokio::spawn(store_writer_loop(path.to_path_buf(), bookings.clone(), flush_rx));
        Self { bookings, flush_tx }
    }

    async fn flush(&self) -> io::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.flush_tx
            .send(StoreCommand::Flush { response: tx })
            .await
            .map_err(|_| io::Error::other("store writer shut down"))?;
        rx.await
            .map_err(|_| io::Error::other("store writer dropped response"))?
    }
}

#[async_trait]
impl BookingStore for JsonStore {
    async fn list_by_room_date(&self, room_id: &str, date: &str) -> Vec<Booking> {
        let guard = self.bookings.read().await;
        let mut day: Vec<Booking> = guard
            .iter()
            .filter(|b| b.room_id == room_id && b.date == date)
            .cloned()
            .collect();
        day.sort_by_key(|b| b.span.start);
        day
    }

    async fn find(&self, id: Ulid) -> Option<Booking> {
        self.bookings.read().await.iter().find(|b| b.id == id).cloned()
    }

    async fn all(&self) -> Vec<Booking> {
        self.bookings.read().await.clone()
    }

    async fn replace_all(&self, bookings: Vec<Booking>) -> io::Result<()> {
        {
            *self.bookings.write().await = bookings;
        }
        self.flush().await
    }

    async fn replace_day(&self, room_id: &str, date: &str, day: Vec<Booking>) -> io::Result<()> {
        {
            let mut guard = self.bookings.write().await;
            guard.retain(|b| !(b.room_id == room_id && b.date == date));
            guard.extend(day);
        }
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Span, now_ms};

    fn test_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("huddle_test_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn booking(room_id: &str, date: &str, start: i32, end: i32) -> Booking {
        Booking {
            id: Ulid::new(),
            room_id: room_id.into(),
            date: date.into(),
            span: Span::new(start, end),
            owner_pin: "1111".into(),
            owner_name: "Test User".into(),
            owner_contact: "@test_user".into(),
            topic: "sync".into(),
            created_at: now_ms(),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let path = test_path("missing.json");
        let store = JsonStore::open(&path);
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let path = test_path("corrupt.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let store = JsonStore::open(&path);
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn replace_day_then_list_sorted() {
        let path = test_path("list_sorted.json");
        let store = JsonStore::open(&path);

        let late = booking("r1", "2026-03-02", 660, 720);
        let early = booking("r1", "2026-03-02", 540, 600);
        store
            .replace_day("r1", "2026-03-02", vec![late.clone(), early.clone()])
            .await
            .unwrap();

        let day = store.list_by_room_date("r1", "2026-03-02").await;
        assert_eq!(day, vec![early, late]);
    }

    #[tokio::test]
    async fn list_filters_room_and_date() {
        let path = test_path("filters.json");
        let store = JsonStore::open(&path);

        store
            .replace_day("r1", "2026-03-02", vec![booking("r1", "2026-03-02", 540, 600)])
            .await
            .unwrap();
        store
            .replace_day("r2", "2026-03-02", vec![booking("r2", "2026-03-02", 540, 600)])
            .await
            .unwrap();
        store
            .replace_day("r1", "2026-03-03", vec![booking("r1", "2026-03-03", 540, 600)])
            .await
            .unwrap();

        assert_eq!(store.list_by_room_date("r1", "2026-03-02").await.len(), 1);
        assert_eq!(store.list_by_room_date("r2", "2026-03-02").await.len(), 1);
        assert_eq!(store.list_by_room_date("r1", "2026-03-04").await.len(), 0);
        assert_eq!(store.all().await.len(), 3);
    }

    #[tokio::test]
    async fn replace_day_leaves_other_days_alone() {
        let path = test_path("other_days.json");
        let store = JsonStore::open(&path);

        let keep = booking("r1", "2026-03-02", 540, 600);
        store
            .replace_day("r1", "2026-03-02", vec![keep.clone()])
            .await
            .unwrap();
        store
            .replace_day("r1", "2026-03-03", vec![booking("r1", "2026-03-03", 540, 600)])
            .await
            .unwrap();

        // Clearing one day must not disturb the other.
        store.replace_day("r1", "2026-03-03", vec![]).await.unwrap();
        assert_eq!(store.list_by_room_date("r1", "2026-03-02").await, vec![keep]);
        assert!(store.list_by_room_date("r1", "2026-03-03").await.is_empty());
    }

    #[tokio::test]
    async fn find_by_id() {
        let path = test_path("find.json");
        let store = JsonStore::open(&path);

        let b = booking("r1", "2026-03-02", 540, 600);
        store.replace_day("r1", "2026-03-02", vec![b.clone()]).await.unwrap();

        assert_eq!(store.find(b.id).await, Some(b));
        assert_eq!(store.find(Ulid::new()).await, None);
    }

    #[tokio::test]
    async fn persisted_set_survives_reopen() {
        let path = test_path("reopen.json");
        let b = booking("r1", "2026-03-02", 540, 660);
        {
            let store = JsonStore::open(&path);
            store.replace_day("r1", "2026-03-02", vec![b.clone()]).await.unwrap();
        }

        let reopened = JsonStore::open(&path);
        assert_eq!(reopened.list_by_room_date("r1", "2026-03-02").await, vec![b]);
    }

    #[tokio::test]
    async fn persisted_file_is_a_plain_json_array() {
        let path = test_path("format.json");
        let store = JsonStore::open(&path);
        let b = booking("r1", "2026-03-02", 570, 630);
        store.replace_day("r1", "2026-03-02", vec![b]).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["roomId"], "r1");
        assert_eq!(arr[0]["date"], "2026-03-02");
        assert_eq!(arr[0]["startTime"], serde_json::json!(9.5));
        assert_eq!(arr[0]["endTime"], serde_json::json!(10.5));
    }

    #[tokio::test]
    async fn replace_all_overwrites_everything() {
        let path = test_path("replace_all.json");
        let store = JsonStore::open(&path);

        store
            .replace_day("r1", "2026-03-02", vec![booking("r1", "2026-03-02", 540, 600)])
            .await
            .unwrap();
        let only = booking("r2", "2026-03-05", 600, 660);
        store.replace_all(vec![only.clone()]).await.unwrap();

        assert_eq!(store.all().await, vec![only]);
        assert!(store.list_by_room_date("r1", "2026-03-02").await.is_empty());
    }

    #[tokio::test]
    async fn no_temp_file_left_behind() {
        let path = test_path("tmpfile.json");
        let store = JsonStore::open(&path);
        store
            .replace_day("r1", "2026-03-02", vec![booking("r1", "2026-03-02", 540, 600)])
            .await
            .unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
