//! WorkStore - persistent record collections for the scheduler
//!
//! Stores one collection per entity type (stories, tasks, bugs, sprints),
//! each a JSON map of id -> record on disk. Every mutation is a
//! read-modify-write under an exclusive file lock, so concurrent callers
//! cannot lose updates.
//!
//! # Layout
//!
//! ```text
//! .sprintd/store/
//! ├── stories.json
//! ├── stories.lock
//! ├── sprints.json
//! └── ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! use workstore::{Record, Store};
//!
//! let store = Store::open(".sprintd/store")?;
//! store.insert(sprint)?;
//! let sprints: Vec<Sprint> = store.list()?;
//! ```

mod store;

pub use store::{Record, Store, StoreError, StoreResult};

/// Current Unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
