//! Core data layer for Recall notes.
//!
//! Holds the entity model, the remote gateway with its SQLite and in-memory
//! backends, the observable session store and the actions that tie them
//! together. Presentation layers only read the store and call actions.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod service;
pub mod store;

pub use config::{ConfigError, RetryPolicy, SessionConfig};
pub use db::{DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::folder::{Folder, FolderId, FolderRecord};
pub use model::note::{Note, NoteId};
pub use model::tag::{Tag, TagId};
pub use model::ValidationError;
pub use remote::memory::InMemoryRemoteStore;
pub use remote::sqlite::SqliteRemoteStore;
pub use remote::{Gateway, RemoteError, RemoteErrorKind, RemoteResult, RemoteStore};
pub use service::{ActionError, ActionResult, Session};
pub use store::{Store, StoreEvent};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
