//! Session context: one store, one gateway, one set of guards.
//!
//! A `Session` is built once per client session and dropped with it. Several
//! sessions may live in one process; they share nothing.

use super::guard::KeyedLocks;
use super::retry::with_retry;
use super::ActionResult;
use crate::config::SessionConfig;
use crate::model::note::{Note, NoteId};
use crate::remote::{Gateway, RemoteResult, RemoteStore};
use crate::store::Store;
use log::{debug, info};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Shape of a note-list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Listing {
    /// Every note; replaces both the visible and the complete list.
    Full,
    /// Search hits; narrows only the visible list.
    SearchHits,
}

pub struct Session {
    pub(super) gateway: Gateway,
    pub(super) store: Arc<Store>,
    pub(super) config: SessionConfig,
    note_locks: KeyedLocks,
    /// Last ticket issued for a whole-list replacement of `notes`.
    list_ticket: AtomicU64,
}

impl Session {
    pub fn new(remote: Arc<dyn RemoteStore>, config: SessionConfig) -> Self {
        let store = Arc::new(Store::new(config.event_capacity));
        info!(
            "event=session_start module=service status=ok retry_attempts={} lock_timeout_ms={}",
            config.retry.max_attempts, config.mutation_lock_timeout_ms
        );
        Self {
            gateway: Gateway::new(remote),
            store,
            config,
            note_locks: KeyedLocks::default(),
            list_ticket: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(remote: Arc<dyn RemoteStore>) -> Self {
        Self::new(remote, SessionConfig::default())
    }

    /// Read side of the session state; subscribe here for change events.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Reloads notes, tags and folders concurrently.
    pub async fn refresh_all(&self) -> ActionResult<()> {
        tokio::try_join!(self.load_notes(), self.load_tags(), self.load_folders())?;
        Ok(())
    }

    pub(super) async fn retrying<T, F, Fut>(&self, op: &'static str, call: F) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        with_retry(&self.config.retry, op, call).await
    }

    pub(super) async fn lock_note(&self, id: NoteId) -> ActionResult<OwnedMutexGuard<()>> {
        self.note_locks
            .acquire(id, self.config.mutation_lock_timeout())
            .await
    }

    pub(super) fn issue_list_ticket(&self) -> u64 {
        self.list_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(super) fn is_latest_ticket(&self, ticket: u64) -> bool {
        self.list_ticket.load(Ordering::SeqCst) == ticket
    }

    /// Commits a list response unless a newer list request was issued.
    pub(super) fn commit_listing(
        &self,
        op: &'static str,
        ticket: u64,
        listing: Listing,
        notes: Vec<Note>,
    ) -> bool {
        let count = notes.len();
        let is_current = || self.is_latest_ticket(ticket);
        let applied = match listing {
            Listing::Full => self.store.replace_notes_if(notes, is_current),
            Listing::SearchHits => self.store.replace_search_hits_if(notes, is_current),
        };
        if applied {
            debug!("event=list_commit module=service op={op} status=ok ticket={ticket} count={count}");
        } else {
            debug!("event=list_commit module=service op={op} status=stale ticket={ticket}");
        }
        applied
    }
}
