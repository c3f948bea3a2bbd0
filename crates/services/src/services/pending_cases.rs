//! Continuously-correct snapshot of cases awaiting scheduling.
//!
//! A background task owns an in-memory replica of the requested-status
//! cases (joined with customer display fields) and keeps it consistent
//! with the database by listening to the case change feed. Consumers hold
//! a [`PendingCaseWatcher`]: they read atomic snapshots, subscribe to
//! snapshot changes, trigger manual refreshes, and close the task when
//! done. The replica is read-through and eventually consistent; the
//! database remains the source of truth.

use std::{future, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::case::{CasePriority, CaseStatus, PendingCaseView};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::events::{CaseEvent, CaseEvents, CaseOp};

#[derive(Debug, Error)]
pub enum PendingCaseError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read side of the store as seen by the cache. The production
/// implementation queries SQLite; tests substitute scripted stores.
#[async_trait]
pub trait PendingStore: Send + Sync {
    async fn fetch_pending(&self) -> Result<Vec<PendingCaseView>, PendingCaseError>;
}

pub struct SqlitePendingStore {
    pool: SqlitePool,
}

impl SqlitePendingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PendingStore for SqlitePendingStore {
    async fn fetch_pending(&self) -> Result<Vec<PendingCaseView>, PendingCaseError> {
        Ok(db::models::case::Case::find_pending_with_customers(&self.pool).await?)
    }
}

/// Counts derived from a snapshot at publication time. Staleness is not
/// re-evaluated between refreshes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct PendingStats {
    pub total_count: usize,
    pub urgent_count: usize,
    pub stale_count: usize,
}

impl PendingStats {
    pub fn compute(
        cases: &[PendingCaseView],
        now: DateTime<Utc>,
        stale_after: chrono::Duration,
    ) -> Self {
        Self {
            total_count: cases.len(),
            urgent_count: cases
                .iter()
                .filter(|c| c.priority == CasePriority::Urgent)
                .count(),
            stale_count: cases
                .iter()
                .filter(|c| now - c.created_at > stale_after)
                .count(),
        }
    }
}

/// One published snapshot. `loading` is true only until the first fetch
/// settles; `error` carries the last fetch failure and clears on the next
/// successful refresh; `feed_down` reports a closed change feed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PendingCasesState {
    pub cases: Vec<PendingCaseView>,
    pub stats: PendingStats,
    pub loading: bool,
    pub error: Option<String>,
    pub feed_down: bool,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl PendingCasesState {
    fn initial() -> Self {
        Self {
            cases: Vec::new(),
            stats: PendingStats::default(),
            loading: true,
            error: None,
            feed_down: false,
            refreshed_at: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingCacheOptions {
    pub stale_after: chrono::Duration,
    pub fallback_poll: Option<std::time::Duration>,
}

impl Default for PendingCacheOptions {
    fn default() -> Self {
        Self {
            stale_after: chrono::Duration::hours(24),
            fallback_poll: None,
        }
    }
}

/// Builder for the synchronization task; subscribes to the feed at
/// construction so no event between `new` and `spawn` is missed.
pub struct PendingCaseCache {
    store: Arc<dyn PendingStore>,
    feed: broadcast::Receiver<CaseEvent>,
    options: PendingCacheOptions,
}

impl PendingCaseCache {
    pub fn new(
        store: Arc<dyn PendingStore>,
        events: &CaseEvents,
        options: PendingCacheOptions,
    ) -> Self {
        Self {
            store,
            feed: events.subscribe(),
            options,
        }
    }

    /// Start the background task and hand back its owning handle.
    pub fn spawn(self) -> PendingCaseWatcher {
        let (state_tx, state_rx) = watch::channel(PendingCasesState::initial());
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let task = SyncTask {
            store: self.store,
            state_tx,
            cancel: cancel.clone(),
            options: self.options,
            dirty: true,
            feed_open: true,
        };
        let join = tokio::spawn(task.run(self.feed, refresh_rx));

        PendingCaseWatcher {
            state_rx,
            refresh_tx,
            cancel,
            join: Mutex::new(Some(join)),
        }
    }
}

/// Owning handle for the synchronization task. Dropping it cancels the
/// task; [`close`](Self::close) additionally waits for it to finish.
pub struct PendingCaseWatcher {
    state_rx: watch::Receiver<PendingCasesState>,
    refresh_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl PendingCaseWatcher {
    /// Current snapshot, cloned out of the channel.
    pub fn state(&self) -> PendingCasesState {
        self.state_rx.borrow().clone()
    }

    /// Receiver yielding every published snapshot, starting with the
    /// current one.
    pub fn subscribe(&self) -> watch::Receiver<PendingCasesState> {
        self.state_rx.clone()
    }

    /// Request a refetch. Safe to call at any time; a full queue means a
    /// refresh is already pending and the request coalesces with it.
    pub fn refresh(&self) {
        let _ = self.refresh_tx.try_send(());
    }

    /// Stop the task and wait for it to exit. Idempotent.
    pub async fn close(&self) {
        self.cancel.cancel();
        if let Some(join) = self.join.lock().await.take() {
            if let Err(e) = join.await {
                warn!(error = %e, "pending case sync task failed to shut down cleanly");
            }
        }
    }
}

impl Drop for PendingCaseWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SyncTask {
    store: Arc<dyn PendingStore>,
    state_tx: watch::Sender<PendingCasesState>,
    cancel: CancellationToken,
    options: PendingCacheOptions,
    /// Set by any invalidation; at most one fetch runs at a time and the
    /// loop keeps refetching until this is clear again.
    dirty: bool,
    feed_open: bool,
}

impl SyncTask {
    async fn run(
        mut self,
        mut feed: broadcast::Receiver<CaseEvent>,
        mut refresh_rx: mpsc::Receiver<()>,
    ) {
        info!("pending case sync started");

        let mut poll = self.options.fallback_poll.map(|every| {
            let mut interval = time::interval_at(time::Instant::now() + every, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if self.dirty {
                self.refresh().await;
                continue;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = feed.recv(), if self.feed_open => self.handle_feed(event),
                message = refresh_rx.recv() => match message {
                    Some(()) => self.dirty = true,
                    // All senders dropped: the watcher is gone.
                    None => break,
                },
                _ = poll_tick(&mut poll) => self.dirty = true,
            }
        }

        debug!("pending case sync stopped");
    }

    /// Fetch and publish one snapshot. A cancellation racing the fetch
    /// wins and the fetch result is discarded unpublished.
    async fn refresh(&mut self) {
        self.dirty = false;
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return,
            fetched = self.store.fetch_pending() => fetched,
        };

        match fetched {
            Ok(mut cases) => {
                sort_pending(&mut cases);
                let now = Utc::now();
                let stats = PendingStats::compute(&cases, now, self.options.stale_after);
                debug!(total = stats.total_count, "refreshed pending cases");
                self.state_tx.send_modify(|state| {
                    state.cases = cases;
                    state.stats = stats;
                    state.loading = false;
                    state.error = None;
                    state.refreshed_at = Some(now);
                });
            }
            Err(e) => {
                error!(error = %e, "failed to fetch pending cases");
                self.state_tx.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(e.to_string());
                });
            }
        }
    }

    fn handle_feed(&mut self, event: Result<CaseEvent, broadcast::error::RecvError>) {
        match event {
            Ok(event) => match invalidation_for(&event) {
                Some(Invalidation::Refetch) => self.dirty = true,
                Some(Invalidation::RemoveNow(id)) => {
                    self.remove_now(id);
                    self.dirty = true;
                }
                None => {}
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "change feed lagged, treating as blanket invalidation");
                self.dirty = true;
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("change feed closed, cache no longer sees pushed changes");
                self.feed_open = false;
                self.state_tx.send_modify(|state| state.feed_down = true);
            }
        }
    }

    /// Drop a case from the published snapshot without waiting for the
    /// confirming refetch.
    fn remove_now(&mut self, id: Uuid) {
        let stale_after = self.options.stale_after;
        self.state_tx.send_if_modified(|state| {
            let len_before = state.cases.len();
            state.cases.retain(|view| view.id != id);
            if state.cases.len() == len_before {
                return false;
            }
            state.stats = PendingStats::compute(&state.cases, Utc::now(), stale_after);
            debug!(case_id = %id, "removed case from pending snapshot ahead of refetch");
            true
        });
    }
}

async fn poll_tick(poll: &mut Option<time::Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

#[derive(Debug, PartialEq)]
enum Invalidation {
    Refetch,
    RemoveNow(Uuid),
}

/// Decision table mapping a feed event to a cache action. Events that
/// touch the pending set force a refetch; an update moving a case out of
/// pending additionally removes it immediately.
fn invalidation_for(event: &CaseEvent) -> Option<Invalidation> {
    let pending_before = event
        .before
        .as_ref()
        .is_some_and(|c| c.status == CaseStatus::Requested);
    let pending_after = event
        .after
        .as_ref()
        .is_some_and(|c| c.status == CaseStatus::Requested);

    match event.op {
        CaseOp::Insert if pending_after => Some(Invalidation::Refetch),
        CaseOp::Update if pending_before && !pending_after => event
            .before
            .as_ref()
            .map(|case| Invalidation::RemoveNow(case.id)),
        CaseOp::Update if pending_after => Some(Invalidation::Refetch),
        CaseOp::Delete if pending_before => Some(Invalidation::Refetch),
        _ => None,
    }
}

/// Priority descending, then age ascending: the oldest urgent case is
/// always first.
fn sort_pending(cases: &mut [PendingCaseView]) {
    cases.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
