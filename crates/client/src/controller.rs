//! Optimistic mutation controller for one collection.
//!
//! [`OptimisticController`] owns the local copy of a collection and is the
//! only writer to it. Status changes are applied locally before the remote
//! write is issued; a rejected write is followed by exactly one full
//! re-fetch. Create, edit and delete are not optimistic: local state only
//! changes once the store has accepted the change.
//!
//! Every optimistic apply gets a monotonic ticket and stays in the in-flight
//! ledger until its write settles. Re-fetched rows are rebased onto the
//! ledger, so a reconciliation never hides a newer local apply whose write is
//! still pending, nor one the store accepted while the fetch was out.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use flowline_core::{Record, RecordId, Session, Staged};
use flowline_remote::{RemoteCollection, RemoteError};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use validator::Validate;

use crate::collection::{LocalCollection, Snapshot};
use crate::confirm::ConfirmGate;
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEvent, EventBus};
use crate::session::SessionHandle;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of [`OptimisticController::update_status`].
#[derive(Debug)]
pub enum StatusChange {
    /// No loaded record has that id.
    Absent,
    /// The record already has that status. Nothing was written.
    Unchanged,
    /// The view has closed. Nothing was applied or sent.
    Closed,
    /// Applied locally; the remote write is in flight.
    Applied(PendingWrite),
}

/// How an optimistic write settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Confirmed,
    /// The write landed after a newer write to the same record had been
    /// confirmed. Local state was re-fetched if `reconciled`.
    Superseded { reconciled: bool },
    /// The store rejected the write. Local state was re-fetched if
    /// `reconciled`, otherwise it still shows the optimistic value.
    Failed { error: String, reconciled: bool },
    /// The view closed before the write settled; local state was left alone.
    Detached { succeeded: bool },
}

impl WriteOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, WriteOutcome::Confirmed)
    }
}

/// Handle to an in-flight optimistic write. Dropping it does not cancel
/// the write.
#[derive(Debug)]
pub struct PendingWrite {
    ticket: u64,
    outcome: oneshot::Receiver<WriteOutcome>,
}

impl PendingWrite {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Wait for the write, and any reconciliation it triggered, to finish.
    pub async fn settled(self) -> WriteOutcome {
        // The sender only goes away without sending if the runtime shut down
        // underneath the write task.
        self.outcome
            .await
            .unwrap_or(WriteOutcome::Detached { succeeded: false })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The confirmation gate said no. Nothing was sent.
    Declined,
    Deleted,
}

/// An import row that failed validation and was not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// Position in the submitted batch.
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub rejected: Vec<RejectedRow>,
    /// Whether the follow-up re-fetch succeeded.
    pub refreshed: bool,
}

// ---------------------------------------------------------------------------
// In-flight ledger
// ---------------------------------------------------------------------------

struct InFlight<P> {
    id: RecordId,
    patch: P,
}

struct Ledger<P> {
    last_ticket: u64,
    in_flight: BTreeMap<u64, InFlight<P>>,
    /// Highest confirmed ticket per record, kept only while it can still
    /// expose an older write landing late.
    confirmed: HashMap<RecordId, u64>,
    /// Count of writes the store has accepted, in landing order.
    landed: u64,
    /// Accepted writes that a read still waiting on the store may have
    /// missed, keyed by landing order.
    recent: BTreeMap<u64, InFlight<P>>,
    /// Landing watermark of every open read, with a count per watermark.
    open_reads: BTreeMap<u64, usize>,
}

impl<P> Default for Ledger<P> {
    fn default() -> Self {
        Self {
            last_ticket: 0,
            in_flight: BTreeMap::new(),
            confirmed: HashMap::new(),
            landed: 0,
            recent: BTreeMap::new(),
            open_reads: BTreeMap::new(),
        }
    }
}

impl<P> Ledger<P> {
    fn issue(&mut self, id: &str, patch: P) -> u64 {
        self.last_ticket += 1;
        self.in_flight.insert(
            self.last_ticket,
            InFlight {
                id: id.to_string(),
                patch,
            },
        );
        self.last_ticket
    }

    fn settle(&mut self, ticket: u64) -> Option<InFlight<P>> {
        self.in_flight.remove(&ticket)
    }

    /// Record a write the store accepted. Returns `false` when a newer write
    /// to the same record was confirmed first.
    fn confirm(&mut self, ticket: u64, write: InFlight<P>) -> bool {
        self.landed += 1;
        let latest = self.confirmed.entry(write.id.clone()).or_insert(0);
        let in_order = *latest <= ticket;
        if in_order {
            *latest = ticket;
        }
        if !self.open_reads.is_empty() {
            self.recent.insert(self.landed, write);
        }
        in_order
    }

    /// Note that a read is about to go to the store. Writes landing after
    /// the returned watermark are re-applied over its rows.
    fn open_read(&mut self) -> u64 {
        *self.open_reads.entry(self.landed).or_insert(0) += 1;
        self.landed
    }

    fn close_read(&mut self, watermark: u64) {
        if let Some(count) = self.open_reads.get_mut(&watermark) {
            *count -= 1;
            if *count == 0 {
                self.open_reads.remove(&watermark);
            }
        }
        match self.open_reads.keys().next().copied() {
            Some(oldest) => self.recent.retain(|landed, _| *landed > oldest),
            None => self.recent.clear(),
        }
    }

    /// Forget a record that no longer exists.
    fn forget(&mut self, id: &str) {
        self.confirmed.remove(id);
    }

    /// Bring rows read at `watermark` up to date with local intent: writes
    /// that landed after the read first, in landing order, then every write
    /// still in flight, in ticket order.
    fn rebase<R: Record<Patch = P>>(&mut self, rows: &mut [R], watermark: u64) {
        let later = self.recent.range(watermark + 1..).map(|(_, w)| w);
        for write in later.chain(self.in_flight.values()) {
            if let Some(row) = rows.iter_mut().find(|r| r.id() == write.id) {
                row.apply_patch(&write.patch);
            }
        }
        let in_flight = &self.in_flight;
        self.confirmed
            .retain(|id, _| in_flight.values().any(|w| w.id == *id));
    }
}

/// An open read against the store. Closes itself on drop, so a load future
/// dropped mid-flight does not pin accepted writes in the ledger.
struct OpenRead<'a, P> {
    ledger: &'a Mutex<Ledger<P>>,
    watermark: u64,
}

impl<P> Drop for OpenRead<'_, P> {
    fn drop(&mut self) {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close_read(self.watermark);
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Shared<R: Record> {
    remote: Arc<dyn RemoteCollection<R>>,
    local: LocalCollection<R>,
    session: SessionHandle,
    events: Arc<EventBus>,
    ledger: Mutex<Ledger<R::Patch>>,
    /// Cancelled when the consuming view closes.
    scope: CancellationToken,
}

impl<R: Record> Shared<R> {
    fn ledger(&self) -> MutexGuard<'_, Ledger<R::Patch>> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn closed(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// The live session, or `AuthRequired` plus the redirect signal.
    fn session(&self) -> ClientResult<Session> {
        self.session.current().inspect_err(|_| {
            tracing::debug!(collection = %R::COLLECTION, "No live session");
            self.events.publish(ClientEvent::AuthRequired);
        })
    }

    fn remote_failed(&self, error: &RemoteError) {
        if error.is_authorization() {
            self.events.publish(ClientEvent::AuthRequired);
        }
    }

    fn open_read(&self) -> OpenRead<'_, R::Patch> {
        let watermark = self.ledger().open_read();
        OpenRead {
            ledger: &self.ledger,
            watermark,
        }
    }

    /// Replace local state with rows fetched by `read`, rebased onto the
    /// ledger. Skipped once the view has closed.
    fn install(&self, mut rows: Vec<R>, read: &OpenRead<'_, R::Patch>) -> bool {
        if self.closed() {
            return false;
        }
        let mut ledger = self.ledger();
        ledger.rebase(&mut rows, read.watermark);
        self.local.replace(rows);
        true
    }

    /// Re-fetch the whole collection. Returns whether local state was replaced.
    async fn reconcile(&self) -> bool {
        if self.closed() {
            return false;
        }
        let read = self.open_read();
        let fetched = match self.session() {
            Ok(session) => self.remote.select_all(&session).await.map_err(ClientError::from),
            Err(e) => Err(e),
        };
        match fetched {
            Ok(rows) => {
                let count = rows.len();
                if !self.install(rows, &read) {
                    return false;
                }
                tracing::info!(collection = %R::COLLECTION, count, "Reconciled from store");
                self.events.publish(ClientEvent::Reconciled {
                    collection: R::COLLECTION,
                    count,
                });
                true
            }
            Err(e) => {
                tracing::error!(
                    collection = %R::COLLECTION,
                    error = %e,
                    "Reconciliation failed, local state may be stale",
                );
                if let ClientError::Remote(remote) = &e {
                    self.remote_failed(remote);
                }
                self.events.publish(ClientEvent::ReconcileFailed {
                    collection: R::COLLECTION,
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Issue one optimistic write and handle its completion.
    async fn settle_write(
        self: Arc<Self>,
        session: Session,
        ticket: u64,
        id: RecordId,
        patch: R::Patch,
    ) -> WriteOutcome {
        let result = self.remote.update(&session, &id, &patch).await;
        let in_order = self.record_settled(ticket, result.is_ok());

        if self.closed() {
            tracing::debug!(
                collection = %R::COLLECTION,
                id = %id,
                ticket,
                "View closed before write settled",
            );
            return WriteOutcome::Detached {
                succeeded: result.is_ok(),
            };
        }

        match result {
            Ok(()) if in_order => {
                tracing::debug!(collection = %R::COLLECTION, id = %id, ticket, "Write confirmed");
                self.events.publish(ClientEvent::WriteConfirmed {
                    collection: R::COLLECTION,
                    id,
                    ticket,
                });
                WriteOutcome::Confirmed
            }
            Ok(()) => {
                tracing::warn!(
                    collection = %R::COLLECTION,
                    id = %id,
                    ticket,
                    "Stale write landed after a newer one",
                );
                self.events.publish(ClientEvent::StaleWrite {
                    collection: R::COLLECTION,
                    id,
                    ticket,
                });
                WriteOutcome::Superseded {
                    reconciled: self.reconcile().await,
                }
            }
            Err(e) => {
                tracing::warn!(
                    collection = %R::COLLECTION,
                    id = %id,
                    ticket,
                    error = %e,
                    "Write failed, reconciling",
                );
                self.remote_failed(&e);
                self.events.publish(ClientEvent::WriteFailed {
                    collection: R::COLLECTION,
                    id,
                    ticket,
                    error: e.to_string(),
                });
                WriteOutcome::Failed {
                    error: e.to_string(),
                    reconciled: self.reconcile().await,
                }
            }
        }
    }

    /// Drop the ticket from the in-flight ledger. Returns `false` only for a
    /// successful write that was overtaken by a newer confirmed one.
    fn record_settled(&self, ticket: u64, succeeded: bool) -> bool {
        let mut ledger = self.ledger();
        match ledger.settle(ticket) {
            Some(write) if succeeded => ledger.confirm(ticket, write),
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// OptimisticController
// ---------------------------------------------------------------------------

/// Owner of one local collection and every mutation made to it.
///
/// Cloning yields another handle to the same collection.
pub struct OptimisticController<R: Record> {
    shared: Arc<Shared<R>>,
}

impl<R: Record> Clone for OptimisticController<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Record> OptimisticController<R> {
    pub fn new(
        remote: Arc<dyn RemoteCollection<R>>,
        session: SessionHandle,
        events: Arc<EventBus>,
    ) -> Self {
        Self::with_scope(remote, session, events, CancellationToken::new())
    }

    /// Create a controller bound to an existing view scope.
    pub fn with_scope(
        remote: Arc<dyn RemoteCollection<R>>,
        session: SessionHandle,
        events: Arc<EventBus>,
        scope: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                remote,
                local: LocalCollection::new(),
                session,
                events,
                ledger: Mutex::new(Ledger::default()),
                scope,
            }),
        }
    }

    pub fn snapshot(&self) -> Snapshot<R> {
        self.shared.local.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<R>> {
        self.shared.local.subscribe()
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.snapshot().get(id).cloned()
    }

    /// Number of optimistic writes that have not settled yet.
    pub fn in_flight(&self) -> usize {
        self.shared.ledger().in_flight.len()
    }

    /// Close the view scope. Writes already issued still run to completion,
    /// but their results no longer touch local state.
    pub fn close(&self) {
        self.shared.scope.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed()
    }

    /// Fetch the collection and replace local state.
    ///
    /// On failure local state is left as it was. Returns the number of rows
    /// fetched.
    pub async fn load(&self) -> ClientResult<usize> {
        let session = self.shared.session()?;
        let read = self.shared.open_read();
        let rows = self
            .shared
            .remote
            .select_all(&session)
            .await
            .inspect_err(|e| {
                tracing::warn!(collection = %R::COLLECTION, error = %e, "Failed to load collection");
                self.shared.remote_failed(e);
            })?;

        let count = rows.len();
        if self.shared.install(rows, &read) {
            tracing::info!(collection = %R::COLLECTION, count, "Loaded collection");
        }
        Ok(count)
    }

    /// Insert a record and show it once the store has assigned its id.
    pub async fn create(&self, input: R::Create) -> ClientResult<R> {
        let session = self.shared.session()?;
        input.validate()?;

        let payload = R::insert_payload(input, session.user_id(), Utc::now());
        let created = self
            .shared
            .remote
            .insert(&session, &payload)
            .await
            .inspect_err(|e| {
                tracing::warn!(collection = %R::COLLECTION, error = %e, "Create failed");
                self.shared.remote_failed(e);
            })?;

        if !self.shared.closed() {
            // A reload that raced the insert may already have brought it in.
            self.shared.local.replace_with(|items| {
                if items.iter().any(|r| r.id() == created.id()) {
                    return None;
                }
                let mut next = Vec::with_capacity(items.len() + 1);
                next.push(created.clone());
                next.extend_from_slice(items);
                Some(next)
            });
        }

        tracing::info!(collection = %R::COLLECTION, id = %created.id(), "Created record");
        self.shared.events.publish(ClientEvent::Created {
            collection: R::COLLECTION,
            id: created.id().to_string(),
        });
        Ok(created)
    }

    /// Send a partial update and apply it locally once accepted.
    pub async fn edit(&self, id: &str, patch: R::Patch) -> ClientResult<()> {
        let session = self.shared.session()?;
        patch.validate()?;

        let patch = R::stamp_edit(patch, Utc::now());
        self.shared
            .remote
            .update(&session, id, &patch)
            .await
            .inspect_err(|e| {
                tracing::warn!(collection = %R::COLLECTION, id, error = %e, "Edit failed");
                self.shared.remote_failed(e);
            })?;

        if !self.shared.closed() {
            self.shared.local.replace_with(|items| {
                let pos = items.iter().position(|r| r.id() == id)?;
                let mut next = items.to_vec();
                next[pos].apply_patch(&patch);
                Some(next)
            });
        }
        tracing::info!(collection = %R::COLLECTION, id, "Edited record");
        Ok(())
    }

    /// Delete a record after the gate confirms. The row stays visible until
    /// the store has removed it.
    pub async fn delete<G>(&self, id: &str, gate: &G) -> ClientResult<DeleteOutcome>
    where
        G: ConfirmGate + ?Sized,
    {
        let prompt = format!(
            "Are you sure you want to delete this {}?",
            R::COLLECTION.entity()
        );
        if !gate.confirm(&prompt) {
            tracing::debug!(collection = %R::COLLECTION, id, "Delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        let session = self.shared.session()?;
        if let Err(e) = self.shared.remote.delete(&session, id).await {
            tracing::error!(collection = %R::COLLECTION, id, error = %e, "Delete failed");
            self.shared.remote_failed(&e);
            self.shared.events.publish(ClientEvent::DeleteFailed {
                collection: R::COLLECTION,
                id: id.to_string(),
                error: e.to_string(),
            });
            return Err(e.into());
        }

        self.shared.ledger().forget(id);
        if !self.shared.closed() {
            self.shared.local.replace_with(|items| {
                if !items.iter().any(|r| r.id() == id) {
                    return None;
                }
                Some(items.iter().filter(|r| r.id() != id).cloned().collect())
            });
        }
        tracing::info!(collection = %R::COLLECTION, id, "Deleted record");
        self.shared.events.publish(ClientEvent::Deleted {
            collection: R::COLLECTION,
            id: id.to_string(),
        });
        Ok(DeleteOutcome::Deleted)
    }

    /// Bulk-insert rows, skipping those that fail validation, then re-fetch.
    pub async fn import(&self, rows: Vec<R::Create>) -> ClientResult<ImportReport> {
        let session = self.shared.session()?;
        let now = Utc::now();

        let mut payloads = Vec::with_capacity(rows.len());
        let mut rejected = Vec::new();
        for (index, row) in rows.into_iter().enumerate() {
            match row.validate() {
                Ok(()) => payloads.push(R::insert_payload(row, session.user_id(), now)),
                Err(e) => rejected.push(RejectedRow {
                    index,
                    reason: e.to_string(),
                }),
            }
        }

        let inserted = self
            .shared
            .remote
            .insert_many(&session, &payloads)
            .await
            .inspect_err(|e| {
                tracing::warn!(collection = %R::COLLECTION, error = %e, "Import failed");
                self.shared.remote_failed(e);
            })?;

        tracing::info!(
            collection = %R::COLLECTION,
            inserted,
            rejected = rejected.len(),
            "Imported rows",
        );
        self.shared.events.publish(ClientEvent::Imported {
            collection: R::COLLECTION,
            inserted,
            rejected: rejected.len(),
        });

        let refreshed = self.shared.reconcile().await;
        Ok(ImportReport {
            inserted,
            rejected,
            refreshed,
        })
    }
}

impl<R: Staged> OptimisticController<R> {
    /// Move a record to another status.
    ///
    /// The change is visible in local state before this returns; the remote
    /// write runs on a spawned task. Must be called from within a Tokio
    /// runtime.
    pub fn update_status(&self, id: &str, status: R::Status) -> ClientResult<StatusChange> {
        if self.shared.closed() {
            tracing::debug!(collection = %R::COLLECTION, id, "Status change after close ignored");
            return Ok(StatusChange::Closed);
        }
        let session = self.shared.session()?;
        let patch = R::status_patch(status);

        let ticket = {
            let mut ledger = self.shared.ledger();
            let mut unchanged = false;
            let applied = self.shared.local.replace_with(|items| {
                let pos = items.iter().position(|r| r.id() == id)?;
                if items[pos].status() == status {
                    unchanged = true;
                    return None;
                }
                let mut next = items.to_vec();
                next[pos].apply_patch(&patch);
                Some(next)
            });
            if !applied {
                return Ok(if unchanged {
                    StatusChange::Unchanged
                } else {
                    StatusChange::Absent
                });
            }
            ledger.issue(id, patch.clone())
        };

        tracing::debug!(collection = %R::COLLECTION, id, ticket, %status, "Applied status locally");

        let (tx, rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let id = id.to_string();
        tokio::spawn(async move {
            let outcome = shared.settle_write(session, ticket, id, patch).await;
            let _ = tx.send(outcome);
        });

        Ok(StatusChange::Applied(PendingWrite {
            ticket,
            outcome: rx,
        }))
    }
}
