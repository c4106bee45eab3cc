//! Scripted in-memory store for exercising the controllers.
//!
//! [`StubRemote`] keeps rows in memory, records every call, and can hold
//! writes (and reads) until the test releases them or fail them on demand.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use flowline_client::{ClientEvent, EventBus, OptimisticController, SessionHandle};
use flowline_core::{
    Lead, NewLead, NewTask, PipelineStage, Record, Session, SessionUser, Task, TaskPriority,
    TaskStatus,
};
use flowline_remote::{RemoteCollection, RemoteError, RemoteResult};
use tokio::sync::{broadcast, oneshot};

pub const USER_ID: &str = "user-1";

struct Held {
    label: String,
    release: oneshot::Sender<()>,
}

pub struct StubRemote<R: Record> {
    rows: Mutex<Vec<R>>,
    calls: Mutex<Vec<String>>,
    hold_writes: AtomicBool,
    hold_reads: AtomicBool,
    held: Mutex<Vec<Held>>,
    failing_updates: Mutex<HashSet<String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    next_id: AtomicUsize,
    materialize: fn(&R::Insert, String) -> R,
}

impl<R: Record> StubRemote<R> {
    pub fn new(rows: Vec<R>, materialize: fn(&R::Insert, String) -> R) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            calls: Mutex::new(Vec::new()),
            hold_writes: AtomicBool::new(false),
            hold_reads: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
            failing_updates: Mutex::new(HashSet::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            next_id: AtomicUsize::new(1),
            materialize,
        })
    }

    /// Authoritative rows, newest first.
    pub fn rows(&self) -> Vec<R> {
        self.rows.lock().unwrap().clone()
    }

    pub fn set_rows(&self, rows: Vec<R>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Park every subsequent update and insert until released.
    pub fn hold_writes(&self) {
        self.hold_writes.store(true, Ordering::SeqCst);
    }

    /// Park every subsequent read after it has copied the rows, so it
    /// returns what the store held when the read arrived.
    pub fn hold_reads(&self) {
        self.hold_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_update(&self, id: &str) {
        self.failing_updates.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Wait until `n` writes are parked.
    pub async fn wait_for_held(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.held_count() < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("writes never reached the store");
    }

    /// Let the first parked write whose label contains `needle` proceed.
    pub fn release(&self, needle: &str) {
        let mut held = self.held.lock().unwrap();
        let pos = held
            .iter()
            .position(|h| h.label.contains(needle))
            .unwrap_or_else(|| panic!("no held write matching {needle:?}"));
        let _ = held.remove(pos).release.send(());
    }

    pub fn release_all(&self) {
        for h in self.held.lock().unwrap().drain(..) {
            let _ = h.release.send(());
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn gate(&self, label: String) {
        self.park_if(&self.hold_writes, label).await;
    }

    async fn park_if(&self, flag: &AtomicBool, label: String) {
        if !flag.load(Ordering::SeqCst) {
            return;
        }
        let (tx, rx) = oneshot::channel();
        self.held.lock().unwrap().push(Held { label, release: tx });
        let _ = rx.await;
    }

    fn materialize_one(&self, row: &R::Insert) -> R {
        let id = format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        (self.materialize)(row, id)
    }
}

pub fn server_error() -> RemoteError {
    RemoteError::Api {
        status: 500,
        body: "internal error".to_string(),
    }
}

#[async_trait]
impl<R: Record> RemoteCollection<R> for StubRemote<R> {
    async fn select_all(&self, _session: &Session) -> RemoteResult<Vec<R>> {
        self.record("select_all".to_string());
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        let rows = self.rows();
        self.park_if(&self.hold_reads, "select_all".to_string()).await;
        Ok(rows)
    }

    async fn update(&self, _session: &Session, id: &str, patch: &R::Patch) -> RemoteResult<()> {
        let body = serde_json::to_string(patch).unwrap();
        self.record(format!("update:{id}"));
        self.gate(format!("update:{id}:{body}")).await;

        if self.failing_updates.lock().unwrap().contains(id) {
            return Err(server_error());
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| RemoteError::NotFound {
                entity: R::COLLECTION.entity(),
                id: id.to_string(),
            })?;
        row.apply_patch(patch);
        Ok(())
    }

    async fn insert(&self, _session: &Session, row: &R::Insert) -> RemoteResult<R> {
        self.record("insert".to_string());
        self.gate("insert".to_string()).await;

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        let created = self.materialize_one(row);
        self.rows.lock().unwrap().insert(0, created.clone());
        Ok(created)
    }

    async fn insert_many(&self, _session: &Session, rows: &[R::Insert]) -> RemoteResult<usize> {
        self.record(format!("insert_many:{}", rows.len()));
        if rows.is_empty() {
            return Ok(0);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        let created: Vec<R> = rows.iter().map(|r| self.materialize_one(r)).collect();
        let mut stored = self.rows.lock().unwrap();
        for row in created.into_iter().rev() {
            stored.insert(0, row);
        }
        Ok(rows.len())
    }

    async fn delete(&self, _session: &Session, id: &str) -> RemoteResult<()> {
        self.record(format!("delete:{id}"));
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id() != id);
        if rows.len() == before {
            return Err(RemoteError::NotFound {
                entity: R::COLLECTION.entity(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn session() -> Session {
    Session {
        access_token: "token".to_string(),
        refresh_token: None,
        user: SessionUser {
            id: USER_ID.to_string(),
            email: Some("jd@flowline.app".to_string()),
        },
        expires_at: Utc::now() + chrono::Duration::hours(1),
    }
}

pub fn signed_in() -> SessionHandle {
    SessionHandle::signed_in(session())
}

pub fn lead(id: &str, name: &str, status: PipelineStage, value: f64) -> Lead {
    Lead {
        id: id.to_string(),
        user_id: USER_ID.to_string(),
        name: name.to_string(),
        company: "Acme".to_string(),
        email: String::new(),
        phone: None,
        status,
        value,
        owner: "JD".to_string(),
        source: "Web".to_string(),
        avatar: None,
        created_at: Utc.with_ymd_and_hms(2023, 10, 1, 0, 0, 0).unwrap(),
    }
}

pub fn task(id: &str, title: &str, status: TaskStatus) -> Task {
    Task {
        id: id.to_string(),
        user_id: USER_ID.to_string(),
        title: title.to_string(),
        description: None,
        status,
        priority: TaskPriority::Medium,
        due_date: None,
        related_lead_id: None,
        created_at: Utc.with_ymd_and_hms(2023, 10, 1, 0, 0, 0).unwrap(),
        updated_at: None,
    }
}

pub fn lead_from_insert(row: &NewLead, id: String) -> Lead {
    Lead {
        id,
        user_id: row.user_id.clone(),
        name: row.name.clone(),
        company: row.company.clone(),
        email: row.email.clone(),
        phone: row.phone.clone(),
        status: row.status,
        value: row.value,
        owner: row.owner.clone(),
        source: row.source.clone(),
        avatar: None,
        created_at: row.created_at,
    }
}

pub fn task_from_insert(row: &NewTask, id: String) -> Task {
    Task {
        id,
        user_id: row.user_id.clone(),
        title: row.title.clone(),
        description: row.description.clone(),
        status: row.status,
        priority: row.priority,
        due_date: row.due_date,
        related_lead_id: row.related_lead_id.clone(),
        created_at: row.created_at,
        updated_at: Some(row.updated_at),
    }
}

/// The three leads from the pipeline board scenario.
pub fn board_leads() -> Vec<Lead> {
    vec![
        lead("1", "Elena Fisher", PipelineStage::Qualified, 12_000.0),
        lead("2", "Nathan Drake", PipelineStage::New, 4_000.0),
        lead("3", "Chloe Frazer", PipelineStage::Proposal, 8_500.0),
    ]
}

pub fn leads_remote(rows: Vec<Lead>) -> Arc<StubRemote<Lead>> {
    StubRemote::new(rows, lead_from_insert)
}

pub fn tasks_remote(rows: Vec<Task>) -> Arc<StubRemote<Task>> {
    StubRemote::new(rows, task_from_insert)
}

/// A controller over `remote` plus a subscription to its events.
pub fn controller<R: Record>(
    remote: &Arc<StubRemote<R>>,
    session: SessionHandle,
) -> (OptimisticController<R>, broadcast::Receiver<ClientEvent>) {
    let events = Arc::new(EventBus::default());
    let rx = events.subscribe();
    let controller = OptimisticController::new(remote.clone(), session, events);
    (controller, rx)
}

/// Everything published so far.
pub fn drain(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn statuses(leads: &[Lead]) -> Vec<(String, PipelineStage)> {
    leads.iter().map(|l| (l.id.clone(), l.status)).collect()
}
