//! Local, observable copy of one remote collection.

use std::sync::Arc;

use flowline_core::Record;
use tokio::sync::watch;

/// An immutable view of the collection at one revision.
///
/// Every change produces a new snapshot; a snapshot held by a reader never
/// changes underneath it.
#[derive(Debug)]
pub struct Snapshot<R> {
    /// Bumped on every replacement.
    pub revision: u64,
    pub items: Arc<Vec<R>>,
}

impl<R> Clone for Snapshot<R> {
    fn clone(&self) -> Self {
        Self {
            revision: self.revision,
            items: Arc::clone(&self.items),
        }
    }
}

impl<R: Record> Snapshot<R> {
    pub fn get(&self, id: &str) -> Option<&R> {
        self.items.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.items.iter()
    }
}

/// Holder of the current [`Snapshot`], replaced wholesale on every change.
pub struct LocalCollection<R> {
    tx: watch::Sender<Snapshot<R>>,
}

impl<R: Record> LocalCollection<R> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Snapshot {
            revision: 0,
            items: Arc::new(Vec::new()),
        });
        Self { tx }
    }

    pub fn snapshot(&self) -> Snapshot<R> {
        self.tx.borrow().clone()
    }

    /// Receive every subsequent snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<R>> {
        self.tx.subscribe()
    }

    pub fn replace(&self, items: Vec<R>) {
        self.tx.send_modify(|snap| {
            snap.revision += 1;
            snap.items = Arc::new(items);
        });
    }

    /// Compute the next contents from the current ones and install them.
    ///
    /// `next` runs under the channel lock, so no other change can interleave
    /// between reading and replacing. Returning `None` leaves the snapshot
    /// (and its revision) untouched and notifies nobody.
    pub fn replace_with(&self, next: impl FnOnce(&[R]) -> Option<Vec<R>>) -> bool {
        self.tx.send_if_modified(|snap| match next(&snap.items) {
            Some(items) => {
                snap.revision += 1;
                snap.items = Arc::new(items);
                true
            }
            None => false,
        })
    }
}

impl<R: Record> Default for LocalCollection<R> {
    fn default() -> Self {
        Self::new()
    }
}
