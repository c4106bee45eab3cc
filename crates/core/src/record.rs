//! Record abstraction shared by every server-scoped collection.
//!
//! A [`Record`] names its collection on the hosted store and fixes the closed
//! set of request shapes that may cross the remote boundary for it: the form
//! input accepted on create, the insert payload derived from it, and the
//! partial-update patch. [`Staged`] records additionally carry a status field
//! that the optimistic status path mutates.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::Timestamp;

/// A named, server-scoped set of rows of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Leads,
    Tasks,
}

impl Collection {
    /// Table name on the hosted row API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Leads => "leads",
            Collection::Tasks => "tasks",
        }
    }

    /// Singular entity label used in errors and prompts.
    pub fn entity(&self) -> &'static str {
        match self {
            Collection::Leads => "lead",
            Collection::Tasks => "task",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row owned by exactly one user account.
pub trait Record:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Form input accepted by create; validated before anything is sent.
    type Create: Validate + fmt::Debug + Send + Sync + 'static;

    /// Insert payload sent to the store.
    type Insert: Serialize + fmt::Debug + Send + Sync + 'static;

    /// Partial update payload. `None` fields are left untouched.
    type Patch: Serialize + Validate + Clone + fmt::Debug + Send + Sync + 'static;

    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Build the insert payload for `owner` from validated form input.
    fn insert_payload(input: Self::Create, owner: &str, now: Timestamp) -> Self::Insert;

    /// Apply a patch to the local copy, mirroring what the store does.
    fn apply_patch(&mut self, patch: &Self::Patch);

    /// Stamp an edit patch before it is sent. Defaults to no change.
    fn stamp_edit(patch: Self::Patch, _now: Timestamp) -> Self::Patch {
        patch
    }
}

/// A record whose position on a board is fully determined by its status.
pub trait Staged: Record {
    type Status: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static;

    fn status(&self) -> Self::Status;

    /// Patch that changes only the status field.
    fn status_patch(status: Self::Status) -> Self::Patch;
}
