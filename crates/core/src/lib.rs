//! Domain model for the Flowline CRM client.
//!
//! Everything in this crate is pure: entity types, the typed request shapes
//! that cross the remote boundary, the session model, and read-only
//! projections over local collections. I/O lives in `flowline-remote` and
//! state management in `flowline-client`.

pub mod error;
pub mod lead;
pub mod metrics;
pub mod record;
pub mod search;
pub mod session;
pub mod task;
pub mod types;
mod validation;

pub use error::CoreError;
pub use lead::{CreateLead, Lead, LeadPatch, NewLead, PipelineStage};
pub use record::{Collection, Record, Staged};
pub use session::{Session, SessionUser};
pub use task::{CreateTask, NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
pub use types::{RecordId, Timestamp, UserId};
