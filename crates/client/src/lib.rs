//! Optimistic CRM client: local collections kept in step with the hosted
//! store, with explicit session handling and change notifications.

pub mod collection;
pub mod confirm;
pub mod controller;
pub mod error;
pub mod events;
pub mod session;
pub mod workspace;

pub use collection::{LocalCollection, Snapshot};
pub use confirm::{AutoConfirm, ConfirmGate};
pub use controller::{
    DeleteOutcome, ImportReport, OptimisticController, PendingWrite, RejectedRow, StatusChange,
    WriteOutcome,
};
pub use error::{ClientError, ClientResult};
pub use events::{ClientEvent, EventBus};
pub use session::SessionHandle;
pub use workspace::{CrmWorkspace, StageSummary};
