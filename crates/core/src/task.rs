//! Task entity, board statuses, priorities and the task request shapes.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::lead::Lead;
use crate::record::{Collection, Record, Staged};
use crate::types::{RecordId, Timestamp, UserId};

/// Hour of day used when a due date is given without a time.
pub const DEFAULT_DUE_HOUR: u32 = 12;

// ---------------------------------------------------------------------------
// TaskStatus / TaskPriority
// ---------------------------------------------------------------------------

/// Task board column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Waiting,
    Done,
}

impl TaskStatus {
    /// Every status in board column order.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Waiting,
        TaskStatus::Done,
    ];

    /// Wire value, e.g. `"IN_PROGRESS"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Waiting => "WAITING",
            TaskStatus::Done => "DONE",
        }
    }

    /// Column heading.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Waiting => "Waiting",
            TaskStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    /// Accepts either the wire value or the column label, ignoring case
    /// and treating `-`, `_` and spaces alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s);
        TaskStatus::ALL
            .into_iter()
            .find(|status| {
                normalize_key(status.as_str()) == key || normalize_key(status.label()) == key
            })
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "task status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Medium => "MEDIUM",
            TaskPriority::High => "HIGH",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            _ => Err(CoreError::UnknownVariant {
                kind: "task priority",
                value: s.to_string(),
            }),
        }
    }
}

fn normalize_key(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Combine a calendar date and optional time of day into a due timestamp.
///
/// A missing time falls back to [`DEFAULT_DUE_HOUR`] (noon).
pub fn due_date_from_parts(date: NaiveDate, time: Option<NaiveTime>) -> Timestamp {
    let time = time
        .or_else(|| NaiveTime::from_hms_opt(DEFAULT_DUE_HOUR, 0, 0))
        .unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A task row from the `tasks` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: RecordId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<Timestamp>,
    /// Weak reference to a lead. May dangle.
    #[serde(default)]
    pub related_lead_id: Option<RecordId>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl Task {
    /// Resolve the related lead, if any. A dangling reference resolves to `None`.
    pub fn related_lead<'a>(&self, leads: &'a [Lead]) -> Option<&'a Lead> {
        let id = self.related_lead_id.as_deref()?;
        leads.iter().find(|lead| lead.id == id)
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

/// Form input for creating a task.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTask {
    #[validate(custom(function = "crate::validation::not_blank"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<Timestamp>,
    #[serde(default)]
    pub related_lead_id: Option<RecordId>,
}

impl CreateTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: None,
            related_lead_id: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_due_date(mut self, due_date: Timestamp) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn related_to(mut self, lead_id: impl Into<RecordId>) -> Self {
        self.related_lead_id = Some(lead_id.into());
        self
    }
}

/// Insert payload for the `tasks` collection.
#[derive(Debug, Clone, Serialize)]
pub struct NewTask {
    pub user_id: UserId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_lead_id: Option<RecordId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Partial update for a task.
///
/// The doubly optional fields distinguish "leave as is" (`None`) from
/// "clear" (`Some(None)`, sent as JSON `null`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Validate)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "crate::validation::not_blank"))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<Timestamp>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_lead_id: Option<Option<RecordId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

impl Record for Task {
    type Create = CreateTask;
    type Insert = NewTask;
    type Patch = TaskPatch;

    const COLLECTION: Collection = Collection::Tasks;

    fn id(&self) -> &str {
        &self.id
    }

    fn insert_payload(input: CreateTask, owner: &str, now: Timestamp) -> NewTask {
        NewTask {
            user_id: owner.to_string(),
            title: input.title.trim().to_string(),
            description: input.description.filter(|d| !d.trim().is_empty()),
            status: input.status,
            priority: input.priority,
            due_date: input.due_date,
            // The form's "no related lead" option submits an empty id.
            related_lead_id: input.related_lead_id.filter(|id| !id.is_empty()),
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(related) = &patch.related_lead_id {
            self.related_lead_id = related.clone();
        }
        if let Some(updated_at) = patch.updated_at {
            self.updated_at = Some(updated_at);
        }
    }

    fn stamp_edit(mut patch: TaskPatch, now: Timestamp) -> TaskPatch {
        patch.updated_at = Some(now);
        patch
    }
}

impl Staged for Task {
    type Status = TaskStatus;

    fn status(&self) -> TaskStatus {
        self.status
    }

    fn status_patch(status: TaskStatus) -> TaskPatch {
        TaskPatch::status(status)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
