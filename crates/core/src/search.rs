//! Quick search and list filtering over the local collections.
//!
//! These helpers only read the in-memory copies held by the client; they
//! never touch the network.

use serde::Serialize;

use crate::error::CoreError;
use crate::lead::Lead;
use crate::task::Task;

/// Default number of hits returned per entity kind.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Maximum number of hits returned per entity kind.
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Which collections a quick search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    #[default]
    All,
    Leads,
    Tasks,
}

impl SearchScope {
    fn includes_leads(&self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Leads)
    }

    fn includes_tasks(&self) -> bool {
        matches!(self, SearchScope::All | SearchScope::Tasks)
    }
}

impl std::str::FromStr for SearchScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(SearchScope::All),
            "leads" => Ok(SearchScope::Leads),
            "tasks" => Ok(SearchScope::Tasks),
            _ => Err(CoreError::UnknownVariant {
                kind: "search scope",
                value: s.to_string(),
            }),
        }
    }
}

/// A single quick-search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "UPPERCASE")]
pub enum SearchHit {
    Lead(Lead),
    Task(Task),
}

/// Lowercased, trimmed query. `None` when nothing is left to search for.
fn normalize(query: &str) -> Option<String> {
    let q = query.trim();
    if q.is_empty() {
        None
    } else {
        Some(q.to_lowercase())
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Does the lead match the quick-search needle (name, company or email)?
fn lead_hit(lead: &Lead, needle: &str) -> bool {
    contains(&lead.name, needle) || contains(&lead.company, needle) || contains(&lead.email, needle)
}

fn task_hit(task: &Task, needle: &str) -> bool {
    contains(&task.title, needle)
        || task
            .description
            .as_deref()
            .is_some_and(|d| contains(d, needle))
}

/// Clamp a caller-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT)
}

/// Search leads and tasks for `query`.
///
/// Leads come first, then tasks, each in collection order and capped at
/// `limit`. A blank query yields no hits.
pub fn quick_search(
    leads: &[Lead],
    tasks: &[Task],
    query: &str,
    scope: SearchScope,
    limit: usize,
) -> Vec<SearchHit> {
    let Some(needle) = normalize(query) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    if scope.includes_leads() {
        hits.extend(
            leads
                .iter()
                .filter(|l| lead_hit(l, &needle))
                .take(limit)
                .cloned()
                .map(SearchHit::Lead),
        );
    }
    if scope.includes_tasks() {
        hits.extend(
            tasks
                .iter()
                .filter(|t| task_hit(t, &needle))
                .take(limit)
                .cloned()
                .map(SearchHit::Task),
        );
    }
    hits
}

/// Leads list filter: name or company. A blank filter keeps everything.
pub fn filter_leads<'a>(leads: &'a [Lead], filter: &str) -> Vec<&'a Lead> {
    match normalize(filter) {
        None => leads.iter().collect(),
        Some(needle) => leads
            .iter()
            .filter(|l| contains(&l.name, &needle) || contains(&l.company, &needle))
            .collect(),
    }
}

/// Task list filter: title or description.
pub fn filter_tasks<'a>(tasks: &'a [Task], filter: &str) -> Vec<&'a Task> {
    match normalize(filter) {
        None => tasks.iter().collect(),
        Some(needle) => tasks.iter().filter(|t| task_hit(t, &needle)).collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
