//! Read-only projections behind the pipeline, dashboard and task board views.

use serde::Serialize;

use crate::lead::{Lead, PipelineStage};
use crate::task::{Task, TaskStatus};

/// One pipeline column: the leads currently in `stage` and their total value.
#[derive(Debug, Clone, Serialize)]
pub struct StageColumn<'a> {
    pub stage: PipelineStage,
    pub leads: Vec<&'a Lead>,
    pub total_value: f64,
}

impl StageColumn<'_> {
    pub fn count(&self) -> usize {
        self.leads.len()
    }
}

/// Group leads into pipeline columns, in stage order.
///
/// Every stage gets a column, empty or not. Within a column leads keep
/// their collection order.
pub fn pipeline_columns(leads: &[Lead]) -> Vec<StageColumn<'_>> {
    PipelineStage::ALL
        .into_iter()
        .map(|stage| {
            let in_stage: Vec<&Lead> = leads.iter().filter(|l| l.status == stage).collect();
            let total_value = in_stage.iter().map(|l| l.value).sum();
            StageColumn {
                stage,
                leads: in_stage,
                total_value,
            }
        })
        .collect()
}

/// Headline figures for the dashboard strip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DashboardKpis {
    /// Sum of every lead's value.
    pub pipeline_value: f64,
    /// Leads that are neither won nor lost.
    pub active_leads: usize,
    pub won_leads: usize,
    /// Won leads as a whole-number percentage of all leads.
    pub conversion_rate: u32,
}

pub fn dashboard_kpis(leads: &[Lead]) -> DashboardKpis {
    let pipeline_value = leads.iter().map(|l| l.value).sum();
    let active_leads = leads.iter().filter(|l| l.status.is_open()).count();
    let won_leads = leads
        .iter()
        .filter(|l| l.status == PipelineStage::Won)
        .count();
    let conversion_rate = (won_leads as f64 / leads.len().max(1) as f64 * 100.0).round() as u32;

    DashboardKpis {
        pipeline_value,
        active_leads,
        won_leads,
        conversion_rate,
    }
}

/// One task board column.
#[derive(Debug, Clone, Serialize)]
pub struct TaskColumn<'a> {
    pub status: TaskStatus,
    pub tasks: Vec<&'a Task>,
}

/// Group tasks into the four board columns, keeping input order.
pub fn task_board(tasks: &[Task]) -> Vec<TaskColumn<'_>> {
    TaskStatus::ALL
        .into_iter()
        .map(|status| TaskColumn {
            status,
            tasks: tasks.iter().filter(|t| t.status == status).collect(),
        })
        .collect()
}
