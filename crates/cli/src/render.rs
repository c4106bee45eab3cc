//! Plain-text rendering of the workspace views.

use std::fmt::Write;

use flowline_client::{StageSummary, WriteOutcome};
use flowline_core::metrics::{DashboardKpis, TaskColumn};
use flowline_core::search::SearchHit;
use flowline_core::Lead;

/// Whole-dollar amount with thousands separators, e.g. `$12,000`.
pub fn money(value: f64) -> String {
    let whole = value.round().abs() as u64;
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    if value < 0.0 && whole > 0 {
        out.push('-');
    }
    out.push('$');
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn leads(leads: &[&Lead]) -> String {
    if leads.is_empty() {
        return "No leads.\n".to_string();
    }
    let mut out = String::new();
    for lead in leads {
        let _ = writeln!(
            out,
            "{:<38} {:<24} {:<20} {:<10} {:>12}",
            lead.id,
            lead.name,
            lead.company,
            lead.status.as_str(),
            money(lead.value),
        );
    }
    out
}

pub fn pipeline(stages: &[StageSummary]) -> String {
    let mut out = String::new();
    for stage in stages {
        let _ = writeln!(
            out,
            "{:<10} {:>4}  {:>12}",
            stage.stage.as_str(),
            stage.count,
            money(stage.total_value),
        );
    }
    out
}

pub fn dashboard(kpis: &DashboardKpis) -> String {
    format!(
        "Pipeline value   {}\nActive leads     {}\nWon deals        {}\nConversion rate  {}%\n",
        money(kpis.pipeline_value),
        kpis.active_leads,
        kpis.won_leads,
        kpis.conversion_rate,
    )
}

pub fn task_board(columns: &[TaskColumn<'_>]) -> String {
    let mut out = String::new();
    for column in columns {
        let _ = writeln!(out, "{} ({})", column.status.label(), column.tasks.len());
        for task in &column.tasks {
            let due = task
                .due_date
                .map(|d| format!("  due {}", d.format("%Y-%m-%d %H:%M")))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "  [{}] {} ({}){}",
                task.id,
                task.title,
                task.priority.as_str(),
                due
            );
        }
    }
    out
}

pub fn search_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No matches.\n".to_string();
    }
    let mut out = String::new();
    for hit in hits {
        let _ = match hit {
            SearchHit::Lead(lead) => writeln!(out, "lead  {}  {} ({})", lead.id, lead.name, lead.company),
            SearchHit::Task(task) => writeln!(out, "task  {}  {} [{}]", task.id, task.title, task.status),
        };
    }
    out
}

pub fn write_outcome(outcome: &WriteOutcome) -> String {
    match outcome {
        WriteOutcome::Confirmed => "Saved.".to_string(),
        WriteOutcome::Superseded { .. } => {
            "Saved, but a newer change to the same record was overwritten; reloaded.".to_string()
        }
        WriteOutcome::Failed {
            error,
            reconciled: true,
        } => format!("Failed to save ({error}); reloaded from the server."),
        WriteOutcome::Failed {
            error,
            reconciled: false,
        } => format!("Failed to save ({error}); reload also failed."),
        WriteOutcome::Detached { .. } => "Closed before the save finished.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use flowline_core::metrics;
    use flowline_core::{PipelineStage, Task, TaskPriority, TaskStatus};

    #[test]
    fn money_groups_thousands() {
        assert_eq!(money(0.0), "$0");
        assert_eq!(money(950.4), "$950");
        assert_eq!(money(12_000.0), "$12,000");
        assert_eq!(money(1_234_567.0), "$1,234,567");
        assert_eq!(money(-2_500.0), "-$2,500");
    }

    #[test]
    fn dashboard_lists_every_figure() {
        let text = dashboard(&DashboardKpis {
            pipeline_value: 24_500.0,
            active_leads: 3,
            won_leads: 1,
            conversion_rate: 33,
        });
        assert!(text.contains("$24,500"));
        assert!(text.contains("Conversion rate  33%"));
    }

    #[test]
    fn pipeline_rows_follow_stage_order() {
        let text = pipeline(&[
            StageSummary {
                stage: PipelineStage::New,
                count: 2,
                total_value: 4_000.0,
            },
            StageSummary {
                stage: PipelineStage::Won,
                count: 0,
                total_value: 0.0,
            },
        ]);
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].starts_with("New"));
        assert!(lines[1].starts_with("Won"));
    }

    #[test]
    fn task_board_shows_column_labels_and_due_dates() {
        let task = Task {
            id: "t1".to_string(),
            user_id: "u".to_string(),
            title: "Send proposal".to_string(),
            description: None,
            status: TaskStatus::Waiting,
            priority: TaskPriority::High,
            due_date: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            related_lead_id: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let tasks = [task];
        let text = task_board(&metrics::task_board(&tasks));
        assert!(text.contains("To Do (0)"));
        assert!(text.contains("Waiting (1)"));
        assert!(text.contains("[t1] Send proposal (HIGH)  due 2024-03-01 12:00"));
    }

    #[test]
    fn write_outcomes_read_plainly() {
        assert_eq!(write_outcome(&WriteOutcome::Confirmed), "Saved.");
        assert!(write_outcome(&WriteOutcome::Failed {
            error: "500".to_string(),
            reconciled: true,
        })
        .contains("reloaded"));
    }
}
