//! Markdown renderings of schedules for chat delivery.

use dutyroll_core::{Period, RotationOutcome, Schedule, ScheduleLookup};

/// Schedule as a monospace table under a week header.
pub fn schedule_table(schedule: &Schedule, period: Period) -> String {
    if schedule.is_empty() {
        return "📋 No assignments yet. Use /shuffle to create them.".to_string();
    }

    let width = schedule
        .iter()
        .map(|(task, _)| task.chars().count())
        .max()
        .unwrap_or(0);

    let mut lines = vec![
        format!("🧹 *Cleaning Schedule - Week {period}*"),
        String::new(),
        "```".to_string(),
    ];
    for (task, members) in schedule.iter() {
        let members = if members.is_empty() {
            "No one assigned".to_string()
        } else {
            members.join(", ")
        };
        lines.push(format!("{task:<width$} │ {members}"));
    }
    lines.push("```".to_string());
    lines.join("\n")
}

/// Current-schedule text, or the "not shuffled yet" hint.
pub fn lookup_text(lookup: &ScheduleLookup, period: Period) -> String {
    match lookup {
        ScheduleLookup::Current(schedule) => schedule_table(schedule, period),
        ScheduleLookup::NoScheduleYet => {
            "📋 No assignments for this week. Admin can use /shuffle to create them.".to_string()
        }
    }
}

/// Reply to a manual shuffle.
pub fn rotation_text(outcome: &RotationOutcome, period: Period) -> String {
    match outcome {
        RotationOutcome::Assigned(schedule) => {
            format!("🔀 *Assignments shuffled!*\n\n{}", schedule_table(schedule, period))
        }
        RotationOutcome::EmptyMembers => {
            "⚠️ Cannot shuffle: no active members. Add members first.".to_string()
        }
        RotationOutcome::EmptyTasks => {
            "⚠️ Cannot shuffle: no active tasks. Add tasks first.".to_string()
        }
    }
}

/// The weekly group reminder for a stored schedule.
pub fn weekly_reminder(lookup: &ScheduleLookup, period: Period) -> String {
    reminder(&lookup_text(lookup, period))
}

/// The weekly group reminder for a rotation that just ran.
pub fn rotation_reminder(outcome: &RotationOutcome, period: Period) -> String {
    match outcome.schedule() {
        Some(schedule) => reminder(&schedule_table(schedule, period)),
        None => reminder(&rotation_text(outcome, period)),
    }
}

fn reminder(body: &str) -> String {
    format!("🔔 *Weekly Cleaning Reminder!*\n\n{body}\n\nGood luck everyone! 💪")
}

/// Direct message listing one member's tasks. `None` when there are none.
pub fn member_tasks(tasks: &[String]) -> Option<String> {
    if tasks.is_empty() {
        return None;
    }
    let list = tasks
        .iter()
        .map(|t| format!("• {t}"))
        .collect::<Vec<_>>()
        .join("\n");
    Some(format!(
        "🧹 *Your Cleaning Tasks This Week:*\n\n{list}\n\nDon't forget to complete them! 💪"
    ))
}
