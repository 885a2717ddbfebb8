use anyhow::{Context as _, Result};
use chrono::{DateTime, Local};
use colored::Colorize;
use ledger::{Entries, LedgerEntry};

use super::RunStatus;
use crate::Context;
use crate::config::Config;
use crate::mapping::MappingTable;
use crate::ui;

/// Read-only view of the ledger
pub fn run(ctx: &Context, config: &Config) -> Result<RunStatus> {
    let ledger = config.ledger();
    let entries = ledger
        .load()
        .with_context(|| format!("Could not read ledger {}", ledger.path().display()))?;

    ui::header("Pending cleanup");
    ui::kv("Ledger", &ledger.path().display().to_string());
    ui::kv("Grace period", &ui::format_age(grace(config)));
    ui::kv("Drives", &config.drives.join(", "));
    ui::kv("Daily budget", &ui::format_size(config.daily_budget_bytes));

    let rows = classify(&entries, &config.mapping, Local::now(), config.cleanup_grace);
    if rows.is_empty() {
        ui::info("Nothing is waiting for cleanup");
        return Ok(RunStatus::Completed);
    }

    ui::section("Entries");
    for row in &rows {
        let label = match row.state {
            EntryState::Due => format!("{:>8}", "due").green(),
            EntryState::Waiting => format!("{:>8}", "waiting").normal(),
            EntryState::Unmapped => format!("{:>8}", "unmapped").yellow(),
        };
        println!(
            "  {} {:>5}  {}",
            label,
            ui::format_age(row.age),
            row.entry.path.display()
        );
        if ctx.verbose > 0 {
            ui::dim(&format!("uploaded {}", row.entry.uploaded_at.to_rfc3339()));
        }
    }

    let count = |state| rows.iter().filter(|r| r.state == state).count();
    println!();
    ui::kv(
        "Summary",
        &format!(
            "{} total, {} due, {} waiting, {} unmapped",
            rows.len(),
            count(EntryState::Due),
            count(EntryState::Waiting),
            count(EntryState::Unmapped)
        ),
    );
    Ok(RunStatus::Completed)
}

fn grace(config: &Config) -> chrono::Duration {
    chrono::Duration::from_std(config.cleanup_grace).unwrap_or(chrono::Duration::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Due,
    Waiting,
    Unmapped,
}

#[derive(Debug)]
struct Row {
    entry: LedgerEntry,
    age: chrono::Duration,
    state: EntryState,
}

/// Ledger entries with their age and sweep state, oldest first
fn classify(
    entries: &Entries,
    mapping: &MappingTable,
    now: DateTime<Local>,
    grace: std::time::Duration,
) -> Vec<Row> {
    let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::MAX);
    let mut rows: Vec<Row> = entries
        .iter()
        .map(|entry| {
            let age = entry.age(now);
            let state = if mapping.resolve(&entry.path).is_none() {
                EntryState::Unmapped
            } else if now - entry.uploaded_at >= grace {
                EntryState::Due
            } else {
                EntryState::Waiting
            };
            Row { entry, age, state }
        })
        .collect();
    rows.sort_by(|a, b| a.entry.uploaded_at.cmp(&b.entry.uploaded_at));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingRule;
    use std::path::Path;

    #[test]
    fn test_classify() {
        let now = Local::now();
        let mut entries = Entries::new();
        entries
            .insert("/local/movies/old", now - chrono::Duration::days(10))
            .unwrap();
        entries
            .insert("/local/movies/new", now - chrono::Duration::days(2))
            .unwrap();
        entries
            .insert("/elsewhere/stray", now - chrono::Duration::days(30))
            .unwrap();
        let mapping = MappingTable::new(vec![MappingRule::new("/local/movies", "/movies")]);

        let rows = classify(
            &entries,
            &mapping,
            now,
            std::time::Duration::from_secs(7 * 86_400),
        );

        let summary: Vec<_> = rows
            .iter()
            .map(|r| (r.entry.path.as_path(), r.state))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Path::new("/elsewhere/stray"), EntryState::Unmapped),
                (Path::new("/local/movies/old"), EntryState::Due),
                (Path::new("/local/movies/new"), EntryState::Waiting),
            ]
        );
    }

    #[test]
    fn test_classify_matches_sweeper_for_future_entries() {
        let now = Local::now();
        let mut entries = Entries::new();
        entries
            .insert("/local/movies/clock-skew", now + chrono::Duration::hours(1))
            .unwrap();
        let mapping = MappingTable::new(vec![MappingRule::new("/local/movies", "/movies")]);

        let rows = classify(&entries, &mapping, now, std::time::Duration::ZERO);
        let due = entries.due(now, std::time::Duration::ZERO);

        assert_eq!(rows[0].state, EntryState::Waiting);
        assert!(due.is_empty());
        assert_eq!(rows[0].age, chrono::Duration::zero());
    }
}
