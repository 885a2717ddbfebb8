use anyhow::{Result, bail};
use chrono::Local;
use rclonekit::Client;

use super::RunStatus;
use crate::Context;
use crate::config::Config;
use crate::engine::{self, SweepEvent, SweepOptions, SweepReport};
use crate::ui;

/// Verify and delete uploads past the grace period
pub fn run(ctx: &Context, config: &Config, dry_run: bool) -> Result<RunStatus> {
    if !ctx.quiet {
        ui::header("Cleaning up uploaded folders");
        ui::kv("Ledger", &config.ledger_path.display().to_string());
        ui::kv("Verify against", config.primary_drive());
    }

    let client = Client::new(config.rclone.clone());
    if !dry_run && !client.is_available() {
        bail!("rclone not found or not runnable: {}", config.rclone.binary);
    }
    let report = engine::sweep(
        &config.ledger(),
        &config.mapping,
        config.primary_drive(),
        &client,
        Local::now(),
        SweepOptions {
            grace: config.cleanup_grace,
            dry_run,
        },
        &mut |event| show_event(event),
    )?;

    show_summary(&report, dry_run);
    Ok(RunStatus::Completed)
}

fn show_event(event: SweepEvent<'_>) {
    match event {
        SweepEvent::Checking {
            index,
            total,
            folder,
            remote,
        } => ui::step(index, total, &format!("Checking {} against {}", folder.display(), remote)),
        SweepEvent::Deleted { folder } => ui::success(&format!("Deleted {}", folder.display())),
        SweepEvent::Mismatch {
            folder,
            differences,
        } => ui::warn(&format!(
            "{} is incomplete remotely ({} differences), keeping local copy",
            folder.display(),
            differences
        )),
        SweepEvent::AlreadyGone { folder } => {
            ui::dim(&format!("{} no longer exists locally", folder.display()))
        }
        SweepEvent::DeleteFailed { folder, error } => {
            ui::error(&format!("Could not delete {}: {}", folder.display(), error))
        }
        SweepEvent::Unreadable { folder, error } => ui::error(&format!(
            "Could not inspect {}: {}, left in ledger",
            folder.display(),
            error
        )),
        SweepEvent::Unmapped { folder } => ui::warn(&format!(
            "No mapping rule covers {}, left in ledger",
            folder.display()
        )),
        SweepEvent::WouldCheck { folder, remote } => {
            ui::info(&format!("Would check {} against {}", folder.display(), remote))
        }
    }
}

fn show_summary(report: &SweepReport, dry_run: bool) {
    println!();
    if dry_run {
        ui::info(&format!(
            "{} due for verification, {} still in grace period (dry run)",
            report.would_check.len(),
            report.not_due
        ));
    } else {
        ui::success(&format!(
            "Retired {} entries: {} deleted, {} kept after mismatch, {} already gone",
            report.retired(),
            report.deleted.len(),
            report.kept_mismatch.len(),
            report.already_gone.len()
        ));
        if !report.delete_failed.is_empty() {
            ui::warn(&format!(
                "{} verified folders could not be deleted",
                report.delete_failed.len()
            ));
        }
        ui::dim(&format!("{} entries still in grace period", report.not_due));
    }
    if !report.unreadable.is_empty() {
        ui::warn(&format!(
            "{} entries could not be inspected and will be retried next run",
            report.unreadable.len()
        ));
    }
    if !report.unmapped.is_empty() {
        ui::warn(&format!(
            "{} entries have no mapping rule; fix mapping_rules or remove them from the ledger",
            report.unmapped.len()
        ));
    }
}
