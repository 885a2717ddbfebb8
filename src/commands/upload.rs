use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use rclonekit::Client;

use super::RunStatus;
use crate::Context;
use crate::config::Config;
use crate::engine::{self, LocalProbe, ScanReport, Selection, UploadEvent, UploadOutcome};
use crate::progress;
use crate::ui;

/// Scan, select and upload
pub fn run(ctx: &Context, config: &Config, dry_run: bool) -> Result<RunStatus> {
    let ledger = config.ledger();
    let pending = ledger
        .load()
        .with_context(|| format!("Could not read ledger {}", ledger.path().display()))?;

    // Step 1: Scan
    if !ctx.quiet {
        ui::header("Scanning folders");
    }
    let pb = progress::spinner("Measuring folders", ctx.quiet);
    let mut report = engine::scan(&config.mapping, &pending, &LocalProbe, &mut |path| {
        pb.set_message(path.display().to_string());
        pb.inc(1);
    });
    pb.finish_and_clear();
    show_scan(ctx, &report);

    // Step 2: Select
    let selection = engine::select(std::mem::take(&mut report.candidates), config.daily_budget_bytes);
    show_selection(ctx, config, &selection);

    if selection.selected.is_empty() {
        ui::info("Nothing to upload");
        return Ok(run_status(&report, None));
    }

    if dry_run {
        show_plan(config, &selection);
        return Ok(run_status(&report, None));
    }

    // Step 3: Upload
    if !ctx.quiet {
        ui::header("Uploading");
    }
    let client = Client::new(config.rclone.clone());
    if !client.is_available() {
        bail!("rclone not found or not runnable: {}", config.rclone.binary);
    }
    let upload = engine::upload(
        &selection.selected,
        &config.mapping,
        &config.drives,
        &client,
        &ledger,
        &mut |event| show_event(event),
    )?;

    log::debug!(
        "{} copy attempts, last drive {}",
        upload.attempts,
        config
            .drives
            .get(upload.drive_index)
            .map_or("(none left)", String::as_str)
    );

    println!();
    match &upload.outcome {
        UploadOutcome::Completed => {
            ui::success(&format!(
                "Uploaded {} folders ({}), {} deferred to a later run",
                upload.uploaded.len(),
                ui::format_size(selection.total_bytes),
                selection.deferred.len()
            ));
        }
        UploadOutcome::DrivesExhausted { folder, remaining } => {
            ui::error(&format!(
                "All {} drives failed at {}; {} selected folders not uploaded",
                config.drives.len(),
                folder.display(),
                remaining
            ));
            if !upload.uploaded.is_empty() {
                ui::info(&format!("{} folders were uploaded before that", upload.uploaded.len()));
            }
        }
    }
    Ok(run_status(&report, Some(&upload.outcome)))
}

/// Exit status for a run. Drive exhaustion outranks scan errors, since it
/// means selected folders were not uploaded at all.
fn run_status(scan: &ScanReport, outcome: Option<&UploadOutcome>) -> RunStatus {
    match outcome {
        Some(UploadOutcome::DrivesExhausted { .. }) => RunStatus::DrivesExhausted,
        _ if scan.has_errors() => RunStatus::ScanErrors,
        _ => RunStatus::Completed,
    }
}

fn show_scan(ctx: &Context, report: &ScanReport) {
    if !ctx.quiet {
        ui::kv("Candidates", &report.candidates.len().to_string());
        ui::kv("Total size", &ui::format_size(report.total_bytes()));
        ui::kv("Waiting for cleanup", &report.skipped_in_ledger.len().to_string());
        for root in &report.missing_roots {
            ui::dim(&format!("missing root: {}", root.display()));
        }
    }
    for failed in &report.failed_roots {
        ui::warn(&format!(
            "Skipped {} ({}: {})",
            failed.root.display(),
            failed.path.display(),
            failed.error
        ));
    }
}

fn show_selection(ctx: &Context, config: &Config, selection: &Selection) {
    if ctx.quiet {
        return;
    }
    ui::section("Selection");
    ui::kv("Daily budget", &ui::format_size(config.daily_budget_bytes));
    ui::kv(
        "Selected",
        &format!(
            "{} folders, {}",
            selection.selected.len(),
            ui::format_size(selection.total_bytes)
        ),
    );
    if let Some(next) = selection.deferred.first() {
        ui::kv(
            "Deferred",
            &format!(
                "{} folders, starting with {} ({})",
                selection.deferred.len(),
                next.path.display(),
                ui::format_size(next.size_bytes)
            ),
        );
    }
}

fn show_plan(config: &Config, selection: &Selection) {
    ui::section("Would upload (dry run)");
    let drive = config.primary_drive();
    for candidate in &selection.selected {
        let destination = config
            .mapping
            .destination_for(&candidate.path, drive)
            .map(|remote| remote.to_string())
            .unwrap_or_else(|| "<unmapped>".to_string());
        println!(
            "  {} {} {}",
            candidate.path.display(),
            "→".dimmed(),
            destination.cyan()
        );
        ui::dim(&format!(
            "{}, created {}",
            ui::format_size(candidate.size_bytes),
            candidate.created_at.format("%Y-%m-%d %H:%M")
        ));
    }
}

fn show_event(event: UploadEvent<'_>) {
    match event {
        UploadEvent::Attempt {
            index,
            total,
            folder,
            destination,
        } => ui::step(
            index,
            total,
            &format!(
                "{} {} {} (drive {})",
                folder.display(),
                "→".dimmed(),
                destination.to_string().cyan(),
                destination.drive.bold()
            ),
        ),
        UploadEvent::Failed {
            folder,
            drive,
            exit_code,
        } => {
            let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            ui::warn(&format!(
                "Upload of {} to {} failed (exit {}), switching drive",
                folder.display(),
                drive,
                code
            ));
        }
        UploadEvent::Uploaded {
            folder,
            destination,
        } => {
            ui::success(&format!("Uploaded {} to {}", folder.display(), destination.drive));
        }
        UploadEvent::AlreadyRecorded { folder } => {
            ui::warn(&format!("{} was already waiting for cleanup", folder.display()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scanner::FailedRoot;
    use std::io;
    use std::path::PathBuf;

    fn clean_scan() -> ScanReport {
        ScanReport::default()
    }

    fn failed_scan() -> ScanReport {
        ScanReport {
            failed_roots: vec![FailedRoot {
                root: PathBuf::from("/local/movies"),
                path: PathBuf::from("/local/movies/denied"),
                error: io::Error::other("permission denied"),
            }],
            ..Default::default()
        }
    }

    fn exhausted() -> UploadOutcome {
        UploadOutcome::DrivesExhausted {
            folder: PathBuf::from("/local/movies/A"),
            remaining: 2,
        }
    }

    #[test]
    fn test_run_status_without_upload() {
        assert_eq!(run_status(&clean_scan(), None), RunStatus::Completed);
        assert_eq!(run_status(&failed_scan(), None), RunStatus::ScanErrors);
    }

    #[test]
    fn test_run_status_after_completed_upload() {
        let done = UploadOutcome::Completed;
        assert_eq!(run_status(&clean_scan(), Some(&done)), RunStatus::Completed);
        assert_eq!(run_status(&failed_scan(), Some(&done)), RunStatus::ScanErrors);
    }

    #[test]
    fn test_run_status_drive_exhaustion_wins() {
        let outcome = exhausted();
        assert_eq!(run_status(&clean_scan(), Some(&outcome)), RunStatus::DrivesExhausted);
        assert_eq!(run_status(&failed_scan(), Some(&outcome)), RunStatus::DrivesExhausted);
        assert_ne!(
            run_status(&clean_scan(), Some(&outcome)).exit_code(),
            run_status(&clean_scan(), None).exit_code()
        );
    }
}
