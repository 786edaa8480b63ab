//! Pull, push and sync commands.

use super::Settings;
use photosync_engine::{PassReport, SyncReport};
use photosync_protocol::{PassStatus, Strategy};

/// Runs a pull pass.
pub fn pull(settings: &Settings, strategy: Strategy) -> Result<(), Box<dyn std::error::Error>> {
    let engine = settings.engine()?;
    let report = engine.pull(strategy)?;
    settings.emit(&report, || print_pass(&report))?;
    check(&report)
}

/// Runs a push pass.
pub fn push(settings: &Settings, strategy: Strategy) -> Result<(), Box<dyn std::error::Error>> {
    let engine = settings.engine()?;
    let report = engine.push(strategy)?;
    settings.emit(&report, || print_pass(&report))?;
    check(&report)
}

/// Runs the passes `strategy` calls for.
pub fn sync(settings: &Settings, strategy: Strategy) -> Result<(), Box<dyn std::error::Error>> {
    let engine = settings.engine()?;
    let report = engine.sync(strategy)?;
    settings.emit(&report, || print_sync(&report))?;

    for pass in [&report.pull, &report.push].into_iter().flatten() {
        check(pass)?;
    }
    Ok(())
}

pub(crate) fn print_sync(report: &SyncReport) {
    if report.pull.is_none() && report.push.is_none() {
        println!("Nothing to do");
    }
    for pass in [&report.pull, &report.push].into_iter().flatten() {
        print_pass(pass);
    }
}

pub(crate) fn print_pass(report: &PassReport) {
    println!("{} ({}): {}", report.direction, report.pass_id, report.status);
    if report.is_noop() && report.failed == 0 {
        println!("  Already in sync");
    } else {
        println!("  Transferred: {}", report.transferred);
        println!("  Updated:     {}", report.updated);
        println!("  Deleted:     {}", report.deleted);
    }
    if report.conflicts_resolved > 0 {
        println!("  Conflicts:   {}", report.conflicts_resolved);
    }
    if report.skipped > 0 {
        println!("  Skipped:     {}", report.skipped);
    }
    for failed in &report.items.failed {
        println!("  ✗ {}: {}", failed.name, failed.error);
    }
}

fn check(report: &PassReport) -> Result<(), Box<dyn std::error::Error>> {
    if report.status == PassStatus::Cancelled {
        return Err(format!("{} pass was cancelled", report.direction).into());
    }
    if report.failed > 0 {
        return Err(format!("{} item(s) failed to {}", report.failed, report.direction).into());
    }
    Ok(())
}
