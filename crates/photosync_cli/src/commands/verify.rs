//! Sync log integrity check.

use super::Settings;

/// Scans every log record and reports damage.
pub fn run(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = settings.open_catalog()?;
    let report = catalog.verify()?;

    settings.emit(&report, || {
        println!("Records:      {}", report.records);
        println!(
            "Valid bytes:  {} / {}",
            report.valid_bytes, report.total_bytes
        );
        if report.torn_tail {
            println!("  ✗ log ends in a partial record");
        }
        for offset in &report.undecodable {
            println!("  ✗ undecodable record at offset {offset}");
        }
        if report.is_clean() {
            println!("✓ Sync log is intact");
        }
    })?;

    if report.is_clean() {
        Ok(())
    } else {
        Err("Verification failed".into())
    }
}
