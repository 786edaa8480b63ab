//! Status and log inspection. Neither command contacts the server.

use super::Settings;

/// Prints item counts and the last successful sync time.
pub fn status(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = settings.open_catalog()?;
    let status = catalog.query_status();

    settings.emit(&status, || {
        println!("Local items:  {}", status.local_count);
        println!("Remote items: {}", status.remote_count);
        match status.last_sync_time {
            Some(ts) => println!("Last sync:    {ts}"),
            None => println!("Last sync:    never"),
        }
    })
}

/// Prints up to `limit` log entries, newest first.
pub fn logs(settings: &Settings, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = settings.open_catalog()?;
    let entries = catalog.query_logs(limit);

    settings.emit(&entries, || {
        if entries.is_empty() {
            println!("No sync passes recorded");
        }
        for entry in &entries {
            println!("{}  {}", entry.timestamp, entry.summary());
        }
    })
}
