use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::stats::{SleepRecord, is_healthy};
use crate::traits::Clock;

#[derive(Serialize)]
struct CsvRow {
    sleep_date: String,
    hours_slept: f64,
    healthy: bool,
}

/// Export sleep logs to a CSV file.
///
/// Rows are written oldest first to a timestamped file in `output_dir`,
/// which is created if missing.
///
/// # Returns
/// The path of the created file
pub fn export_sleep_csv<C: Clock + ?Sized>(
    records: &[SleepRecord],
    output_dir: &Path,
    clock: &C,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).context("Failed to create export directory")?;

    let timestamp = clock.now_local().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("sleep_logs_{}.csv", timestamp));

    let mut sorted: Vec<&SleepRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.sleep_date);

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;
    // Written up front so an empty history still gets a header line
    writer
        .write_record(["sleep_date", "hours_slept", "healthy"])
        .context("Failed to write CSV header")?;
    for record in sorted {
        writer
            .serialize(CsvRow {
                sleep_date: record.sleep_date.format("%Y-%m-%d").to_string(),
                hours_slept: record.hours_slept,
                healthy: is_healthy(record.hours_slept),
            })
            .context("Failed to write CSV row")?;
    }
    writer.flush().context("Failed to flush CSV file")?;

    tracing::info!("Exported {} sleep logs to {}", records.len(), path.display());
    Ok(path)
}
