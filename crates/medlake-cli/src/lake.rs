//! `medlake lake ...` handlers. These only touch local disk.

use medlake_core::AppConfig;
use medlake_lake::DataLake;

/// Longest text excerpt printed by `lake latest`.
const EXCERPT_CHARS: usize = 80;

pub(crate) fn run_stats(config: &AppConfig) -> anyhow::Result<()> {
    let stats = DataLake::new(&config.data_dir).get_stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub(crate) fn run_validate(config: &AppConfig, channel: &str) -> anyhow::Result<()> {
    let report = DataLake::new(&config.data_dir).validate_integrity(channel);
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_clean() {
        tracing::warn!(
            channel,
            invalid_files = report.invalid_files,
            duplicates = report.duplicate_messages,
            "integrity issues found"
        );
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if any eligible partition could not be removed.
pub(crate) fn run_cleanup(config: &AppConfig, days_to_keep: u32) -> anyhow::Result<()> {
    let report = DataLake::new(&config.data_dir).cleanup_older_than(days_to_keep);
    for path in &report.removed {
        println!("removed {}", path.display());
    }
    println!(
        "cleanup complete: {} partitions removed, {} failed",
        report.removed.len(),
        report.failed.len()
    );
    if !report.failed.is_empty() {
        anyhow::bail!("failed to remove {} partitions", report.failed.len());
    }
    Ok(())
}

pub(crate) fn run_latest(config: &AppConfig, channel: &str, limit: usize) -> anyhow::Result<()> {
    let messages = DataLake::new(&config.data_dir).get_latest_messages(channel, limit);
    if messages.is_empty() {
        println!("no stored messages for {channel}");
        return Ok(());
    }
    for stored in &messages {
        let message = &stored.message;
        println!(
            "{} #{} {}",
            message.date.format("%Y-%m-%d %H:%M:%S"),
            message.message_id,
            excerpt(&message.text)
        );
    }
    Ok(())
}

fn excerpt(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > EXCERPT_CHARS {
        let cut: String = line.chars().take(EXCERPT_CHARS).collect();
        format!("{cut}...")
    } else {
        line.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::excerpt;

    #[test]
    fn excerpt_keeps_short_first_line() {
        assert_eq!(excerpt("Amoxicillin 500mg\nin stock"), "Amoxicillin 500mg");
        assert_eq!(excerpt(""), "");
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let long = "ሀ".repeat(100);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 83);
    }
}
