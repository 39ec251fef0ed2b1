use medlake_core::ChannelRegistry;

/// Print the enabled channels' schedule and the registry validation result.
///
/// # Errors
///
/// Returns an error if the registry fails validation.
pub(crate) fn run_channels(registry: &ChannelRegistry) -> anyhow::Result<()> {
    for (username, entry) in registry.schedule() {
        println!(
            "{username}: {} [{}] priority {}, {} messages every {}h, images {}, documents {}",
            entry.name,
            entry.category,
            entry.priority,
            entry.scraping_limit,
            entry.scraping_interval_hours,
            yes_no(entry.image_download),
            yes_no(entry.document_download),
        );
    }

    let validation = registry.validate();
    println!(
        "{} channels, {} enabled, categories: {}",
        validation.total_channels,
        validation.enabled_channels,
        validation.categories.join(", ")
    );
    for warning in &validation.warnings {
        println!("warning: {warning}");
    }
    for error in &validation.errors {
        println!("error: {error}");
    }

    if !validation.is_valid() {
        anyhow::bail!("channel registry has {} errors", validation.errors.len());
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
