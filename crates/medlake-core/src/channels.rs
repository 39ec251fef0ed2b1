//! Channel registry: the fixed set of public channels to ingest and the
//! per-channel scraping policy.
//!
//! Every derived listing (schedule, category/priority filters, media
//! analysis sets) is computed from the *enabled* channels only.
//! [`ChannelRegistry::metadata`] and [`ChannelRegistry::get`] are the
//! exceptions and see disabled channels too.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Public channel usernames: 5–32 chars, letter first, letters/digits/underscore.
static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]{4,31}$").expect("static regex is valid")
});

/// Numeric chat ids, as accepted in place of a username.
static CHAT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]{1,20}$").expect("static regex is valid"));

/// Whether `name` can address a channel outside the registry: a public
/// username or a numeric chat id. Anything else is rejected before it is
/// used as a path component in the lake.
#[must_use]
pub fn is_valid_channel_ref(name: &str) -> bool {
    USERNAME_RE.is_match(name) || CHAT_ID_RE.is_match(name)
}

fn default_true() -> bool {
    true
}

fn default_scrape_limit() -> usize {
    1000
}

fn default_interval_hours() -> u32 {
    24
}

/// Scraping policy for a single channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPolicy {
    pub username: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// 1 is the highest priority.
    pub priority: u8,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_scrape_limit")]
    pub scrape_limit: usize,
    #[serde(default = "default_interval_hours")]
    pub scrape_interval_hours: u32,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_true")]
    pub image_download: bool,
    #[serde(default = "default_true")]
    pub document_download: bool,
}

impl ChannelPolicy {
    /// Policy for a channel requested by name that is not in the registry.
    ///
    /// Ad-hoc channels download every media type and have no per-run cap
    /// beyond what the caller asks for.
    #[must_use]
    pub fn adhoc(username: &str) -> Self {
        Self {
            username: username.to_owned(),
            name: username.to_owned(),
            description: String::new(),
            category: "adhoc".to_owned(),
            priority: 10,
            enabled: true,
            scrape_limit: usize::MAX,
            scrape_interval_hours: default_interval_hours(),
            keywords: Vec::new(),
            image_download: true,
            document_download: true,
        }
    }
}

/// One enabled channel's entry in the scraping schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub name: String,
    pub category: String,
    pub priority: u8,
    pub scraping_limit: usize,
    pub scraping_interval_hours: u32,
    pub keywords: Vec<String>,
    pub image_download: bool,
    pub document_download: bool,
}

/// Result of [`ChannelRegistry::validate`]. Errors are fatal for a YAML load;
/// warnings are informational.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryValidation {
    pub total_channels: usize,
    pub enabled_channels: usize,
    pub categories: Vec<String>,
    pub priorities: Vec<u8>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RegistryValidation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChannelsFile {
    pub channels: Vec<ChannelPolicy>,
}

/// Read-only set of channel policies, loaded once per process.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: Vec<ChannelPolicy>,
}

impl Default for ChannelRegistry {
    /// The built-in medical business channels.
    fn default() -> Self {
        let keywords = |words: &[&str]| words.iter().map(|w| (*w).to_owned()).collect();
        Self::new(vec![
            ChannelPolicy {
                username: "chemed".to_owned(),
                name: "Chemed Telegram Channel".to_owned(),
                description: "Official channel for Chemed medical products and services"
                    .to_owned(),
                category: "pharmaceutical".to_owned(),
                priority: 1,
                enabled: true,
                scrape_limit: 2000,
                scrape_interval_hours: 12,
                keywords: keywords(&[
                    "medicine",
                    "pharmaceutical",
                    "health",
                    "medical",
                    "drugs",
                    "treatment",
                ]),
                image_download: true,
                document_download: true,
            },
            ChannelPolicy {
                username: "lobelia4cosmetics".to_owned(),
                name: "Lobelia4cosmetics".to_owned(),
                description: "Cosmetics and beauty products channel".to_owned(),
                category: "cosmetics".to_owned(),
                priority: 2,
                enabled: true,
                scrape_limit: 1500,
                scrape_interval_hours: 24,
                keywords: keywords(&["cosmetics", "beauty", "skincare", "makeup", "personal_care"]),
                image_download: true,
                document_download: true,
            },
            ChannelPolicy {
                username: "tikvahpharma".to_owned(),
                name: "Tikvah Pharma".to_owned(),
                description: "Tikvah pharmaceutical products and services".to_owned(),
                category: "pharmaceutical".to_owned(),
                priority: 1,
                enabled: true,
                scrape_limit: 2000,
                scrape_interval_hours: 12,
                keywords: keywords(&[
                    "pharma",
                    "medicine",
                    "healthcare",
                    "medical",
                    "drugs",
                    "treatment",
                ]),
                image_download: true,
                document_download: true,
            },
        ])
    }
}

impl ChannelRegistry {
    #[must_use]
    pub fn new(channels: Vec<ChannelPolicy>) -> Self {
        Self { channels }
    }

    /// Every configured channel, enabled or not.
    #[must_use]
    pub fn all(&self) -> &[ChannelPolicy] {
        &self.channels
    }

    pub fn enabled(&self) -> impl Iterator<Item = &ChannelPolicy> {
        self.channels.iter().filter(|c| c.enabled)
    }

    #[must_use]
    pub fn by_category(&self, category: &str) -> Vec<&ChannelPolicy> {
        self.enabled().filter(|c| c.category == category).collect()
    }

    /// Enabled channels whose priority is `max_priority` or more urgent.
    #[must_use]
    pub fn by_priority(&self, max_priority: u8) -> Vec<&ChannelPolicy> {
        self.enabled().filter(|c| c.priority <= max_priority).collect()
    }

    /// Look up a channel by username, including disabled ones.
    #[must_use]
    pub fn get(&self, username: &str) -> Option<&ChannelPolicy> {
        self.channels.iter().find(|c| c.username == username)
    }

    #[must_use]
    pub fn usernames(&self) -> Vec<&str> {
        self.enabled().map(|c| c.username.as_str()).collect()
    }

    #[must_use]
    pub fn for_image_analysis(&self) -> Vec<&ChannelPolicy> {
        self.enabled().filter(|c| c.image_download).collect()
    }

    #[must_use]
    pub fn for_document_analysis(&self) -> Vec<&ChannelPolicy> {
        self.enabled().filter(|c| c.document_download).collect()
    }

    #[must_use]
    pub fn schedule(&self) -> BTreeMap<String, ScheduleEntry> {
        self.enabled()
            .map(|c| {
                (
                    c.username.clone(),
                    ScheduleEntry {
                        name: c.name.clone(),
                        category: c.category.clone(),
                        priority: c.priority,
                        scraping_limit: c.scrape_limit,
                        scraping_interval_hours: c.scrape_interval_hours,
                        keywords: c.keywords.clone(),
                        image_download: c.image_download,
                        document_download: c.document_download,
                    },
                )
            })
            .collect()
    }

    /// Descriptive metadata for every channel, keyed by username.
    #[must_use]
    pub fn metadata(&self) -> BTreeMap<String, serde_json::Value> {
        self.channels
            .iter()
            .map(|c| {
                (
                    c.username.clone(),
                    serde_json::json!({
                        "name": c.name,
                        "description": c.description,
                        "category": c.category,
                        "priority": c.priority,
                        "enabled": c.enabled,
                        "keywords": c.keywords,
                        "scraping_config": {
                            "limit": c.scrape_limit,
                            "interval_hours": c.scrape_interval_hours,
                        },
                        "download_config": {
                            "images": c.image_download,
                            "documents": c.document_download,
                        },
                    }),
                )
            })
            .collect()
    }

    #[must_use]
    pub fn validate(&self) -> RegistryValidation {
        let mut report = RegistryValidation {
            total_channels: self.channels.len(),
            enabled_channels: self.enabled().count(),
            ..RegistryValidation::default()
        };

        let mut seen = HashSet::new();
        let mut categories = BTreeSet::new();
        let mut priorities = BTreeSet::new();

        for channel in &self.channels {
            if !seen.insert(channel.username.to_lowercase()) {
                report
                    .errors
                    .push(format!("duplicate username: {}", channel.username));
            }
            if !USERNAME_RE.is_match(&channel.username) {
                report
                    .errors
                    .push(format!("malformed username: '{}'", channel.username));
            }

            categories.insert(channel.category.clone());
            priorities.insert(channel.priority);

            if channel.scrape_limit == 0 {
                report
                    .errors
                    .push(format!("invalid scraping limit for {}", channel.username));
            }
            if channel.scrape_interval_hours == 0 {
                report
                    .errors
                    .push(format!("invalid scraping interval for {}", channel.username));
            }
            if !(1..=10).contains(&channel.priority) {
                report.warnings.push(format!(
                    "priority {} for {} is outside 1..=10",
                    channel.priority, channel.username
                ));
            }
        }

        report.categories = categories.into_iter().collect();
        report.priorities = priorities.into_iter().collect();
        report
    }
}

/// Load and validate a channel registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_channels(path: &Path) -> Result<ChannelRegistry, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ChannelsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: ChannelsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::ChannelsFileParse)?;

    let registry = ChannelRegistry::new(file.channels);
    let validation = registry.validate();
    if !validation.is_valid() {
        return Err(ConfigError::Validation(validation.errors.join("; ")));
    }

    Ok(registry)
}

#[cfg(test)]
#[path = "channels_test.rs"]
mod tests;
