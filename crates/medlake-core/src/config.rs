use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Credentials are checked first so a misconfigured deployment fails at
/// startup rather than halfway through a scrape.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        match lookup(var) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConfigError::MissingEnvVar(var.to_string())),
        }
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let raw_api_id = require("TELEGRAM_API_ID")?;
    let telegram_api_id =
        raw_api_id
            .trim()
            .parse::<i64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: "TELEGRAM_API_ID".to_string(),
                reason: e.to_string(),
            })?;
    let telegram_api_hash = require("TELEGRAM_API_HASH")?;
    let telegram_bot_token = require("TELEGRAM_BOT_TOKEN")?;

    let env = parse_environment(&or_default("MEDLAKE_ENV", "development"));

    let telegram_api_base_url = or_default("TELEGRAM_API_BASE_URL", "https://api.telegram.org");
    let telegram_channels = parse_channel_list(&or_default("TELEGRAM_CHANNELS", ""))?;
    let telegram_request_timeout_secs = parse_u64("TELEGRAM_REQUEST_TIMEOUT_SECS", "30")?;
    let telegram_max_retries = parse_u32("TELEGRAM_MAX_RETRIES", "3")?;
    let telegram_retry_backoff_base_ms = parse_u64("TELEGRAM_RETRY_BACKOFF_BASE_MS", "1000")?;

    let data_dir = PathBuf::from(or_default("DATA_DIR", "./data"));
    let logs_dir = PathBuf::from(or_default("LOGS_DIR", "./logs"));
    let log_level = or_default("LOG_LEVEL", "info");
    let channels_path = lookup("MEDLAKE_CHANNELS_PATH").ok().map(PathBuf::from);

    let scraper_message_delay_ms = parse_u64("SCRAPER_MESSAGE_DELAY_MS", "100")?;
    let scraper_channel_delay_ms = parse_u64("SCRAPER_CHANNEL_DELAY_MS", "2000")?;
    let scraper_batch_size = parse_usize("SCRAPER_BATCH_SIZE", "100")?;
    if scraper_batch_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "SCRAPER_BATCH_SIZE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let scraper_user_agent = or_default("SCRAPER_USER_AGENT", "medlake/0.1 (channel-ingest)");

    Ok(AppConfig {
        env,
        telegram_api_id,
        telegram_api_hash,
        telegram_bot_token,
        telegram_api_base_url,
        telegram_channels,
        telegram_request_timeout_secs,
        telegram_max_retries,
        telegram_retry_backoff_base_ms,
        data_dir,
        logs_dir,
        log_level,
        channels_path,
        scraper_message_delay_ms,
        scraper_channel_delay_ms,
        scraper_batch_size,
        scraper_user_agent,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

/// Split a comma-separated channel list, dropping blanks and a leading `@`.
fn parse_channel_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(|c| c.trim().trim_start_matches('@'))
        .filter(|c| !c.is_empty())
        .map(|c| {
            if crate::is_valid_channel_ref(c) {
                Ok(c.to_owned())
            } else {
                Err(ConfigError::InvalidEnvVar {
                    var: "TELEGRAM_CHANNELS".to_owned(),
                    reason: format!("not a channel username or chat id: '{c}'"),
                })
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
