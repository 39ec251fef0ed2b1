//! Shared configuration, channel registry, and domain types for `medlake`.

pub mod app_config;
pub mod channels;
pub mod config;
pub mod layout;
pub mod message;

pub use app_config::{AppConfig, Environment};
pub use channels::{
    is_valid_channel_ref, load_channels, ChannelPolicy, ChannelRegistry, ChannelsFile, RegistryValidation,
    ScheduleEntry,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use layout::DataLayout;
pub use message::{
    ChannelInfo, EntityKind, ForwardRef, MediaKind, MessageEntity, NormalizedMessage, Reaction,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read channels file {path}: {source}")]
    ChannelsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse channels file: {0}")]
    ChannelsFileParse(#[source] serde_yaml::Error),

    #[error("channel config validation failed: {0}")]
    Validation(String),
}
