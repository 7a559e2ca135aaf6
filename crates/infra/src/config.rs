//! Configuration loading and representation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use depot_core::ChannelName;
use depot_inventory::{RoutingPolicy, SortMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Runtime settings for one storage actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotConfig {
    /// Prefix of channel/peripheral names that denote actors.
    pub actor_pattern: String,
    /// Exact channel name of this actor; other actor names are then ignored.
    pub local_actor: Option<String>,
    /// Names never used as routes or backends.
    pub excluded_channels: Vec<String>,
    /// Prefix a peripheral must carry to count as a storage backend.
    pub backend_pattern: Option<String>,
    /// Local inventory size when the world does not state one.
    pub local_slots: u32,
    pub default_sort: SortMode,
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self {
            actor_pattern: "turtle_".to_string(),
            local_actor: None,
            excluded_channels: Vec::new(),
            backend_pattern: None,
            local_slots: 16,
            default_sort: SortMode::ByQuantityDesc,
        }
    }
}

impl DepotConfig {
    /// Load from `DEPOT_*` environment variables, defaulting anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup (environment, test maps).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup("DEPOT_ACTOR_PATTERN") {
            config.actor_pattern = v;
        }
        if let Some(v) = lookup("DEPOT_LOCAL_ACTOR").filter(|v| !v.trim().is_empty()) {
            config.local_actor = Some(v.trim().to_string());
        }
        if let Some(v) = lookup("DEPOT_EXCLUDED_CHANNELS") {
            config.excluded_channels = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("DEPOT_BACKEND_PATTERN").filter(|v| !v.is_empty()) {
            config.backend_pattern = Some(v);
        }
        if let Some(v) = lookup("DEPOT_LOCAL_SLOTS") {
            config.local_slots = v.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "DEPOT_LOCAL_SLOTS",
                message: format!("{e}"),
            })?;
        }
        if let Some(v) = lookup("DEPOT_DEFAULT_SORT") {
            config.default_sort = v.parse().map_err(|e| ConfigError::InvalidValue {
                key: "DEPOT_DEFAULT_SORT",
                message: format!("{e}"),
            })?;
        }

        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Routing rules derived from the actor settings.
    pub fn routing_policy(&self) -> RoutingPolicy {
        let policy = RoutingPolicy::new(self.actor_pattern.as_str())
            .with_excluded(self.excluded_channels.iter().map(|n| ChannelName::new(n.as_str())));
        match &self.local_actor {
            Some(actor) => policy.with_local_actor(ChannelName::new(actor.as_str())),
            None => policy,
        }
    }
}
