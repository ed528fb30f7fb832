//! Scope configuration.
//!
//! Configuration is fixed when a scope is created and inherited by every
//! scope spawned from it. Values come from code, from environment variables,
//! or (with the `config` feature) from JSON documents.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::{DiError, DiResult};

/// Environment variable overriding [`ScopeConfig::max_depth`].
pub const ENV_MAX_DEPTH: &str = "SCOPED_DEPS_MAX_DEPTH";

/// Environment variable overriding [`ScopeConfig::detect_cycles`].
pub const ENV_DETECT_CYCLES: &str = "SCOPED_DEPS_DETECT_CYCLES";

/// Default bound on nested resolutions per thread.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Resolution guard settings for a scope tree.
///
/// # Examples
///
/// ```rust
/// use scoped_deps::{Scope, ScopeConfig};
///
/// let config = ScopeConfig::default().with_max_depth(32);
/// let root = Scope::root_with_config(config.clone());
/// assert_eq!(root.spawn().config(), &config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ScopeConfig {
    /// Maximum number of nested resolutions on one thread
    pub max_depth: usize,
    /// Fail with `Circular` when a type is re-requested on a scope while it
    /// is still being resolved there
    pub detect_cycles: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            detect_cycles: true,
        }
    }
}

impl ScopeConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_cycle_detection(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }

    /// Reads overrides from `SCOPED_DEPS_MAX_DEPTH` and
    /// `SCOPED_DEPS_DETECT_CYCLES`, starting from the defaults.
    pub fn from_env() -> DiResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// ```rust
    /// use scoped_deps::ScopeConfig;
    ///
    /// let config = ScopeConfig::from_lookup(|name| match name {
    ///     "SCOPED_DEPS_MAX_DEPTH" => Some("64".to_string()),
    ///     "SCOPED_DEPS_DETECT_CYCLES" => Some("false".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(config.max_depth, 64);
    /// assert!(!config.detect_cycles);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> DiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_MAX_DEPTH) {
            config.max_depth = raw.trim().parse().map_err(|_| {
                DiError::msg(format!("{} must be a positive integer, got {:?}", ENV_MAX_DEPTH, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_DETECT_CYCLES) {
            config.detect_cycles = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(DiError::msg(format!(
                        "{} must be a boolean, got {:?}",
                        ENV_DETECT_CYCLES, raw
                    )))
                }
            };
        }
        Ok(config)
    }

    /// Parses a JSON document; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(DiError::failed)
    }

    #[cfg(feature = "config")]
    pub fn to_json_string(&self) -> DiResult<String> {
        serde_json::to_string(self).map_err(DiError::failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_without_overrides_is_default() {
        let config = ScopeConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ScopeConfig::default());
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.detect_cycles);
    }

    #[test]
    fn lookup_rejects_garbage() {
        let err = ScopeConfig::from_lookup(|name| {
            (name == ENV_MAX_DEPTH).then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_DEPTH));

        let err = ScopeConfig::from_lookup(|name| {
            (name == ENV_DETECT_CYCLES).then(|| "maybe".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_DETECT_CYCLES));
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_round_trip_keeps_defaults_for_missing_fields() {
        let config = ScopeConfig::from_json_str(r#"{"max_depth": 8}"#).unwrap();
        assert_eq!(config.max_depth, 8);
        assert!(config.detect_cycles);

        let json = config.to_json_string().unwrap();
        assert_eq!(ScopeConfig::from_json_str(&json).unwrap(), config);
    }
}
