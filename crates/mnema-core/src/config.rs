//! Runtime configuration for the memory system.
//!
//! Values default to the constants in [`crate::defaults`] and may be
//! overridden through `MNEMA_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Tunables shared by link discovery, evolution, search and validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Neighbors considered per evolution pass.
    pub link_k: usize,
    /// Candidates below this cosine similarity are discarded.
    pub link_min_similarity: f32,
    /// Deadline for one analysis call.
    pub analysis_timeout_secs: u64,
    /// Deadline for one embedding index call.
    pub index_timeout_secs: u64,
    /// Search kNN over-fetch factor.
    pub search_overfetch: usize,
    /// Maximum content length in characters.
    pub max_content_length: usize,
    /// Maximum number of tags per note.
    pub max_tags: usize,
    /// Maximum tag length in characters.
    pub max_tag_length: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            link_k: defaults::LINK_K,
            link_min_similarity: defaults::LINK_MIN_SIMILARITY,
            analysis_timeout_secs: defaults::ANALYSIS_TIMEOUT_SECS,
            index_timeout_secs: defaults::INDEX_TIMEOUT_SECS,
            search_overfetch: defaults::SEARCH_OVERFETCH,
            max_content_length: defaults::MAX_CONTENT_LENGTH,
            max_tags: defaults::MAX_TAGS,
            max_tag_length: defaults::MAX_TAG_LENGTH,
        }
    }
}

impl MemoryConfig {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `MNEMA_LINK_K`: neighbors per pass (1-100, default: 10)
    /// - `MNEMA_LINK_MIN_SIMILARITY`: candidate floor (0.0-1.0, default: 0.5)
    /// - `MNEMA_ANALYSIS_TIMEOUT_SECS`: analysis timeout (default: 60)
    /// - `MNEMA_INDEX_TIMEOUT_SECS`: index timeout (default: 30)
    /// - `MNEMA_SEARCH_OVERFETCH`: search over-fetch factor (default: 3)
    /// - `MNEMA_MAX_CONTENT_LENGTH`, `MNEMA_MAX_TAGS`, `MNEMA_MAX_TAG_LENGTH`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("MNEMA_LINK_K") {
            match val.parse::<usize>() {
                Ok(k) if k > 0 => config.link_k = k.min(defaults::LINK_K_MAX),
                _ => tracing::warn!(value = %val, "Invalid MNEMA_LINK_K, using default"),
            }
        }

        if let Some(val) = lookup("MNEMA_LINK_MIN_SIMILARITY") {
            match val.parse::<f32>() {
                Ok(s) if s.is_finite() => config.link_min_similarity = s.clamp(0.0, 1.0),
                _ => {
                    tracing::warn!(value = %val, "Invalid MNEMA_LINK_MIN_SIMILARITY, using default")
                }
            }
        }

        positive(&lookup, "MNEMA_ANALYSIS_TIMEOUT_SECS", &mut config.analysis_timeout_secs);
        positive(&lookup, "MNEMA_INDEX_TIMEOUT_SECS", &mut config.index_timeout_secs);
        positive(&lookup, "MNEMA_SEARCH_OVERFETCH", &mut config.search_overfetch);
        positive(&lookup, "MNEMA_MAX_CONTENT_LENGTH", &mut config.max_content_length);
        positive(&lookup, "MNEMA_MAX_TAGS", &mut config.max_tags);
        positive(&lookup, "MNEMA_MAX_TAG_LENGTH", &mut config.max_tag_length);

        config
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }
}

fn positive<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    if let Some(val) = lookup(key) {
        match val.parse::<T>() {
            Ok(parsed) if parsed > T::default() => *slot = parsed,
            _ => tracing::warn!(key, value = %val, "Invalid positive integer, using default"),
        }
    }
}
