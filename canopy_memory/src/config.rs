// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Memory budget configuration.

/// Budget for hydrated payloads.
///
/// All durations are milliseconds on the caller's monotonic clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Maximum number of hydrated payloads kept resident before eviction kicks in.
    pub max_hydrated: usize,
    /// Time without any recorded activity after which [`sweep`] starts evicting by age.
    ///
    /// [`sweep`]: crate::MemoryManager::sweep
    pub idle_timeout_ms: u64,
    /// Age (time since last touch) after which an idle sweep evicts a payload.
    ///
    /// `None` means an idle sweep evicts every unprotected payload.
    pub node_ttl_ms: Option<u64>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_hydrated: 5_000,
            idle_timeout_ms: 30_000,
            node_ttl_ms: Some(120_000),
        }
    }
}

impl MemoryConfig {
    /// Default timeouts with a custom ceiling.
    pub fn with_ceiling(max_hydrated: usize) -> Self {
        Self {
            max_hydrated,
            ..Self::default()
        }
    }

    /// Custom ceiling and timeouts.
    pub fn with_budget(
        max_hydrated: usize,
        idle_timeout_ms: u64,
        node_ttl_ms: Option<u64>,
    ) -> Self {
        Self {
            max_hydrated,
            idle_timeout_ms,
            node_ttl_ms,
        }
    }
}
