// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The hydration state machine and eviction policy.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, trace, warn};

use crate::config::MemoryConfig;
use crate::payload::{HydratedRecord, HydrationFailure};

/// Where a node is in its hydration lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HydrationState {
    /// Only the structural record is resident ("not loaded yet" or evicted).
    Structural,
    /// A payload fetch is in flight.
    Hydrating,
    /// The payload is resident.
    Hydrated,
    /// The last fetch failed. Distinct from [`HydrationState::Structural`].
    Failed,
}

/// Permission to complete one hydration of `id`.
///
/// Completing with a ticket whose version is no longer current is ignored, which is how
/// invalidation cancels in-flight fetches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HydrationTicket<K> {
    /// Node to hydrate.
    pub id: K,
    /// Version stamp at request time.
    pub version: u64,
}

/// Result of [`MemoryManager::complete_hydration`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion<K> {
    /// The payload is now resident. Carries the ceiling enforcement that followed.
    Hydrated(EvictionReport<K>),
    /// The failure was recorded.
    Failed,
    /// The ticket was outdated or unknown; nothing changed.
    Stale,
}

/// Kinds of user activity that keep the tree "active".
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    /// Pointer movement or clicks.
    Pointer,
    /// Keyboard input.
    Key,
    /// Scrolling.
    Scroll,
    /// Focus changes.
    Focus,
    /// Expanding or collapsing a node.
    Expand,
}

/// Activity counters, one per [`ActivityKind`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ActivityStats {
    /// Pointer events.
    pub pointer: u64,
    /// Key events.
    pub key: u64,
    /// Scroll events.
    pub scroll: u64,
    /// Focus events.
    pub focus: u64,
    /// Expand and collapse events.
    pub expand: u64,
}

impl ActivityStats {
    /// Sum over all kinds.
    pub fn total(&self) -> u64 {
        self.pointer + self.key + self.scroll + self.focus + self.expand
    }

    fn bump(&mut self, kind: ActivityKind) {
        let counter = match kind {
            ActivityKind::Pointer => &mut self.pointer,
            ActivityKind::Key => &mut self.key,
            ActivityKind::Scroll => &mut self.scroll,
            ActivityKind::Focus => &mut self.focus,
            ActivityKind::Expand => &mut self.expand,
        };
        *counter += 1;
    }
}

/// Memory pressure that protection prevented the manager from relieving.
///
/// This is a warning, not an error: the manager keeps working above its ceiling.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SoftLimit {
    /// Hydrated payloads still resident after eviction.
    pub resident: usize,
    /// Configured ceiling.
    pub ceiling: usize,
    /// Resident payloads that could not be evicted because they are protected.
    pub protected: usize,
}

/// What an eviction pass did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvictionReport<K> {
    /// Nodes demoted to [`HydrationState::Structural`], least recently active first.
    pub evicted: Vec<K>,
    /// Set when the ceiling could not be reached.
    pub soft_limit: Option<SoftLimit>,
}

impl<K> Default for EvictionReport<K> {
    fn default() -> Self {
        Self {
            evicted: Vec::new(),
            soft_limit: None,
        }
    }
}

impl<K> EvictionReport<K> {
    fn absorb(&mut self, other: Self) {
        self.evicted.extend(other.evicted);
        if other.soft_limit.is_some() {
            self.soft_limit = other.soft_limit;
        }
    }
}

/// Point-in-time counters for diagnostics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Hydrated payloads resident.
    pub resident: usize,
    /// Fetches in flight.
    pub in_flight: usize,
    /// Nodes whose last fetch failed.
    pub failed: usize,
    /// Nodes currently protected (viewport, expanded, or selection roots).
    pub protected: usize,
    /// Payloads evicted so far.
    pub evictions: u64,
    /// Eviction passes that ended above the ceiling.
    pub soft_limits: u64,
    /// Activity counters.
    pub activity: ActivityStats,
}

#[derive(Clone, Debug)]
enum Slot<P> {
    Structural,
    Hydrating,
    Hydrated(P),
    Failed(HydrationFailure),
}

#[derive(Clone, Debug)]
struct Entry<P> {
    slot: Slot<P>,
    version: u64,
    /// Caller time of the last touch.
    touched_at: u64,
    /// Key into the recency index while hydrated.
    recency: u64,
}

impl<P> Entry<P> {
    fn new() -> Self {
        Self {
            slot: Slot::Structural,
            version: 0,
            touched_at: 0,
            recency: 0,
        }
    }

    fn state(&self) -> HydrationState {
        match self.slot {
            Slot::Structural => HydrationState::Structural,
            Slot::Hydrating => HydrationState::Hydrating,
            Slot::Hydrated(_) => HydrationState::Hydrated,
            Slot::Failed(_) => HydrationState::Failed,
        }
    }
}

/// Keeps only active nodes fully materialized.
///
/// Nodes are keyed by the caller's id type `K`; payloads are of type `P`. The manager
/// owns the eviction decision: callers request hydration, complete it, and report
/// activity, viewport, and protection hints. Time is always passed in as a millisecond
/// timestamp (`now`) from a monotonic clock the caller owns.
///
/// Eviction order is least recently active first, where "active" means hydrated,
/// requested while hydrated, or in the viewport.
#[derive(Clone, Debug)]
pub struct MemoryManager<K, P = HydratedRecord> {
    config: MemoryConfig,
    entries: HashMap<K, Entry<P>>,
    /// Hydrated nodes by recency (ascending = least recent first).
    recency: BTreeMap<u64, K>,
    next_recency: u64,
    viewport: HashSet<K>,
    pinned: HashSet<K>,
    last_activity: u64,
    activity: ActivityStats,
    evictions: u64,
    soft_limits: u64,
}

impl<K, P> Default for MemoryManager<K, P>
where
    K: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl<K, P> MemoryManager<K, P>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Create an empty manager.
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_recency: 0,
            viewport: HashSet::new(),
            pinned: HashSet::new(),
            last_activity: 0,
            activity: ActivityStats::default(),
            evictions: 0,
            soft_limits: 0,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect at the next eviction pass.
    pub fn set_config(&mut self, config: MemoryConfig) {
        self.config = config;
    }

    /// Ask for payloads of `ids`.
    ///
    /// Returns one ticket per node that needs a fetch (nodes in
    /// [`HydrationState::Structural`] or [`HydrationState::Failed`]). Nodes already
    /// hydrating get no second ticket; hydrated nodes are touched instead.
    pub fn request_hydration<I>(&mut self, ids: I, now: u64) -> Vec<HydrationTicket<K>>
    where
        I: IntoIterator<Item = K>,
    {
        let mut tickets = Vec::new();
        for id in ids {
            let entry = self.entries.entry(id).or_insert_with(Entry::new);
            match entry.slot {
                Slot::Structural | Slot::Failed(_) => {
                    entry.version += 1;
                    entry.slot = Slot::Hydrating;
                    tickets.push(HydrationTicket {
                        id,
                        version: entry.version,
                    });
                }
                Slot::Hydrating => trace!(?id, "hydration already in flight"),
                Slot::Hydrated(_) => self.touch(id, now),
            }
        }
        if !tickets.is_empty() {
            debug!(count = tickets.len(), "issued hydration tickets");
        }
        tickets
    }

    /// Report the outcome of a fetch.
    ///
    /// Applied only if the node is still hydrating at the ticket's version. A success is
    /// followed by [`MemoryManager::enforce_ceiling`].
    pub fn complete_hydration(
        &mut self,
        ticket: HydrationTicket<K>,
        result: Result<P, HydrationFailure>,
        now: u64,
    ) -> Completion<K> {
        let Some(entry) = self.entries.get_mut(&ticket.id) else {
            debug!(id = ?ticket.id, "completion for unknown node ignored");
            return Completion::Stale;
        };
        if !matches!(entry.slot, Slot::Hydrating) || entry.version != ticket.version {
            debug!(
                id = ?ticket.id,
                ticket = ticket.version,
                current = entry.version,
                "stale completion ignored"
            );
            return Completion::Stale;
        }
        match result {
            Ok(payload) => {
                entry.slot = Slot::Hydrated(payload);
                self.touch(ticket.id, now);
                Completion::Hydrated(self.enforce_ceiling())
            }
            Err(failure) => {
                debug!(id = ?ticket.id, %failure, "hydration failed");
                entry.slot = Slot::Failed(failure);
                Completion::Failed
            }
        }
    }

    /// Drop the payload of `id` and cancel any in-flight fetch.
    ///
    /// Returns `true` if a payload was resident.
    pub fn invalidate(&mut self, id: K) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        entry.version += 1;
        let was_hydrated = matches!(entry.slot, Slot::Hydrated(_));
        if was_hydrated {
            self.recency.remove(&entry.recency);
        }
        entry.slot = Slot::Structural;
        was_hydrated
    }

    /// Remove every trace of `id` (the node was deleted).
    pub fn forget(&mut self, id: K) {
        if let Some(entry) = self.entries.remove(&id) {
            if matches!(entry.slot, Slot::Hydrated(_)) {
                self.recency.remove(&entry.recency);
            }
        }
        self.viewport.remove(&id);
        self.pinned.remove(&id);
    }

    /// Note user activity; resets the idle clock.
    pub fn record_activity(&mut self, kind: ActivityKind, now: u64) {
        self.last_activity = self.last_activity.max(now);
        self.activity.bump(kind);
    }

    /// Replace the viewport set (visible rows plus overscan). These nodes are protected
    /// and touched.
    ///
    /// Nodes that leave the set lose their protection at once: if any did, the ceiling
    /// is enforced again and the evictions are reported.
    pub fn update_viewport<I>(&mut self, ids: I, now: u64) -> EvictionReport<K>
    where
        I: IntoIterator<Item = K>,
    {
        let previous = core::mem::take(&mut self.viewport);
        self.viewport.extend(ids);
        let visible: Vec<K> = self.viewport.iter().copied().collect();
        for id in visible {
            self.touch(id, now);
        }
        self.enforce_if_released(previous)
    }

    /// Replace the off-screen protection set: expanded nodes and selection branch roots.
    ///
    /// Like [`MemoryManager::update_viewport`], re-enforces the ceiling when a node lost
    /// its protection.
    pub fn update_memory_protection<E, S>(
        &mut self,
        expanded: E,
        selected_roots: S,
    ) -> EvictionReport<K>
    where
        E: IntoIterator<Item = K>,
        S: IntoIterator<Item = K>,
    {
        let previous = core::mem::take(&mut self.pinned);
        self.pinned.extend(expanded);
        self.pinned.extend(selected_roots);
        self.enforce_if_released(previous)
    }

    /// Returns `true` if `id` may not be evicted.
    pub fn is_protected(&self, id: &K) -> bool {
        self.viewport.contains(id) || self.pinned.contains(id)
    }

    /// Evict least recently active unprotected payloads until at most
    /// [`MemoryConfig::max_hydrated`] remain.
    pub fn enforce_ceiling(&mut self) -> EvictionReport<K> {
        let ceiling = self.config.max_hydrated;
        let resident = self.recency.len();
        if resident <= ceiling {
            return EvictionReport::default();
        }
        let excess = resident - ceiling;
        let victims: Vec<K> = self
            .recency
            .values()
            .filter(|id| !self.is_protected(id))
            .take(excess)
            .copied()
            .collect();
        for &id in &victims {
            self.evict(id);
        }
        let mut report = EvictionReport {
            evicted: victims,
            soft_limit: None,
        };
        if self.recency.len() > ceiling {
            report.soft_limit = Some(self.soft_limit());
        }
        report
    }

    /// Periodic maintenance.
    ///
    /// Once [`MemoryConfig::idle_timeout_ms`] has passed since the last recorded
    /// activity, evicts unprotected payloads older than [`MemoryConfig::node_ttl_ms`]
    /// (or all unprotected payloads when there is no TTL). Always finishes with
    /// [`MemoryManager::enforce_ceiling`].
    pub fn sweep(&mut self, now: u64) -> EvictionReport<K> {
        let mut report = EvictionReport::default();
        if now.saturating_sub(self.last_activity) >= self.config.idle_timeout_ms {
            let ttl = self.config.node_ttl_ms;
            let victims: Vec<K> = self
                .recency
                .values()
                .filter(|id| !self.is_protected(id))
                .filter(|id| {
                    ttl.is_none_or(|ttl| {
                        self.entries
                            .get(*id)
                            .is_some_and(|e| now.saturating_sub(e.touched_at) >= ttl)
                    })
                })
                .copied()
                .collect();
            for &id in &victims {
                self.evict(id);
            }
            if !victims.is_empty() {
                debug!(evicted = victims.len(), "idle sweep");
            }
            report.evicted = victims;
        }
        report.absorb(self.enforce_ceiling());
        report
    }

    /// Hydration state of `id`; unknown nodes are [`HydrationState::Structural`].
    pub fn state(&self, id: &K) -> HydrationState {
        self.entries
            .get(id)
            .map_or(HydrationState::Structural, Entry::state)
    }

    /// The resident payload of `id`.
    pub fn payload(&self, id: &K) -> Option<&P> {
        match &self.entries.get(id)?.slot {
            Slot::Hydrated(payload) => Some(payload),
            _ => None,
        }
    }

    /// The recorded failure of `id`.
    pub fn failure(&self, id: &K) -> Option<&HydrationFailure> {
        match &self.entries.get(id)?.slot {
            Slot::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Number of resident payloads.
    pub fn resident_len(&self) -> usize {
        self.recency.len()
    }

    /// Hydrated nodes, least recently active first.
    pub fn hydrated(&self) -> impl Iterator<Item = K> + '_ {
        self.recency.values().copied()
    }

    /// Current counters.
    pub fn stats(&self) -> MemoryStats {
        let mut stats = MemoryStats {
            resident: self.recency.len(),
            evictions: self.evictions,
            soft_limits: self.soft_limits,
            activity: self.activity,
            ..MemoryStats::default()
        };
        for (id, entry) in &self.entries {
            match entry.slot {
                Slot::Hydrating => stats.in_flight += 1,
                Slot::Failed(_) => stats.failed += 1,
                _ => {}
            }
            if self.is_protected(id) {
                stats.protected += 1;
            }
        }
        stats
    }

    fn touch(&mut self, id: K, now: u64) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        entry.touched_at = entry.touched_at.max(now);
        if matches!(entry.slot, Slot::Hydrated(_)) {
            self.recency.remove(&entry.recency);
            self.next_recency += 1;
            entry.recency = self.next_recency;
            self.recency.insert(entry.recency, id);
        }
    }

    fn evict(&mut self, id: K) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if matches!(entry.slot, Slot::Hydrated(_)) {
            self.recency.remove(&entry.recency);
            entry.slot = Slot::Structural;
            self.evictions += 1;
            trace!(?id, "evicted payload");
        }
    }

    fn enforce_if_released(&mut self, previous: HashSet<K>) -> EvictionReport<K> {
        if previous.iter().any(|id| !self.is_protected(id)) {
            self.enforce_ceiling()
        } else {
            EvictionReport::default()
        }
    }

    fn soft_limit(&mut self) -> SoftLimit {
        let limit = SoftLimit {
            resident: self.recency.len(),
            ceiling: self.config.max_hydrated,
            protected: self
                .recency
                .values()
                .filter(|id| self.is_protected(id))
                .count(),
        };
        self.soft_limits += 1;
        warn!(
            resident = limit.resident,
            ceiling = limit.ceiling,
            protected = limit.protected,
            "memory ceiling exceeded; remaining payloads are protected"
        );
        limit
    }
}
