// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=canopy_memory --heading-base-level=0

//! Canopy Memory: keep only the active part of a huge tree fully materialized.
//!
//! Every node of a Canopy tree has a lightweight structural record that is always
//! resident (owned by the tree). Its full payload is a second tier managed here by a
//! [`MemoryManager`]: payloads are fetched on demand, kept while the node is active, and
//! degraded back to the structural placeholder under a size and time budget.
//!
//! Per node the lifecycle is:
//!
//! ```text
//! Structural ──request──▶ Hydrating ──complete(Ok)──▶ Hydrated
//!     ▲                       │                          │
//!     │                 complete(Err)        idle + TTL / ceiling
//!     │                       ▼                          │
//!     └──────request──── Failed                          │
//!     ◀──────────────────────────────────────────────────┘
//! ```
//!
//! - Fetching is the host's job. [`MemoryManager::request_hydration`] hands out
//!   [`HydrationTicket`]s, and the host reports back through
//!   [`MemoryManager::complete_hydration`]. Duplicate requests for an in-flight node
//!   collapse into one ticket, and tickets outdated by [`MemoryManager::invalidate`] are
//!   ignored.
//! - Nodes in the viewport (plus overscan), expanded nodes, and selection roots are
//!   protected and never evicted. When protection keeps the manager above its ceiling
//!   it reports a [`SoftLimit`] instead of failing.
//! - Time is a caller-supplied millisecond timestamp; there is no hidden clock.
//!
//! ## Minimal example
//!
//! ```rust
//! use canopy_memory::{Completion, HydrationState, MemoryConfig, MemoryManager};
//!
//! let mut memory: MemoryManager<u32, String> = MemoryManager::new(MemoryConfig::with_ceiling(2));
//!
//! let tickets = memory.request_hydration([1, 2, 3], 0);
//! assert_eq!(tickets.len(), 3);
//! for (now, ticket) in (1..).zip(tickets) {
//!     let done = memory.complete_hydration(ticket, Ok(format!("node {}", ticket.id)), now);
//!     assert!(matches!(done, Completion::Hydrated(_)));
//! }
//!
//! // The ceiling is two, so the least recently hydrated node was demoted.
//! assert_eq!(memory.state(&1), HydrationState::Structural);
//! assert_eq!(memory.payload(&3).map(String::as_str), Some("node 3"));
//! ```
//!
//! ## Query cache
//!
//! [`QueryCache`] is a separate, thread-safe cache for search results that several
//! tree instances may share.

mod config;
mod manager;
mod payload;
mod query_cache;

pub use config::MemoryConfig;
pub use manager::{
    ActivityKind, ActivityStats, Completion, EvictionReport, HydrationState, HydrationTicket,
    MemoryManager, MemoryStats, SoftLimit,
};
pub use payload::{FieldSource, HydratedRecord, HydrationFailure};
pub use query_cache::{CacheEntry, QueryCache};
