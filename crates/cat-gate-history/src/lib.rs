// SPDX-License-Identifier: Apache-2.0
//! `RemovalHistory` (C6) and its background `Compactor` (C7).
//!
//! The map is shared across every reconciler worker and the compactor task;
//! `DashMap` gives us independent, non-blocking-between-shards reader/writer
//! access without an external lock (§5 "Shared resources").

mod compactor;
mod store;

pub use compactor::Compactor;
pub use store::RemovalHistory;
