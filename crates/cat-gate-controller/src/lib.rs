// SPDX-License-Identifier: Apache-2.0
//! The reconciler (C5) and the event filter (C8).
//!
//! `decision` holds the capacity/accounting math as plain functions over
//! plain structs; `reconciler` is the thin `kube::runtime::Controller`
//! adapter that fetches real objects and applies `decision`'s verdict;
//! `filter` is the event predicate that keeps ungated-pod traffic out of the
//! reconcile queue before it ever reaches either.

pub mod config;
pub mod decision;
pub mod error;
pub mod filter;
pub mod reconciler;

pub use config::{CapacityConfig, ReconcilerConfig};
pub use error::Error;
pub use filter::{admits, trigger_stream, GateEvent};
pub use reconciler::{error_policy, reconcile, Context};
