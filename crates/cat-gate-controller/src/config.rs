// SPDX-License-Identifier: Apache-2.0
//! Tunables recognised by the reconciler (§6's configuration surface).

use std::time::Duration;

/// The capacity formula's two knobs (§4.5 Step 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityConfig {
    /// Multiplier applied to warm-node count to compute capacity.
    pub scale_rate: u32,
    /// Floor on capacity so the first instance always releases.
    pub minimum_capacity: u32,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            scale_rate: 2,
            minimum_capacity: 1,
        }
    }
}

/// Full reconciler configuration, including the two timer-driven waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Capacity formula inputs.
    pub capacity: CapacityConfig,
    /// Requeue delay when capacity is exhausted (§4.5 Step 7).
    pub requeue_interval: Duration,
    /// Cache-lag defer window after a gate removal (§4.5 Step 3).
    pub gate_removal_delay: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            capacity: CapacityConfig::default(),
            requeue_interval: Duration::from_secs(10),
            gate_removal_delay: Duration::from_millis(10),
        }
    }
}
