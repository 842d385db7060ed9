// SPDX-License-Identifier: Apache-2.0
//! The reconcile decision (§4.5 Steps 4–7) as plain functions over plain
//! structs, with no `kube::Client` in sight. `reconciler.rs` is the only
//! caller that touches the API server; everything here is exercised by
//! `#[test]`s without a fake client or a cluster.

use crate::config::CapacityConfig;
use std::collections::BTreeSet;

/// A node's locally cached image references, as surfaced by
/// `node.status.images[*].names`.
#[derive(Debug, Clone)]
pub struct NodeImages {
    /// The node's name.
    pub name: String,
    /// The union of every `status.images[*].names` entry on this node.
    pub cached: BTreeSet<String>,
}

/// True iff `cached` is a superset of every entry in `required` (§4.5 Step
/// 4). An empty `required` list is trivially satisfied: a pod with no
/// images makes every node warm.
fn is_warm(required: &[String], cached: &BTreeSet<String>) -> bool {
    required.iter().all(|image| cached.contains(image))
}

/// Computes the set of warm node names: nodes whose cache already holds
/// every image `required` names.
pub fn warm_node_names<'a>(
    required: &[String],
    nodes: impl IntoIterator<Item = &'a NodeImages>,
) -> BTreeSet<String> {
    nodes
        .into_iter()
        .filter(|node| is_warm(required, &node.cached))
        .map(|node| node.name.clone())
        .collect()
}

/// A peer instance's state as observed for the accounting step (§4.5 Step
/// 5): whether its gate has been removed, and whether the platform has
/// advanced it past `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerState {
    /// True iff this peer still carries the core's gate.
    pub has_gate: bool,
    /// True iff `status.phase == Pending`.
    pub phase_pending: bool,
}

/// The three peer counts the capacity decision is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerAccounting {
    /// Peers whose gate has been removed.
    pub scheduled: usize,
    /// The subset of `scheduled` that has advanced past `Pending`.
    pub warm: usize,
    /// `scheduled - warm`: peers currently pulling images.
    pub in_flight: usize,
}

/// Partitions a peer snapshot into `scheduled`/`warm`/`in_flight` (§4.5 Step
/// 5). Peers that still carry the gate (never scheduled) are excluded from
/// every count.
pub fn account_peers(peers: &[PeerState]) -> PeerAccounting {
    let scheduled = peers.iter().filter(|p| !p.has_gate).count();
    let warm = peers
        .iter()
        .filter(|p| !p.has_gate && !p.phase_pending)
        .count();
    PeerAccounting {
        scheduled,
        warm,
        in_flight: scheduled - warm,
    }
}

/// `capacity = max(minimumCapacity, |warmNodes| × scaleRate)` (§4.5 Step 6).
pub fn capacity(warm_node_count: usize, cfg: CapacityConfig) -> u32 {
    let warm_node_count: u32 = warm_node_count.try_into().unwrap_or(u32::MAX);
    warm_node_count
        .saturating_mul(cfg.scale_rate)
        .max(cfg.minimum_capacity)
}

/// The reconciler's Step 7 decision: remove the gate iff headroom exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `capacity > inFlight`: remove the gate now.
    Remove,
    /// Capacity exhausted: requeue without removing the gate.
    Defer,
}

/// `capacity > inFlight` (§4.5 Step 7).
pub fn decide(capacity: u32, in_flight: usize) -> Decision {
    let in_flight: u32 = in_flight.try_into().unwrap_or(u32::MAX);
    if capacity > in_flight {
        Decision::Remove
    } else {
        Decision::Defer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, images: &[&str]) -> NodeImages {
        NodeImages {
            name: name.to_string(),
            cached: images.iter().map(|i| (*i).to_string()).collect(),
        }
    }

    fn images(refs: &[&str]) -> Vec<String> {
        refs.iter().map(|i| (*i).to_string()).collect()
    }

    #[test]
    fn zero_warm_nodes_floors_capacity_at_minimum() {
        let cfg = CapacityConfig::default();
        assert_eq!(capacity(0, cfg), 1);
        assert_eq!(decide(capacity(0, cfg), 0), Decision::Remove);
        assert_eq!(decide(capacity(0, cfg), 1), Decision::Defer);
    }

    #[test]
    fn empty_required_image_list_makes_every_node_warm() {
        let nodes = vec![node("n1", &["ex/a:1"]), node("n2", &[])];
        let warm = warm_node_names(&[], &nodes);
        assert_eq!(warm.len(), 2);
    }

    #[test]
    fn warm_requires_every_image_present() {
        let nodes = vec![node("n1", &["ex/a:1"]), node("n2", &["ex/a:1", "ex/b:1"])];
        let required = images(&["ex/a:1", "ex/b:1"]);
        let warm = warm_node_names(&required, &nodes);
        assert_eq!(warm, BTreeSet::from(["n2".to_string()]));
    }

    #[test]
    fn exponential_ramp_across_eight_peers_and_ten_nodes() {
        let cfg = CapacityConfig::default();
        // 0 warm nodes: 1 released.
        assert_eq!(capacity(0, cfg), 1);
        // 1 warm node: capacity 2, so a 2nd release (3 total in flight) is permitted
        // once the first peer advances past Pending.
        assert_eq!(capacity(1, cfg), 2);
        // 3 warm nodes (peers #1-3 all warm): capacity 6.
        assert_eq!(capacity(3, cfg), 6);
        // Clamped by the 8 available peers once every node is warm.
        assert_eq!(capacity(10, cfg), 20);
    }

    #[test]
    fn colocated_peers_share_one_warm_node() {
        // Three peers land on the same single node; node breadth, not
        // replica count, drives capacity growth (§4.5 edge cases).
        let nodes = vec![node("n1", &["ex/a:1"])];
        let required = images(&["ex/a:1"]);
        let warm = warm_node_names(&required, &nodes);
        assert_eq!(warm.len(), 1);
        let cfg = CapacityConfig::default();
        assert_eq!(capacity(warm.len(), cfg), 2);
    }

    #[test]
    fn crash_looping_peer_stays_pending_and_caps_releases() {
        let peers = [PeerState {
            has_gate: false,
            phase_pending: true,
        }];
        let accounting = account_peers(&peers);
        assert_eq!(accounting, PeerAccounting {
            scheduled: 1,
            warm: 0,
            in_flight: 1,
        });
        let cfg = CapacityConfig::default();
        assert_eq!(
            decide(capacity(1, cfg), accounting.in_flight),
            Decision::Defer
        );
    }

    #[test]
    fn eight_peers_no_warm_nodes_releases_exactly_one() {
        // §8 scenario 2: 8 peers sharing an image set, empty cluster. Only
        // the bootstrap release (capacity 1) is permitted; the other 7 stay
        // gated until a peer advances past `Pending`.
        let cfg = CapacityConfig::default();
        let cap = capacity(0, cfg);
        assert_eq!(cap, 1);

        // None of the 8 have been released yet: in_flight is 0, so exactly
        // one of them may transition from gated to released this tick.
        let none_released: Vec<PeerState> = Vec::new();
        let accounting = account_peers(&none_released);
        assert_eq!(decide(cap, accounting.in_flight), Decision::Remove);

        // Once one peer has been released and is still pulling (Pending),
        // a second release is not permitted until a node goes warm.
        let one_in_flight = [PeerState {
            has_gate: false,
            phase_pending: true,
        }];
        let accounting = account_peers(&one_in_flight);
        assert_eq!(accounting.in_flight, 1);
        assert_eq!(decide(cap, accounting.in_flight), Decision::Defer);
    }

    #[test]
    fn exponential_ramp_tracks_peers_advancing_past_pending() {
        // §8 scenario 3: 8 peers, 10 nodes. As warm nodes accumulate the
        // total released count ramps 1 -> 3 -> 9, clamped at 8 peers.
        let cfg = CapacityConfig::default();

        // Bootstrap: 0 warm nodes, 0 released so far.
        assert_eq!(capacity(0, cfg), 1);

        // Peer #1 released and has advanced past Pending: 1 warm node.
        let warm_1 = [PeerState {
            has_gate: false,
            phase_pending: false,
        }];
        let cap_1 = capacity(1, cfg);
        assert_eq!(cap_1, 2);
        assert_eq!(account_peers(&warm_1).in_flight, 0);
        // Capacity 2 permits peers #2 and #3 to release (2 more in flight).
        let two_more_in_flight = [
            PeerState {
                has_gate: false,
                phase_pending: false,
            },
            PeerState {
                has_gate: false,
                phase_pending: true,
            },
            PeerState {
                has_gate: false,
                phase_pending: true,
            },
        ];
        let accounting = account_peers(&two_more_in_flight);
        assert_eq!(accounting.scheduled, 3);
        assert_eq!(accounting.in_flight, 2);
        assert_eq!(decide(cap_1, accounting.in_flight), Decision::Defer);

        // Peers #2 and #3 advance past Pending too: 3 warm nodes, capacity
        // 6, clamped to the remaining 5 gated peers once all 8 are warm.
        let cap_3 = capacity(3, cfg);
        assert_eq!(cap_3, 6);
        let cap_10 = capacity(10, cfg);
        assert_eq!(cap_10, 20);
        // With only 8 peers total, every one of them releases once warm
        // nodes outgrow the replica count.
        assert!(cap_10 >= 8);
    }

    #[test]
    fn gated_peers_are_excluded_from_every_count() {
        let peers = [
            PeerState {
                has_gate: true,
                phase_pending: true,
            },
            PeerState {
                has_gate: false,
                phase_pending: false,
            },
        ];
        let accounting = account_peers(&peers);
        assert_eq!(accounting.scheduled, 1);
        assert_eq!(accounting.warm, 1);
        assert_eq!(accounting.in_flight, 0);
    }
}
