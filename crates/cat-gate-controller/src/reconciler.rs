// SPDX-License-Identifier: Apache-2.0
//! The thin `kube::runtime::Controller` adapter (C5): fetches real objects,
//! builds the plain structs `decision.rs` operates on, and applies its
//! verdict. No decision logic lives here — see `decision.rs` for that.

use crate::config::ReconcilerConfig;
use crate::decision::{account_peers, capacity, decide, warm_node_names, Decision, NodeImages, PeerState};
use crate::error::Error;
use cat_gate_core::{fingerprint::pod_images, has_gate, remove_gate, IMAGES_HASH_ANNOTATION};
use cat_gate_history::RemovalHistory;
use cat_gate_index::Index;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::reflector::Store;
use kube::{Api, Client, ResourceExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shared context handed to every reconcile invocation by
/// `kube::runtime::Controller::run`. Built once at manager startup.
pub struct Context {
    /// Live API client, used only for the single-object patch that removes
    /// a gate; every read goes through a cached `Store` below.
    pub client: Client,
    /// Cached pod listing, shared with the watch stream that drives
    /// reconciliation (§4.2: "consulted via the platform's cached listing
    /// primitive so lookups are O(matching peers) without an API
    /// round-trip").
    pub pods: Store<Pod>,
    /// Cached node listing, refreshed independently of pod events.
    pub nodes: Store<Node>,
    /// Fingerprint → peer-pod-key secondary index (C2).
    pub index: Index,
    /// Process-wide removal-history map (C6).
    pub history: RemovalHistory,
    /// Tunables from §6.
    pub config: ReconcilerConfig,
}

/// Reconciles a single pod identity. Pure orchestration: every decision is
/// made by `decision.rs`; this function only fetches, counts, and applies.
#[tracing::instrument(skip_all, fields(pod = %pod.name_any()))]
pub async fn reconcile(pod: Arc<Pod>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = pod
        .namespace()
        .ok_or_else(|| Error::MissingNamespace(pod.name_any()))?;
    let name = pod.name_any();
    let api: Api<Pod> = Api::namespaced(ctx.client.clone(), &namespace);

    // Step 1 — fetch the current state. The object handed to us by the
    // controller driver may already be stale by the time we run.
    let Some(current) = ctx.pods.get(&kube::runtime::reflector::ObjectRef::new(&name).within(&namespace)) else {
        return Ok(Action::await_change());
    };
    if current.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }
    if !has_gate(&current) {
        return Ok(Action::await_change());
    }

    // Step 2 — annotation fail-safe.
    let fingerprint = match current.annotations().get(IMAGES_HASH_ANNOTATION) {
        Some(fp) if !fp.is_empty() => fp.clone(),
        _ => {
            warn!("images-hash annotation missing; removing gate unconditionally");
            remove_gate_via_patch(&api, &name, &current).await?;
            return Ok(Action::await_change());
        }
    };

    // Step 3 — cache-lag defer.
    if let Some(last) = ctx.history.last_removal(&fingerprint) {
        let elapsed = last.elapsed();
        if elapsed < ctx.config.gate_removal_delay {
            let wait = ctx.config.gate_removal_delay - elapsed;
            debug!(fingerprint, ?wait, "deferring for cache lag after a recent removal");
            return Ok(Action::requeue(wait));
        }
    }

    // Step 4 — image inventory.
    let required = pod_images(&current);
    let node_inventory: Vec<NodeImages> = ctx.nodes.state().iter().map(|node| node_images(node)).collect();
    let warm_nodes = warm_node_names(&required, &node_inventory);

    // Step 5 — peer accounting.
    let peer_keys = ctx.index.peers(&fingerprint);
    let peers: Vec<PeerState> = peer_keys
        .iter()
        .filter_map(|key| {
            let object_ref = kube::runtime::reflector::ObjectRef::new(&key.name)
                .within(key.namespace.as_deref().unwrap_or(&namespace));
            ctx.pods.get(&object_ref)
        })
        .map(|peer| PeerState {
            has_gate: has_gate(&peer),
            phase_pending: pod_is_pending(&peer),
        })
        .collect();
    let accounting = account_peers(&peers);

    // Step 6 — capacity.
    let cap = capacity(warm_nodes.len(), ctx.config.capacity);
    debug!(
        capacity = cap,
        warm_nodes = warm_nodes.len(),
        scheduled = accounting.scheduled,
        warm = accounting.warm,
        in_flight = accounting.in_flight,
        "schedule capacity"
    );

    // Step 7 — decision.
    match decide(cap, accounting.in_flight) {
        Decision::Remove => {
            if remove_gate_via_patch(&api, &name, &current).await? {
                ctx.history.record_removal(&fingerprint, Instant::now());
                info!(fingerprint, "scheduling gate removed");
            }
            Ok(Action::await_change())
        }
        Decision::Defer => Ok(Action::requeue(ctx.config.requeue_interval)),
    }
}

/// Error policy for `kube::runtime::Controller::run`: every error is
/// transient (§7), so every error is requeued rather than dropped.
pub fn error_policy(_pod: Arc<Pod>, error: &Error, ctx: Arc<Context>) -> Action {
    tracing::error!(%error, "reconcile failed");
    Action::requeue(ctx.config.requeue_interval)
}

fn pod_is_pending(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .is_none_or(|phase| phase == "Pending")
}

fn node_images(node: &Node) -> NodeImages {
    let cached: BTreeSet<String> = node
        .status
        .as_ref()
        .and_then(|status| status.images.as_ref())
        .into_iter()
        .flatten()
        .flat_map(|image| image.names.clone().into_iter().flatten())
        .collect();
    NodeImages {
        name: node.name_any(),
        cached,
    }
}

/// Removes the gate from `current` and, iff an entry was actually present,
/// issues a merge patch touching only `spec.schedulingGates` — narrower than
/// the Go original's full-object `Update`, so the controller never clobbers
/// fields owned by other writers (the scheduler, the kubelet).
async fn remove_gate_via_patch(api: &Api<Pod>, name: &str, current: &Pod) -> Result<bool, Error> {
    let mut patched = current.clone();
    let outcome = remove_gate(&mut patched);
    if !outcome.removed {
        return Ok(false);
    }
    let gates = patched
        .spec
        .as_ref()
        .and_then(|spec| spec.scheduling_gates.clone());
    let patch = Patch::Merge(serde_json::json!({
        "spec": { "schedulingGates": gates }
    }));
    api.patch(name, &PatchParams::default(), &patch).await?;
    Ok(true)
}
