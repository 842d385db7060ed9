// SPDX-License-Identifier: Apache-2.0
//! The admission mutation itself (§4.3), independent of the HTTP/JSON-patch
//! plumbing in `handler.rs`: append the gate, stamp the fingerprint.

use cat_gate_core::{fingerprint, GATE_NAME, IMAGES_HASH_ANNOTATION};
use k8s_openapi::api::core::v1::{Pod, PodSchedulingGate, PodSpec};

/// Appends [`GATE_NAME`] to `pod.spec.schedulingGates` (even if other gates
/// are already present) and sets the `images-hash` annotation to the
/// fingerprint of `pod`'s image set.
///
/// Called exactly once per create by `handler::mutate`; the admission
/// webhook configuration restricts this path to `CREATE` operations, so
/// update events never reach this function (§4.3 "Updates are not
/// mutated").
pub fn stamp(pod: &mut Pod) {
    let fp = fingerprint(pod);

    let spec = pod.spec.get_or_insert_with(PodSpec::default);
    spec.scheduling_gates
        .get_or_insert_with(Vec::new)
        .push(PodSchedulingGate {
            name: GATE_NAME.to_string(),
        });

    pod.metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(IMAGES_HASH_ANNOTATION.to_string(), fp);
}
