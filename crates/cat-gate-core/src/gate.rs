// SPDX-License-Identifier: Apache-2.0
//! The scheduling-gate lifecycle (§4.4): two pure helpers over an in-memory
//! `Pod`. Neither talks to the API server; the caller issues the `Update`
//! (or admission patch) once it has the mutated object back.

use k8s_openapi::api::core::v1::{Pod, PodSchedulingGate};

/// Name of the gate this controller attaches at admission and removes once
/// the instance has headroom to become schedulable.
pub const GATE_NAME: &str = "cat-gate.cybozu.io/gate";

/// Annotation key holding the image-set fingerprint (§4.1).
pub const IMAGES_HASH_ANNOTATION: &str = "cat-gate.cybozu.io/images-hash";

/// Returns true iff `pod` currently carries [`GATE_NAME`] in
/// `spec.schedulingGates`.
pub fn has_gate(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.scheduling_gates.as_ref())
        .is_some_and(|gates| gates.iter().any(|g| g.name == GATE_NAME))
}

/// Outcome of [`remove_gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalOutcome {
    /// True iff an entry was actually filtered out (an update should be
    /// issued against the platform); false means the pod was already
    /// ungated and no write is needed.
    pub removed: bool,
}

/// Filters [`GATE_NAME`] out of `pod.spec.schedulingGates`, preserving the
/// relative order of any other gates. Mutates `pod` in place and reports
/// whether anything changed.
pub fn remove_gate(pod: &mut Pod) -> RemovalOutcome {
    let Some(spec) = pod.spec.as_mut() else {
        return RemovalOutcome { removed: false };
    };
    let Some(gates) = spec.scheduling_gates.as_mut() else {
        return RemovalOutcome { removed: false };
    };

    let before = gates.len();
    gates.retain(|g: &PodSchedulingGate| g.name != GATE_NAME);
    let removed = gates.len() != before;

    if gates.is_empty() {
        spec.scheduling_gates = None;
    }

    RemovalOutcome { removed }
}
