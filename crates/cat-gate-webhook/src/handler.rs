// SPDX-License-Identifier: Apache-2.0
//! The `axum` adapter around [`crate::mutate::stamp`]: decode an
//! `AdmissionReview`, apply the mutation, diff it into a JSON patch, and
//! reply with the patched `AdmissionResponse`.
//!
//! Side-effect-free from the platform's perspective — no external writes,
//! matching §6's "admission webhook contract". Fails closed (the review
//! comes back `allowed: false`) only when the object cannot be decoded as a
//! `Pod`, per §7's "Wrong object kind at admission ... Reject with
//! descriptive error; admission fails closed".

use axum::Json;
use cat_gate_core::CoreError;
use k8s_openapi::api::core::v1::Pod;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use serde_json::Value;
use tracing::warn;

use crate::mutate::stamp;

/// Handles one `POST /mutate--v1-pod` admission request.
pub async fn mutate(
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(request) => request,
        Err(err) => {
            warn!(%err, "admission review missing a request");
            return Json(AdmissionResponse::invalid(err).into_review());
        }
    };

    let mut response = AdmissionResponse::from(&request);
    let Some(object) = request.object.clone() else {
        // No object to mutate (e.g. a DELETE admission review reaching this
        // path by misconfiguration): allow unchanged.
        return Json(response.into_review());
    };

    response = match build_patch(&object) {
        Ok(Some(patch)) => match response.clone().with_patch(patch) {
            Ok(patched) => patched,
            Err(err) => response.deny(err.to_string()),
        },
        Ok(None) => response,
        Err(err) => {
            warn!(%err, "admission object was not a pod; failing closed");
            response.deny(err.to_string())
        }
    };

    Json(response.into_review())
}

/// Decodes `object` as a `Pod`, applies [`stamp`], and diffs the before/after
/// JSON into a patch. Returns `Ok(None)` if the mutation produced no change
/// (should not happen for a well-formed create, but keeps the handler a
/// no-op if it ever does).
fn build_patch(object: &DynamicObject) -> Result<Option<json_patch::Patch>, CoreError> {
    let before: Value =
        serde_json::to_value(object).map_err(|err| CoreError::UnsupportedKind(err.to_string()))?;
    let mut pod: Pod = serde_json::from_value(before.clone())
        .map_err(|err| CoreError::UnsupportedKind(err.to_string()))?;

    stamp(&mut pod);

    let after =
        serde_json::to_value(&pod).map_err(|err| CoreError::UnsupportedKind(err.to_string()))?;
    let patch = json_patch::diff(&before, &after);
    if patch.0.is_empty() {
        Ok(None)
    } else {
        Ok(Some(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ApiResource;

    fn pod_object(image: &str) -> DynamicObject {
        let resource = ApiResource {
            group: String::new(),
            version: "v1".to_string(),
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
            plural: "pods".to_string(),
        };
        DynamicObject::new("demo", &resource).data(serde_json::json!({
            "spec": { "containers": [{ "name": "app", "image": image }] }
        }))
    }

    #[test]
    fn build_patch_adds_gate_and_annotation_for_a_well_formed_pod() {
        let patch = build_patch(&pod_object("ex/a:1"))
            .expect("a pod body decodes cleanly")
            .expect("stamping always changes a fresh pod");
        assert!(!patch.0.is_empty());
    }
}
