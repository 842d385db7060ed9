// SPDX-License-Identifier: Apache-2.0
//! The image-set fingerprint (§4.1): a deterministic peer-grouping key.
//!
//! Two pods with the same *set* of distinct image references fingerprint to
//! the same value regardless of container order, duplication, or whether an
//! image lives in an init container or a main one.

use k8s_openapi::api::core::v1::Pod;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Length of the hex-encoded SHA-256 digest this module produces.
pub const FINGERPRINT_LEN: usize = 64;

/// Collects the declaration-ordered image references of a pod (init
/// containers first, then main containers), skipping empty strings.
///
/// This is the *ordered* list consumed by the reconciler's image-inventory
/// check (§4.5 Step 4); it intentionally keeps duplicates, unlike
/// [`fingerprint`].
pub fn pod_images(pod: &Pod) -> Vec<String> {
    let Some(spec) = pod.spec.as_ref() else {
        return Vec::new();
    };
    let init = spec.init_containers.iter().flatten();
    let main = spec.containers.iter();
    init.chain(main)
        .filter_map(|c| c.image.clone())
        .filter(|image| !image.is_empty())
        .collect()
}

/// Computes the fingerprint of a pod's distinct image set.
///
/// Collapses the pod's init+main container images to a set, sorts them
/// byte-wise, joins with a single `,`, and hashes with SHA-256. The result is
/// a 64-character lower-case hex string, stable across processes and
/// versions because it is a cluster-visible annotation value.
pub fn fingerprint(pod: &Pod) -> String {
    let images = pod_images(pod);
    fingerprint_images(images.iter().map(String::as_str))
}

/// Computes the fingerprint directly from an iterator of image references,
/// for callers that already have the set (e.g. tests asserting the
/// reference vector from the design doc).
pub fn fingerprint_images<'a>(images: impl IntoIterator<Item = &'a str>) -> String {
    let distinct: BTreeSet<&str> = images.into_iter().filter(|s| !s.is_empty()).collect();
    let joined = distinct.into_iter().collect::<Vec<_>>().join(",");
    let digest = Sha256::digest(joined.as_bytes());
    hex_lower(&digest)
}

fn hex_lower(bytes: &[u8]) -> String {
    const LUT: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(LUT[(b >> 4) as usize] as char);
        out.push(LUT[(b & 0x0f) as usize] as char);
    }
    out
}
