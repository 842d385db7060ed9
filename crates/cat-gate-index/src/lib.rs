// SPDX-License-Identifier: Apache-2.0
//! The fingerprint → peers secondary index (C2).
//!
//! Kept eventually consistent with the controller's cache, not the
//! authoritative store (§4.2); §4.5 Step 3 is how the reconciler absorbs the
//! resulting lag. The index never performs an API call itself — it is
//! updated purely from the events the controller's watch stream already
//! delivers.

use cat_gate_core::IMAGES_HASH_ANNOTATION;
use dashmap::DashMap;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::sync::Arc;

/// Namespace + name identity of a pod, independent of any other field so it
/// is cheap to hold in the index and to re-fetch through the primary store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodKey {
    /// The pod's namespace. Cluster-scoped lookups never occur for pods, but
    /// the field stays optional to mirror `kube`'s own `ObjectRef`.
    pub namespace: Option<String>,
    /// The pod's name.
    pub name: String,
}

impl PodKey {
    /// Builds a key from a live pod, reading `metadata.namespace`/`.name`.
    pub fn from_pod(pod: &Pod) -> Self {
        Self {
            namespace: pod.namespace(),
            name: pod.name_any(),
        }
    }
}

/// Fingerprint → peer-pod-key index, plus the reverse map needed to relocate
/// or drop an entry when a pod is updated or deleted.
#[derive(Debug, Clone, Default)]
pub struct Index {
    by_fingerprint: Arc<DashMap<String, Vec<PodKey>>>,
    key_fingerprint: Arc<DashMap<PodKey, String>>,
}

impl Index {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the current state of `pod` to the index: files it under its
    /// `images-hash` annotation, relocating it if the annotation somehow
    /// changed, and drops it from the index entirely if the annotation is
    /// absent (§4.2: "instances lacking the annotation produce no key").
    pub fn observe(&self, pod: &Pod) {
        let key = PodKey::from_pod(pod);
        let fingerprint = pod
            .annotations()
            .get(IMAGES_HASH_ANNOTATION)
            .filter(|value| !value.is_empty())
            .cloned();

        match fingerprint {
            Some(fp) => self.insert(key, fp),
            None => self.remove(&key),
        }
    }

    /// Removes `key` from the index entirely, e.g. on a delete event.
    pub fn remove(&self, key: &PodKey) {
        if let Some((_, old_fp)) = self.key_fingerprint.remove(key) {
            if let Some(mut bucket) = self.by_fingerprint.get_mut(&old_fp) {
                bucket.retain(|k| k != key);
            }
        }
    }

    /// Returns every pod key currently filed under `fingerprint`. O(peers),
    /// not O(total pods).
    pub fn peers(&self, fingerprint: &str) -> Vec<PodKey> {
        self.by_fingerprint
            .get(fingerprint)
            .map(|bucket| bucket.clone())
            .unwrap_or_default()
    }

    fn insert(&self, key: PodKey, fingerprint: String) {
        if let Some(old_fp) = self.key_fingerprint.get(&key).map(|v| v.clone()) {
            if old_fp == fingerprint {
                return;
            }
            if let Some(mut bucket) = self.by_fingerprint.get_mut(&old_fp) {
                bucket.retain(|k| k != &key);
            }
        }
        self.by_fingerprint
            .entry(fingerprint.clone())
            .or_default()
            .push(key.clone());
        self.key_fingerprint.insert(key, fingerprint);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use k8s_openapi::api::core::v1::Pod;
    use kube::core::ObjectMeta;
    use std::collections::BTreeMap;

    fn pod(ns: &str, name: &str, fingerprint: Option<&str>) -> Pod {
        let mut annotations = BTreeMap::new();
        if let Some(fp) = fingerprint {
            annotations.insert(IMAGES_HASH_ANNOTATION.to_string(), fp.to_string());
        }
        Pod {
            metadata: ObjectMeta {
                namespace: Some(ns.to_string()),
                name: Some(name.to_string()),
                annotations: Some(annotations),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn pods_without_the_annotation_produce_no_key() {
        let index = Index::new();
        index.observe(&pod("ns", "a", None));
        assert!(index.peers("anything").is_empty());
    }

    #[test]
    fn peers_share_a_fingerprint_bucket() {
        let index = Index::new();
        index.observe(&pod("ns", "a", Some("fp1")));
        index.observe(&pod("ns", "b", Some("fp1")));
        index.observe(&pod("ns", "c", Some("fp2")));

        let peers = index.peers("fp1");
        assert_eq!(peers.len(), 2);
        assert!(peers.contains(&PodKey {
            namespace: Some("ns".into()),
            name: "a".into()
        }));
        assert!(peers.contains(&PodKey {
            namespace: Some("ns".into()),
            name: "b".into()
        }));
    }

    #[test]
    fn remove_drops_the_key_from_its_bucket() {
        let index = Index::new();
        let p = pod("ns", "a", Some("fp1"));
        index.observe(&p);
        index.remove(&PodKey::from_pod(&p));
        assert!(index.peers("fp1").is_empty());
    }

    #[test]
    fn re_observing_under_a_new_fingerprint_relocates_the_key() {
        // The reconciler never rewrites the annotation (invariant 2), but
        // the index itself should stay correct if fed a changed value.
        let index = Index::new();
        index.observe(&pod("ns", "a", Some("fp1")));
        index.observe(&pod("ns", "a", Some("fp2")));

        assert!(index.peers("fp1").is_empty());
        assert_eq!(index.peers("fp2").len(), 1);
    }
}
