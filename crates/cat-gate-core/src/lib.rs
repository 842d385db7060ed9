// SPDX-License-Identifier: Apache-2.0
//! Pure primitives shared by the `cat-gate` controller: the image-set
//! fingerprint (C1) and the scheduling-gate lifecycle helpers (C4).
//!
//! Everything here operates on plain `k8s_openapi` types and never talks to
//! the API server, so it is exercised entirely by `#[test]`s with no fake
//! client and no cluster.

pub mod error;
pub mod fingerprint;
pub mod gate;

pub use error::CoreError;
pub use fingerprint::fingerprint;
pub use gate::{has_gate, remove_gate, GATE_NAME, IMAGES_HASH_ANNOTATION};
