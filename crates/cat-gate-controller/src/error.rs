// SPDX-License-Identifier: Apache-2.0
//! Error type for the reconciler.

use thiserror::Error;

/// Errors the reconciler can surface to the `kube::runtime::Controller`
/// driver, which retries with backoff per §7 ("Transient platform error ...
/// Surfaced; framework retries with backoff").
#[derive(Debug, Error)]
pub enum Error {
    /// A get/list/patch call against the API server failed.
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
    /// The triggering pod has no namespace, which should be unreachable for
    /// a namespaced resource but is surfaced rather than assumed away.
    #[error("pod {0} has no namespace")]
    MissingNamespace(String),
}
