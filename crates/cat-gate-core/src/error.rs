// SPDX-License-Identifier: Apache-2.0
//! Error type for `cat-gate-core`.

use thiserror::Error;

/// Errors raised by the pure gate/fingerprint primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The object handed to the admission mutator was not a `Pod`.
    #[error("unsupported object kind: {0}")]
    UnsupportedKind(String),
}
