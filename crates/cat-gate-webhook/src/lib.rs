// SPDX-License-Identifier: Apache-2.0
//! The mutating admission webhook (C3): on Pod create, attach the
//! scheduling gate and the fingerprint annotation.

pub mod handler;
pub mod mutate;

pub use handler::mutate as handler;
pub use mutate::stamp;
