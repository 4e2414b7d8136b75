//! Rendering surfaces.
//!
//! The reconciler is surface-agnostic; concrete displays implement
//! [`crate::host::HostAdapter`] externally. This module ships the one
//! surface the crate itself needs: an in-memory host with an inspection
//! API, used by the test suite and available for headless embedding.

pub mod memory;

pub use memory::{MemoryHost, SnapshotNode};
