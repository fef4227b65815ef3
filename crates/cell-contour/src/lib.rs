//! Umbrella crate for the `cell-contour` workspace.
//!
//! Re-exports the geometry and sampling primitives, the contour ring, the
//! snake model and the multi-cell segmenter.

pub use cc_core::*;
pub use cc_nest::*;
pub use cc_ring::*;
pub use cc_snake::*;
