//! Closed circular point lists.
//!
//! A [`ClosedPointList`] is a doubly-linked cycle of vertices stored in a
//! generational arena. Vertices are addressed by [`VertexKey`]; a key of a
//! removed vertex never resolves again, so topology edits cannot alias.
//!
//! Invariants kept by every public operation:
//! - exactly one head vertex,
//! - following `next` exactly `len()` times from any vertex returns to it,
//! - `len() >= 3`; removals that would break this fail with
//!   [`RingError::TooFewNodes`] and leave the ring untouched.
//!
//! Winding: [`ClosedPointList::make_anticlockwise`] canonicalises rings so the
//! shoelace sum `Σ (x[i+1] - x[i]) * (y[i+1] + y[i])` is non-positive. For such
//! rings the tangent rotated by +90° points into the enclosed region; that is
//! the [`NormalOrientation::Inward`] normal.

mod error;
mod ring;

pub use error::RingError;
pub use ring::{
    ClosedPointList, Direction, Iter, MIN_RING_LEN, NormalOrientation, RingPoint, Vertex, VertexKey,
};
