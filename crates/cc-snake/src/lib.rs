//! Active-contour snakes.
//!
//! A [`Snake`] is a closed ring of [`ContourNode`]s that deforms under three
//! forces per iteration ([`constrict`]):
//! - a central force along the node normal,
//! - a contraction force straightening the node against its neighbours,
//! - an image force from the intensity contrast across the contour.
//!
//! Friction damps velocities; nodes slower than `vel_crit` freeze. Topology
//! repair ([`cut_loops`], [`cut_intersects`]) removes self-intersections and
//! [`resample`] keeps the node spacing within `[node_res, 1.9 * node_res]`.
//!
//! All parameters travel in an explicit [`SegParams`]; randomness is drawn
//! from a caller-provided RNG so runs are reproducible.

mod constrict;
mod error;
mod node;
mod params;
mod snake;
mod topology;

pub use constrict::{SAMPLE_STEP, central_force, constrict, contraction_force, image_force};
pub use error::SnakeError;
pub use node::{ContourNode, NodeState};
pub use params::SegParams;
pub use snake::{IMPLODE_NODES, Snake};
pub use topology::{LOOP_WINDOW, cut_intersects, cut_loops, resample};
