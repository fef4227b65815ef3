//! Foundational primitives for active-contour cell segmentation.
//!
//! ## Coordinates
//! Contour geometry is double precision. Integer raster coordinates refer to
//! pixel centers; a contour point `(x, y)` samples pixel
//! `(x.round(), y.round())`.
//!
//! ## Border Modes
//! Raster sampling supports clamp, constant fill, and reflect-101 behavior.
//! Contour forces probe rectangles that may leave the image near the frame
//! edge, so every sampler carries an explicit [`BorderMode`].
//!
//! ## Segment Intersection
//! [`segment_intersection`] classifies a pair of segments into the four
//! states used by topology repair. Only [`SegmentIntersection::Crossing`]
//! reports a bounded intersection point.

mod border;
mod error;
mod geom;
mod image;
mod intersect;
mod sample;

pub use border::{BorderMode, map_index};
pub use error::Error;
pub use geom::{Bounds2d, Point2d, Vec2d};
pub use image::{Image, ImageView};
pub use intersect::{INTERSECT_EPS, SegmentIntersection, dist_point_to_segment, segment_intersection};
pub use sample::{BorderedView, IntensitySampler, sample_pixel};
