//! Multi-cell coordination and per-frame orchestration.
//!
//! A [`Nest`] owns one [`SnakeHandler`] per tracked cell. Each handler keeps
//! the cell's seed, its live snake and the per-frame results: `segmented`
//! contours straight out of the force model and `finals` after the filter
//! chain.
//!
//! [`Segmenter`] drives one frame at a time:
//! 1. seed a snake per active handler (from the seed, or from the previous
//!    frame's final contour),
//! 2. [`loosen`] the whole nest outward, or [`implode`] it in expanding mode;
//!    neighbouring snakes are kept `prox_freeze` apart,
//! 3. evolve each snake independently, optionally in parallel,
//! 4. finalize, filter and store.
//!
//! Every handler draws from its own random stream seeded from the run seed,
//! its id and the frame, so serial and parallel runs agree.

mod cancel;
mod coordination;
mod error;
mod filter;
mod handler;
mod nest;
mod seed;
mod segmenter;

pub use cancel::CancelToken;
pub use coordination::{IMPLODE_RADIUS_FACTOR, LOOSEN_STEP, freeze_proximity, implode, loosen};
pub use error::SegmentationError;
pub use filter::{ContourFilter, FilterError, FilterErrorPolicy, MovingAverage};
pub use handler::{FrameState, HandlerId, HandlerState, SnakeHandler};
pub use nest::Nest;
pub use seed::Seed;
pub use segmenter::{
    FrameReport, HandlerReport, IterationOutcome, RESAMPLE_EVERY, RunReport, SHRINK_STEP, Segmenter,
    SegmenterConfig,
};
