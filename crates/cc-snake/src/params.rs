use cc_core::BorderMode;
use cc_ring::NormalOrientation;
use serde::{Deserialize, Serialize};

use crate::SnakeError;

/// Numeric knobs of the contour model, passed by reference to every step.
///
/// Distances are in pixels, forces in pixels per iteration squared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegParams {
    /// Target node spacing; resampling keeps edges in `[node_res, 1.9 * node_res]`.
    pub node_res: f64,
    /// Nodes slower than this freeze.
    pub vel_crit: f64,
    pub f_central: f64,
    pub f_image: f64,
    pub f_contract: f64,
    /// Velocity retained per iteration, in `[0, 1)`.
    pub f_friction: f64,
    /// Inward shrink applied after convergence, contracting mode only.
    pub final_shrink: f64,
    /// Outward blow-up applied before iterating, contracting mode only.
    pub blowup: f64,
    /// Snakes whose centroids are closer than this interact while loosening.
    pub proximity: f64,
    /// Minimum gap kept between neighbouring snakes while loosening.
    pub prox_freeze: f64,
    pub max_iterations: usize,
    /// Tangential extent of the image-force sampling rectangle.
    pub sample_tan: f64,
    /// Normal extent of the image-force sampling rectangle.
    pub sample_norm: f64,
    /// Loop cutting runs every `cut_every` iterations.
    pub cut_every: usize,
    /// Node-count limit in percent of the starting count.
    pub nmax: usize,
    pub delta_t: f64,
    /// Grow seeds from inside the cell instead of contracting onto it.
    pub expand_snake: bool,
    /// Start each frame from the previous frame's final contour.
    pub reuse_previous: bool,
    pub border: BorderMode<u8>,
}

impl Default for SegParams {
    fn default() -> Self {
        Self {
            node_res: 6.0,
            vel_crit: 0.005,
            f_central: 0.04,
            f_image: 0.2,
            f_contract: 0.04,
            f_friction: 0.6,
            final_shrink: 3.0,
            blowup: 20.0,
            proximity: 150.0,
            prox_freeze: 1.0,
            max_iterations: 4000,
            sample_tan: 4.0,
            sample_norm: 12.0,
            cut_every: 8,
            nmax: 250,
            delta_t: 1.0,
            expand_snake: false,
            reuse_previous: true,
            border: BorderMode::Clamp,
        }
    }
}

impl SegParams {
    pub fn min_dist(&self) -> f64 {
        self.node_res
    }

    pub fn max_dist(&self) -> f64 {
        1.9 * self.node_res
    }

    pub fn orientation(&self) -> NormalOrientation {
        if self.expand_snake {
            NormalOrientation::Outward
        } else {
            NormalOrientation::Inward
        }
    }

    pub fn validate(&self) -> Result<(), SnakeError> {
        fn positive(name: &str, v: f64) -> Result<(), SnakeError> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(SnakeError::InvalidParams(format!("{name} must be > 0, got {v}")))
            }
        }

        fn non_negative(name: &str, v: f64) -> Result<(), SnakeError> {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(SnakeError::InvalidParams(format!("{name} must be >= 0, got {v}")))
            }
        }

        positive("node_res", self.node_res)?;
        positive("delta_t", self.delta_t)?;
        positive("sample_tan", self.sample_tan)?;
        positive("sample_norm", self.sample_norm)?;
        non_negative("vel_crit", self.vel_crit)?;
        non_negative("f_central", self.f_central)?;
        non_negative("f_image", self.f_image)?;
        non_negative("f_contract", self.f_contract)?;
        non_negative("final_shrink", self.final_shrink)?;
        non_negative("blowup", self.blowup)?;
        non_negative("proximity", self.proximity)?;
        non_negative("prox_freeze", self.prox_freeze)?;

        if !(0.0..1.0).contains(&self.f_friction) {
            return Err(SnakeError::InvalidParams(format!(
                "f_friction must be in [0, 1), got {}",
                self.f_friction
            )));
        }
        if self.max_iterations == 0 {
            return Err(SnakeError::InvalidParams("max_iterations must be > 0".into()));
        }
        if self.cut_every == 0 {
            return Err(SnakeError::InvalidParams("cut_every must be > 0".into()));
        }
        if self.nmax < 100 {
            return Err(SnakeError::InvalidParams(format!(
                "nmax is a percentage of the starting node count and must be >= 100, got {}",
                self.nmax
            )));
        }
        Ok(())
    }
}
