use cc_core::Point2d;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FilterError(pub String);

impl FilterError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Post-processing step applied to a converged contour.
pub trait ContourFilter: Send + Sync {
    fn name(&self) -> &str {
        "filter"
    }

    fn apply(&self, contour: &[Point2d]) -> Result<Vec<Point2d>, FilterError>;
}

impl<F> ContourFilter for F
where
    F: Fn(&[Point2d]) -> Result<Vec<Point2d>, FilterError> + Send + Sync,
{
    fn apply(&self, contour: &[Point2d]) -> Result<Vec<Point2d>, FilterError> {
        self(contour)
    }
}

/// What to keep as the final contour when a filter fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterErrorPolicy {
    /// Keep the unfiltered contour.
    #[default]
    StoreSegmented,
    /// Fail the whole frame.
    AbortFrame,
}

/// Circular moving average over `2 * half_window + 1` points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverage {
    pub half_window: usize,
}

impl ContourFilter for MovingAverage {
    fn name(&self) -> &str {
        "moving_average"
    }

    fn apply(&self, contour: &[Point2d]) -> Result<Vec<Point2d>, FilterError> {
        let n = contour.len();
        let w = self.half_window;
        if 2 * w + 1 > n {
            return Err(FilterError::new(format!(
                "window of {} points exceeds contour of {n}",
                2 * w + 1
            )));
        }

        let scale = 1.0 / (2 * w + 1) as f64;
        Ok((0..n)
            .map(|i| {
                let (sx, sy) = (0..=2 * w).fold((0.0, 0.0), |(sx, sy), k| {
                    let p = contour[(i + n + k - w) % n];
                    (sx + p.x, sy + p.y)
                });
                Point2d::new(sx * scale, sy * scale)
            })
            .collect())
    }
}
