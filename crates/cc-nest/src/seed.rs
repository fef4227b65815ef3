use cc_core::Point2d;
use cc_snake::{SegParams, Snake, SnakeError};
use serde::{Deserialize, Serialize};

/// Initial outline of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seed {
    Polygon(Vec<Point2d>),
    Ellipse { center: Point2d, rx: f64, ry: f64 },
}

impl Seed {
    pub fn to_snake(&self, id: u64, params: &SegParams) -> Result<Snake, SnakeError> {
        match self {
            Self::Polygon(points) => Snake::from_polygon(id, points, params),
            Self::Ellipse { center, rx, ry } => Snake::from_ellipse(id, *center, *rx, *ry, params),
        }
    }
}
