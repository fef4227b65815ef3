use cc_core::{Point2d, Vec2d};
use cc_ring::RingPoint;
use serde::Serialize;

/// Physical state carried by each snake vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContourNode {
    pub point: Point2d,
    pub velocity: Vec2d,
    pub total_force: Vec2d,
    /// Displacement computed in the force pass, applied in the move pass.
    pub pending: Vec2d,
    pub frozen: bool,
}

impl ContourNode {
    pub fn at(point: Point2d) -> Self {
        Self {
            point,
            ..Self::default()
        }
    }
}

impl RingPoint for ContourNode {
    fn point(&self) -> Point2d {
        self.point
    }

    fn set_point(&mut self, p: Point2d) {
        self.point = p;
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// Per-node snapshot for visualisation and export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeState {
    pub track_id: u64,
    pub position: f64,
    pub point: Point2d,
    pub normal: Vec2d,
    pub tangent: Vec2d,
    pub velocity: Vec2d,
    pub total_force: Vec2d,
    pub frozen: bool,
}
