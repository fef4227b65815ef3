use std::cell::Cell;
use std::f64::consts::TAU;

use cc_core::{Bounds2d, Point2d, Vec2d};
use cc_ring::{ClosedPointList, NormalOrientation, VertexKey};

use crate::node::{ContourNode, NodeState};
use crate::{SegParams, SnakeError};

/// Node count of the small circle a snake collapses to in expanding mode.
pub const IMPLODE_NODES: usize = 8;

/// A closed active contour.
///
/// The ring is kept anticlockwise after every rebuild, so the inward normal
/// is the tangent rotated by +90°.
#[derive(Debug, Clone)]
pub struct Snake {
    id: u64,
    ring: ClosedPointList<ContourNode>,
    alive: bool,
    starting_node_count: usize,
    frozen_count: usize,
    centroid: Cell<Option<Point2d>>,
}

impl Snake {
    /// Resamples a seed polygon so each edge is split into
    /// `ceil(len / node_res)` equal segments.
    pub fn from_polygon(id: u64, polygon: &[Point2d], params: &SegParams) -> Result<Self, SnakeError> {
        if polygon.len() < 3 || polygon.iter().any(|p| !p.is_finite()) {
            return Err(SnakeError::EmptySeed);
        }

        let mut points = Vec::new();
        for (i, &a) in polygon.iter().enumerate() {
            let b = polygon[(i + 1) % polygon.len()];
            let d = b - a;
            let len = d.norm();
            if len < 1e-9 {
                continue;
            }
            let segs = (len / params.node_res).ceil().max(1.0) as usize;
            for k in 0..segs {
                points.push(a + d * (k as f64 / segs as f64));
            }
        }

        Self::build(id, points, params.orientation())
    }

    /// Samples an axis-aligned ellipse at angular step
    /// `2 / ((rx + ry) / 2) * node_res`.
    pub fn from_ellipse(
        id: u64,
        center: Point2d,
        rx: f64,
        ry: f64,
        params: &SegParams,
    ) -> Result<Self, SnakeError> {
        if !(center.is_finite() && rx.is_finite() && ry.is_finite() && rx > 0.0 && ry > 0.0) {
            return Err(SnakeError::EmptySeed);
        }

        let step = 2.0 / ((rx + ry) / 2.0) * params.node_res;
        let n = ((TAU / step).ceil() as usize).max(3);
        let points = (0..n).map(|i| {
            let t = i as f64 * TAU / n as f64;
            Point2d::new(center.x + rx * t.cos(), center.y + ry * t.sin())
        });

        Self::build(id, points.collect(), params.orientation())
    }

    /// Takes points verbatim, e.g. a previous frame's contour.
    pub fn from_points(
        id: u64,
        points: &[Point2d],
        orientation: NormalOrientation,
    ) -> Result<Self, SnakeError> {
        if points.iter().any(|p| !p.is_finite()) {
            return Err(SnakeError::EmptySeed);
        }
        Self::build(id, points.to_vec(), orientation)
    }

    fn build(id: u64, points: Vec<Point2d>, orientation: NormalOrientation) -> Result<Self, SnakeError> {
        if points.len() < 3 {
            return Err(SnakeError::EmptySeed);
        }

        let mut ring =
            ClosedPointList::from_values_oriented(points.into_iter().map(ContourNode::at), orientation)?;
        ring.make_anticlockwise();

        let count = ring.len();
        Ok(Self {
            id,
            ring,
            alive: true,
            starting_node_count: count,
            frozen_count: 0,
            centroid: Cell::new(None),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    pub fn count(&self) -> usize {
        self.ring.len()
    }

    pub fn starting_node_count(&self) -> usize {
        self.starting_node_count
    }

    pub fn frozen_count(&self) -> usize {
        self.frozen_count
    }

    pub fn is_converged(&self) -> bool {
        self.frozen_count == self.ring.len()
    }

    pub fn ring(&self) -> &ClosedPointList<ContourNode> {
        &self.ring
    }

    pub fn orientation(&self) -> NormalOrientation {
        self.ring.orientation()
    }

    pub fn set_orientation(&mut self, orientation: NormalOrientation) {
        self.ring.set_orientation(orientation);
    }

    pub fn freeze(&mut self, key: VertexKey) {
        let node = self.ring.value_mut(key);
        if !node.frozen {
            node.frozen = true;
            self.frozen_count += 1;
        }
    }

    pub fn unfreeze(&mut self, key: VertexKey) {
        let node = self.ring.value_mut(key);
        if node.frozen {
            node.frozen = false;
            self.frozen_count -= 1;
        }
    }

    pub fn unfreeze_all(&mut self) {
        for node in self.ring.values_mut() {
            node.frozen = false;
        }
        self.frozen_count = 0;
    }

    pub fn is_frozen(&self, key: VertexKey) -> bool {
        self.ring.value(key).frozen
    }

    pub fn point(&self, key: VertexKey) -> Point2d {
        self.ring.point(key)
    }

    /// Moves a node without refreshing normals.
    pub fn set_point(&mut self, key: VertexKey, p: Point2d) {
        self.ring.set_point(key, p);
        self.centroid.set(None);
    }

    pub fn update_normals(&mut self) {
        self.ring.update_normals();
    }

    /// Moves every unfrozen node by `step` along its normal.
    pub fn scale(&mut self, step: f64) {
        self.ring.scale(step);
        self.centroid.set(None);
    }

    /// Area centroid, or the vertex mean for degenerate rings. Cached until
    /// the next edit.
    pub fn centroid(&self) -> Point2d {
        if let Some(c) = self.centroid.get() {
            return c;
        }

        let pts = self.ring.as_polygon();
        let n = pts.len();
        let (mut a2, mut cx, mut cy) = (0.0, 0.0, 0.0);
        for (i, p) in pts.iter().enumerate() {
            let q = pts[(i + 1) % n];
            let cross = p.x * q.y - q.x * p.y;
            a2 += cross;
            cx += (p.x + q.x) * cross;
            cy += (p.y + q.y) * cross;
        }

        let c = if a2.abs() > 1e-9 {
            Point2d::new(cx / (3.0 * a2), cy / (3.0 * a2))
        } else {
            let sum = pts.iter().fold(Vec2d::default(), |acc, p| acc + p.to_vec());
            let m = sum * (1.0 / n as f64);
            Point2d::new(m.x, m.y)
        };
        self.centroid.set(Some(c));
        c
    }

    pub fn bounds(&self) -> Option<Bounds2d> {
        self.ring.bounds()
    }

    pub fn as_polygon(&self) -> Vec<Point2d> {
        self.ring.as_polygon()
    }

    /// Physical state of every node from the head.
    pub fn nodes(&mut self) -> Vec<NodeState> {
        self.ring.update_positions();
        self.ring
            .iter()
            .map(|(_, v)| {
                let n = v.value();
                NodeState {
                    track_id: v.track_id(),
                    position: v.position(),
                    point: n.point,
                    normal: v.normal(),
                    tangent: v.tangent(),
                    velocity: n.velocity,
                    total_force: n.total_force,
                    frozen: n.frozen,
                }
            })
            .collect()
    }

    /// Replaces the contour with a small circle at its centroid whose normals
    /// point outward. The seed's starting node count is kept as the reference
    /// for the node-limit check.
    pub fn implode(&mut self, radius: f64) -> Result<(), SnakeError> {
        let c = self.centroid();
        let points: Vec<Point2d> = (0..IMPLODE_NODES)
            .map(|i| {
                let t = i as f64 * TAU / IMPLODE_NODES as f64;
                Point2d::new(c.x + radius * t.cos(), c.y + radius * t.sin())
            })
            .collect();

        let rebuilt = Self::build(self.id, points, NormalOrientation::Outward)?;
        self.ring = rebuilt.ring;
        self.frozen_count = 0;
        self.centroid.set(None);
        Ok(())
    }

    pub(crate) fn ring_mut(&mut self) -> &mut ClosedPointList<ContourNode> {
        self.centroid.set(None);
        &mut self.ring
    }

    pub(crate) fn recount_frozen(&mut self) {
        self.frozen_count = self.ring.iter().filter(|(_, v)| v.value().frozen).count();
    }
}

#[cfg(test)]
mod tests {
    use cc_core::Point2d;
    use cc_ring::NormalOrientation;

    use super::Snake;
    use crate::{SegParams, SnakeError};

    fn square(side: f64) -> Vec<Point2d> {
        vec![
            Point2d::new(0.0, 0.0),
            Point2d::new(side, 0.0),
            Point2d::new(side, side),
            Point2d::new(0.0, side),
        ]
    }

    #[test]
    fn polygon_edges_are_subdivided() {
        let params = SegParams::default();
        let snake = Snake::from_polygon(1, &square(30.0), &params).expect("valid seed");

        assert_eq!(snake.count(), 20);
        assert_eq!(snake.starting_node_count(), 20);
        assert!(snake.ring().check_is_head());
        assert!(snake.ring().signed_area() > 0.0);

        let c = snake.centroid();
        assert!((c.x - 15.0).abs() < 1e-9 && (c.y - 15.0).abs() < 1e-9);
    }

    #[test]
    fn clockwise_seed_is_canonicalised() {
        let mut pts = square(30.0);
        pts.reverse();
        let snake = Snake::from_polygon(1, &pts, &SegParams::default()).expect("valid seed");
        assert!(snake.ring().signed_area() > 0.0);
    }

    #[test]
    fn ellipse_node_count_follows_angular_step() {
        let params = SegParams::default();
        let snake =
            Snake::from_ellipse(3, Point2d::new(50.0, 50.0), 45.0, 45.0, &params).expect("valid seed");

        // step = 2 / 45 * 6 rad
        assert_eq!(snake.count(), 24);
        for p in snake.as_polygon() {
            assert!((p.dist(Point2d::new(50.0, 50.0)) - 45.0).abs() < 1e-9);
        }
    }

    #[test]
    fn degenerate_seeds_are_rejected() {
        let params = SegParams::default();
        assert_eq!(
            Snake::from_polygon(0, &square(1.0)[..2], &params).expect_err("two points"),
            SnakeError::EmptySeed
        );
        assert_eq!(
            Snake::from_ellipse(0, Point2d::default(), 0.0, 5.0, &params).expect_err("flat"),
            SnakeError::EmptySeed
        );
    }

    #[test]
    fn polygon_round_trip_preserves_points() {
        let params = SegParams::default();
        let snake = Snake::from_ellipse(1, Point2d::new(10.0, 20.0), 30.0, 18.0, &params)
            .expect("valid seed");
        let poly = snake.as_polygon();

        let copy = Snake::from_points(2, &poly, NormalOrientation::Inward).expect("valid points");
        assert_eq!(copy.count(), snake.count());
        assert_eq!(copy.as_polygon(), poly);
    }

    #[test]
    fn freeze_bookkeeping() {
        let mut snake = Snake::from_polygon(1, &square(12.0), &SegParams::default())
            .expect("valid seed");
        let keys = snake.ring().keys();

        snake.freeze(keys[0]);
        snake.freeze(keys[0]);
        snake.freeze(keys[1]);
        assert_eq!(snake.frozen_count(), 2);

        snake.unfreeze(keys[1]);
        assert_eq!(snake.frozen_count(), 1);

        for &k in &keys {
            snake.freeze(k);
        }
        assert!(snake.is_converged());

        snake.unfreeze_all();
        assert_eq!(snake.frozen_count(), 0);
        assert!(!snake.is_converged());
    }

    #[test]
    fn implode_makes_outward_circle_at_centroid() {
        let mut snake = Snake::from_polygon(1, &square(40.0), &SegParams::default())
            .expect("valid seed");
        let seeded = snake.starting_node_count();
        snake.implode(4.0).expect("8 nodes");

        assert_eq!(snake.count(), 8);
        assert_eq!(snake.starting_node_count(), seeded);
        assert_eq!(snake.orientation(), NormalOrientation::Outward);
        let c = Point2d::new(20.0, 20.0);
        for (_, v) in snake.ring().iter() {
            assert!((v.point().dist(c) - 4.0).abs() < 1e-9);
            let outward = (v.point() - c).normalize();
            assert!(v.normal().dot(outward) > 0.99);
        }
    }

    #[test]
    fn centroid_cache_is_invalidated_by_scale() {
        let mut snake = Snake::from_polygon(1, &square(30.0), &SegParams::default())
            .expect("valid seed");
        let before = snake.centroid();
        let keys = snake.ring().keys();
        for &k in &keys[..5] {
            snake.freeze(k);
        }
        snake.scale(2.0);
        assert_ne!(snake.centroid(), before);
    }

    #[test]
    fn node_snapshot_covers_every_node() {
        let mut snake = Snake::from_polygon(1, &square(30.0), &SegParams::default())
            .expect("valid seed");
        let nodes = snake.nodes();
        assert_eq!(nodes.len(), 20);
        assert_eq!(nodes[0].position, 0.0);
        assert!(nodes.windows(2).all(|w| w[0].position < w[1].position));
    }
}
