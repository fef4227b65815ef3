use cc_core::{Point2d, SegmentIntersection, Vec2d, segment_intersection};
use cc_ring::{Direction, VertexKey};
use log::trace;
use rand::Rng;

use crate::node::ContourNode;
use crate::{SegParams, Snake, SnakeError};

/// Segments scanned ahead of each node by [`cut_loops`].
pub const LOOP_WINDOW: usize = 12;

/// Removes small self-intersection loops.
///
/// Each segment is tested against the next `min(12, count - 3)` segments
/// ahead. On a crossing, the nodes between the two segments are replaced by a
/// single node at the crossing point. Returns the number of cuts.
pub fn cut_loops(snake: &mut Snake, params: &SegParams) -> Result<usize, SnakeError> {
    let cuts = scan_crossings(snake, params, |count| LOOP_WINDOW.min(count.saturating_sub(3)))?;
    if cuts > 0 {
        trace!("snake {}: cut {cuts} loops, {} nodes left", snake.id(), snake.count());
    }
    Ok(cuts)
}

/// Removes every self-intersection, scanning `count / 2 - 1` segments ahead
/// of each segment.
pub fn cut_intersects(snake: &mut Snake, params: &SegParams) -> Result<usize, SnakeError> {
    let window = |count: usize| (count / 2).saturating_sub(1);

    let mut total = 0;
    // Each pass shrinks the ring, so this terminates.
    loop {
        let cuts = scan_crossings(snake, params, window)?;
        total += cuts;
        if cuts == 0 {
            break;
        }
    }
    if total > 0 {
        trace!("snake {}: cut {total} intersections, {} nodes left", snake.id(), snake.count());
    }
    Ok(total)
}

fn scan_crossings(
    snake: &mut Snake,
    params: &SegParams,
    window: impl Fn(usize) -> usize,
) -> Result<usize, SnakeError> {
    let mut cuts = 0;
    let mut a = snake.ring().head();
    let mut remaining = snake.count();

    while remaining > 0 {
        remaining -= 1;
        if let Some((through, x)) = find_crossing(snake, a, window(snake.count())) {
            splice_crossing(snake, a, through, x, params)?;
            cuts += 1;
            remaining = remaining.min(snake.count());
        }
        a = snake.ring().next(a);
    }

    if cuts > 0 {
        snake.update_normals();
        snake.recount_frozen();
    }
    Ok(cuts)
}

/// First segment `b -> b.next` within `window` segments past `a -> a.next`
/// that crosses it.
fn find_crossing(snake: &Snake, a: VertexKey, window: usize) -> Option<(VertexKey, Point2d)> {
    let ring = snake.ring();
    let a_next = ring.next(a);
    let (pa, pa_next) = (ring.point(a), ring.point(a_next));

    let mut b = ring.next(a_next);
    for _ in 0..window {
        let b_next = ring.next(b);
        if b_next == a {
            break;
        }
        if let SegmentIntersection::Crossing(x) =
            segment_intersection(pa, pa_next, ring.point(b), ring.point(b_next))
        {
            return Some((b, x));
        }
        b = b_next;
    }
    None
}

fn splice_crossing(
    snake: &mut Snake,
    after: VertexKey,
    through: VertexKey,
    x: Point2d,
    params: &SegParams,
) -> Result<(), SnakeError> {
    let carried = snake.ring().value(through).velocity;
    let node = ContourNode {
        point: x,
        velocity: carried,
        ..ContourNode::default()
    };

    let ring = snake.ring_mut();
    let (key, removed) = ring.replace_run(after, through, node)?;
    let fallback = ring.get(key).map(|v| v.normal()).unwrap_or_default();
    let v = floor_velocity(carried, fallback, params);
    ring.value_mut(key).velocity = v;

    trace!("excised {} nodes at ({:.2}, {:.2})", removed.len(), x.x, x.y);
    Ok(())
}

/// Keeps fresh nodes moving: speeds below `1.5 * vel_crit` are raised to it.
fn floor_velocity(v: Vec2d, fallback_dir: Vec2d, params: &SegParams) -> Vec2d {
    let floor = 1.5 * params.vel_crit;
    if v.norm() >= floor {
        return v;
    }
    let dir = if v.norm() > 0.0 { v.normalize() } else { fallback_dir.normalize() };
    dir * floor
}

/// Restores node density so every edge stays within
/// `[min_dist, max_dist]`.
///
/// The ring is walked once in a random direction; nodes inserted during the
/// walk are not revisited. A node too close to a neighbour is moved to the
/// midpoint of its neighbours when they are far enough apart, otherwise
/// deleted.
/// A gap too long behind the cursor gets a midpoint node; with
/// `shift_new_node` the midpoint is pushed by a quarter of the neighbours'
/// mean offset from their chords so curvature is kept.
pub fn resample<R: Rng + ?Sized>(
    snake: &mut Snake,
    params: &SegParams,
    shift_new_node: bool,
    rng: &mut R,
) -> Result<(), SnakeError> {
    let dir = Direction::random(rng);
    let back = dir.reversed();
    let (min_dist, max_dist) = (params.min_dist(), params.max_dist());

    let visit: Vec<VertexKey> = snake.ring().iter_dir(dir).map(|(k, _)| k).collect();
    let (mut moved, mut removed, mut inserted) = (0usize, 0usize, 0usize);

    for key in visit {
        if !snake.ring().contains(key) {
            continue;
        }

        let ring = snake.ring();
        let (prev, next) = (ring.step(key, back), ring.step(key, dir));
        let (pp, p, pn) = (ring.point(prev), ring.point(key), ring.point(next));

        if p.dist(pp) < min_dist || p.dist(pn) < min_dist {
            if pp.dist(pn) > 2.0 * min_dist {
                snake.set_point(key, pp.midpoint(pn));
                snake.unfreeze(key);
                let ring = snake.ring_mut();
                ring.update_normal(prev);
                ring.update_normal(key);
                ring.update_normal(next);
                moved += 1;
            } else {
                let ring = snake.ring_mut();
                ring.remove(key, rng)?;
                removed += 1;
                continue;
            }
        }

        let ring = snake.ring();
        let trail = ring.step(key, back);
        let (pt, p) = (ring.point(trail), ring.point(key));
        if pt.dist(p) > max_dist {
            let mut mid = pt.midpoint(p);
            if shift_new_node {
                let bend = chord_offset(snake, trail) + chord_offset(snake, key);
                mid += bend * 0.125;
            }

            let vt = ring.value(trail).velocity;
            let vk = ring.value(key).velocity;
            let node = ContourNode {
                point: mid,
                velocity: (vt + vk) * 0.5,
                ..ContourNode::default()
            };

            let ring = snake.ring_mut();
            let new_key = match dir {
                Direction::Forward => ring.insert_before(key, node)?,
                Direction::Backward => ring.insert_after(key, node)?,
            };
            ring.update_normal(trail);
            ring.update_normal(key);
            let normal = ring.get(new_key).map(|v| v.normal()).unwrap_or_default();
            let node = ring.value_mut(new_key);
            node.velocity = floor_velocity(node.velocity, normal, params);
            inserted += 1;
        }
    }

    snake.update_normals();
    snake.recount_frozen();
    if moved + removed + inserted > 0 {
        trace!(
            "snake {}: resample moved {moved}, removed {removed}, inserted {inserted}; {} nodes",
            snake.id(),
            snake.count()
        );
    }
    Ok(())
}

/// Offset of a node from the midpoint of its neighbours' chord.
fn chord_offset(snake: &Snake, key: VertexKey) -> Vec2d {
    let ring = snake.ring();
    let mid = ring.point(ring.prev(key)).midpoint(ring.point(ring.next(key)));
    ring.point(key) - mid
}

#[cfg(test)]
mod tests {
    use cc_core::{Point2d, SegmentIntersection, segment_intersection};
    use cc_ring::NormalOrientation;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::{cut_intersects, cut_loops, resample};
    use crate::{SegParams, Snake, SnakeError};

    fn circle(n: usize, c: Point2d, r: f64) -> Vec<Point2d> {
        (0..n)
            .map(|i| {
                let t = i as f64 / n as f64 * std::f64::consts::TAU;
                Point2d::new(c.x + r * t.cos(), c.y + r * t.sin())
            })
            .collect()
    }

    fn hourglass() -> Vec<Point2d> {
        vec![
            Point2d::new(0.0, 0.0),
            Point2d::new(10.0, 0.0),
            Point2d::new(10.0, -6.0),
            Point2d::new(5.0, -6.0),
            Point2d::new(5.0, 6.0),
            Point2d::new(5.0, 20.0),
            Point2d::new(-10.0, 20.0),
            Point2d::new(-10.0, 0.0),
        ]
    }

    fn self_crossings(poly: &[Point2d]) -> usize {
        let n = poly.len();
        let mut count = 0;
        for i in 0..n {
            for j in (i + 2)..n {
                if i == 0 && j == n - 1 {
                    continue;
                }
                let r = segment_intersection(poly[i], poly[(i + 1) % n], poly[j], poly[(j + 1) % n]);
                if matches!(r, SegmentIntersection::Crossing(_)) {
                    count += 1;
                }
            }
        }
        count
    }

    fn edge_lengths(snake: &Snake) -> Vec<f64> {
        let poly = snake.as_polygon();
        (0..poly.len())
            .map(|i| poly[i].dist(poly[(i + 1) % poly.len()]))
            .collect()
    }

    #[test]
    fn hourglass_loop_is_removed() {
        let params = SegParams::default();
        let mut snake =
            Snake::from_points(1, &hourglass(), NormalOrientation::Inward).expect("valid ring");
        assert_eq!(self_crossings(&snake.as_polygon()), 1);

        let cuts = cut_intersects(&mut snake, &params).expect("ring survives");

        assert_eq!(cuts, 1);
        assert_eq!(snake.count(), 6);
        assert!(snake.ring().check_is_head());
        let poly = snake.as_polygon();
        assert_eq!(self_crossings(&poly), 0);
        assert!(poly.iter().any(|p| p.dist(Point2d::new(5.0, 0.0)) < 1e-9));
    }

    /// Two 14-segment lobes joined by diagonals crossing at the origin.
    fn wide_figure_eight() -> Vec<Point2d> {
        let r = 90f64.sqrt();
        let (start, end) = (3f64.atan2(-9.0), 3f64.atan2(9.0));
        let right = (0..14).map(|i| {
            let t = start - 2.0 * start / 13.0 * i as f64;
            Point2d::new(12.0 + r * t.cos(), r * t.sin())
        });
        let left = (0..14).map(|i| {
            let t = end + (std::f64::consts::TAU - 2.0 * end) / 13.0 * i as f64;
            Point2d::new(-12.0 + r * t.cos(), r * t.sin())
        });
        let mut pts: Vec<Point2d> = right.chain(left).collect();
        // Start on the left lobe's last node so segment 0 is a diagonal.
        pts.rotate_right(1);
        pts
    }

    #[test]
    fn cut_intersects_handles_six_node_bowtie() {
        let params = SegParams::default();
        let bowtie = [
            Point2d::new(0.0, 0.0),
            Point2d::new(5.0, 0.0),
            Point2d::new(10.0, 10.0),
            Point2d::new(10.0, 0.0),
            Point2d::new(5.0, 10.0),
            Point2d::new(0.0, 10.0),
        ];
        let mut snake = Snake::from_points(1, &bowtie, NormalOrientation::Inward).expect("valid ring");
        assert_eq!(self_crossings(&snake.as_polygon()), 1);

        let cuts = cut_intersects(&mut snake, &params).expect("ring survives");

        assert_eq!(cuts, 1);
        assert_eq!(snake.count(), 5);
        let poly = snake.as_polygon();
        assert_eq!(self_crossings(&poly), 0);
        assert!(poly.iter().any(|p| p.dist(Point2d::new(7.5, 5.0)) < 1e-9));
    }

    #[test]
    fn wide_loop_is_left_to_cut_intersects() {
        let params = SegParams::default();
        let pts = wide_figure_eight();
        assert_eq!(pts.len(), 28);
        let mut snake = Snake::from_points(1, &pts, NormalOrientation::Inward).expect("valid ring");
        assert_eq!(self_crossings(&snake.as_polygon()), 1);

        assert_eq!(cut_loops(&mut snake, &params).expect("ring survives"), 0);
        assert_eq!(snake.count(), 28);

        assert_eq!(cut_intersects(&mut snake, &params).expect("ring survives"), 1);
        assert_eq!(snake.count(), 15);
        let poly = snake.as_polygon();
        assert_eq!(self_crossings(&poly), 0);
        assert!(poly.iter().any(|p| p.dist(Point2d::new(0.0, 0.0)) < 1e-9));
    }

    #[test]
    fn cut_loops_handles_small_figure_eight() {
        let params = SegParams::default();
        let mut snake =
            Snake::from_points(1, &hourglass(), NormalOrientation::Inward).expect("valid ring");

        let cuts = cut_loops(&mut snake, &params).expect("ring survives");

        assert_eq!(cuts, 1);
        assert_eq!(self_crossings(&snake.as_polygon()), 0);
    }

    #[test]
    fn cut_intersects_is_idempotent_on_simple_rings() {
        let params = SegParams::default();
        let pts = circle(40, Point2d::new(0.0, 0.0), 30.0);
        let mut snake = Snake::from_points(1, &pts, NormalOrientation::Inward).expect("valid ring");

        assert_eq!(cut_intersects(&mut snake, &params).expect("ring survives"), 0);
        assert_eq!(cut_loops(&mut snake, &params).expect("ring survives"), 0);
        assert_eq!(snake.as_polygon(), pts);
    }

    #[test]
    fn cut_velocity_has_a_floor() {
        let params = SegParams::default();
        let mut snake =
            Snake::from_points(1, &hourglass(), NormalOrientation::Inward).expect("valid ring");
        cut_intersects(&mut snake, &params).expect("ring survives");

        let (_, v) = snake
            .ring()
            .iter()
            .find(|(_, v)| v.point().dist(Point2d::new(5.0, 0.0)) < 1e-9)
            .expect("spliced node");
        assert!(v.value().velocity.norm() >= 1.5 * params.vel_crit - 1e-12);
        assert!(!v.value().frozen);
    }

    #[test]
    fn resample_restores_spacing_band() {
        let params = SegParams::default();
        let c = Point2d::new(0.0, 0.0);
        let mut pts = circle(31, c, 40.0);
        // Near-duplicate after node 5, and a double-length gap at node 20.
        let dup = pts[5] + (pts[6] - pts[5]).normalize();
        pts.remove(20);
        pts.insert(6, dup);

        for seed in 0..8 {
            let mut snake = Snake::from_points(1, &pts, NormalOrientation::Inward).expect("valid ring");
            let mut rng = SmallRng::seed_from_u64(seed);
            resample(&mut snake, &params, false, &mut rng).expect("ring survives");

            assert!(snake.ring().check_is_head());
            for len in edge_lengths(&snake) {
                assert!(
                    len >= params.min_dist() - 1e-9 && len <= params.max_dist() + 1e-9,
                    "seed {seed}: edge {len}"
                );
            }
        }
    }

    #[test]
    fn crowded_node_moves_to_neighbour_midpoint() {
        let params = SegParams::default();
        // The head sits 3.6 px from (0, 0) while its other neighbour is 14 px
        // further along the x axis; every other edge is in band.
        let pts = [
            Point2d::new(2.0, 3.0),
            Point2d::new(14.0, 0.0),
            Point2d::new(14.0, -9.0),
            Point2d::new(7.0, -9.0),
            Point2d::new(0.0, -9.0),
            Point2d::new(0.0, 0.0),
        ];

        for seed in 0..4 {
            let mut snake = Snake::from_points(1, &pts, NormalOrientation::Inward).expect("valid ring");
            let head = snake.ring().head();
            let mut rng = SmallRng::seed_from_u64(seed);
            resample(&mut snake, &params, false, &mut rng).expect("ring survives");

            assert_eq!(snake.count(), 6, "seed {seed}");
            let p = snake.ring().point(head);
            assert!(p.dist(Point2d::new(7.0, 0.0)) < 1e-12, "seed {seed}: {p:?}");
        }
    }

    #[test]
    fn resample_shift_bends_new_nodes_towards_the_arc() {
        let params = SegParams::default();
        let c = Point2d::new(0.0, 0.0);
        let mut pts = circle(32, c, 40.0);
        let gap_at = pts.remove(10);

        let inserted_radius = |shift: bool| {
            let mut snake =
                Snake::from_points(1, &pts, NormalOrientation::Inward).expect("valid ring");
            let mut rng = SmallRng::seed_from_u64(3);
            resample(&mut snake, &params, shift, &mut rng).expect("ring survives");
            assert_eq!(snake.count(), 32);

            let poly = snake.as_polygon();
            let nearest = poly
                .iter()
                .min_by(|a, b| a.dist(gap_at).total_cmp(&b.dist(gap_at)))
                .copied()
                .expect("non-empty");
            nearest.dist(c)
        };

        let plain = inserted_radius(false);
        let shifted = inserted_radius(true);
        assert!(shifted > plain, "{shifted} <= {plain}");
        assert!(shifted < 40.0);
    }

    #[test]
    fn resample_reports_collapse() {
        let params = SegParams::default();
        let tiny = [
            Point2d::new(0.0, 0.0),
            Point2d::new(1.0, 0.0),
            Point2d::new(0.0, 1.0),
        ];
        let mut snake = Snake::from_points(1, &tiny, NormalOrientation::Inward).expect("valid ring");
        let mut rng = SmallRng::seed_from_u64(0);

        let err = resample(&mut snake, &params, false, &mut rng).expect_err("cannot shrink");
        assert_eq!(err, SnakeError::TooFewNodes { count: 3 });
        assert_eq!(snake.count(), 3);
    }

    #[test]
    fn resample_is_deterministic_for_a_seed() {
        let params = SegParams::default();
        let pts = circle(50, Point2d::new(0.0, 0.0), 30.0);
        let run = |seed: u64| {
            let mut snake = Snake::from_points(1, &pts, NormalOrientation::Inward).expect("valid ring");
            let mut rng = SmallRng::seed_from_u64(seed);
            resample(&mut snake, &params, true, &mut rng).expect("ring survives");
            snake.as_polygon()
        };
        assert_eq!(run(17), run(17));
    }
}
