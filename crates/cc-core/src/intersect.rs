use crate::geom::{Point2d, Vec2d};

/// Tolerance for parallelism and collinearity decisions.
pub const INTERSECT_EPS: f64 = 1e-5;

/// Relation between two closed segments `p1p2` and `p3p4`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentIntersection {
    /// Parallel (or degenerate) and not touching.
    ParallelDisjoint,
    /// Collinear with a shared stretch; carries the midpoint of the overlap.
    Overlapping(Point2d),
    /// The supporting lines cross outside at least one segment.
    Disjoint,
    /// The segments cross at the carried point.
    Crossing(Point2d),
}

impl SegmentIntersection {
    /// Numeric state: `-1` parallel, `-2` overlapping, `0` disjoint, `1` crossing.
    pub fn code(&self) -> i32 {
        match self {
            Self::ParallelDisjoint => -1,
            Self::Overlapping(_) => -2,
            Self::Disjoint => 0,
            Self::Crossing(_) => 1,
        }
    }

    pub fn crossing_point(&self) -> Option<Point2d> {
        match self {
            Self::Crossing(p) => Some(*p),
            _ => None,
        }
    }
}

/// Classifies segments `p1p2` and `p3p4`.
///
/// Parallelism is decided on unit directions so the tolerance does not scale
/// with segment length. Crossing parameters are inclusive: touching at an
/// endpoint counts as a crossing.
pub fn segment_intersection(p1: Point2d, p2: Point2d, p3: Point2d, p4: Point2d) -> SegmentIntersection {
    let d1 = p2 - p1;
    let d2 = p4 - p3;
    let len1 = d1.norm();
    let len2 = d2.norm();

    if len1 < INTERSECT_EPS || len2 < INTERSECT_EPS {
        return degenerate_relation(p1, p2, p3, p4, len1, len2);
    }

    let u1 = d1 * (1.0 / len1);
    let u2 = d2 * (1.0 / len2);

    if u1.cross(u2).abs() < INTERSECT_EPS {
        return parallel_relation(p1, u1, len1, p3, p4);
    }

    let denom = d1.cross(d2);
    let w = p3 - p1;
    let ua = w.cross(d2) / denom;
    let ub = w.cross(d1) / denom;

    if (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub) {
        SegmentIntersection::Crossing(p1 + d1 * ua)
    } else {
        SegmentIntersection::Disjoint
    }
}

fn parallel_relation(p1: Point2d, u1: Vec2d, len1: f64, p3: Point2d, p4: Point2d) -> SegmentIntersection {
    // Offset of the second segment from the first supporting line.
    if u1.cross(p3 - p1).abs() >= INTERSECT_EPS {
        return SegmentIntersection::ParallelDisjoint;
    }

    let t3 = u1.dot(p3 - p1);
    let t4 = u1.dot(p4 - p1);
    let lo = t3.min(t4).max(0.0);
    let hi = t3.max(t4).min(len1);
    if lo > hi + INTERSECT_EPS {
        return SegmentIntersection::ParallelDisjoint;
    }

    SegmentIntersection::Overlapping(p1 + u1 * (0.5 * (lo + hi)))
}

fn degenerate_relation(
    p1: Point2d,
    p2: Point2d,
    p3: Point2d,
    p4: Point2d,
    len1: f64,
    len2: f64,
) -> SegmentIntersection {
    let (point, a, b) = if len1 < INTERSECT_EPS {
        (p1, p3, p4)
    } else {
        debug_assert!(len2 < INTERSECT_EPS);
        (p3, p1, p2)
    };

    if dist_point_to_segment(point, a, b) < INTERSECT_EPS {
        SegmentIntersection::Overlapping(point)
    } else {
        SegmentIntersection::ParallelDisjoint
    }
}

/// Euclidean distance from `p` to the closed segment `ab`.
pub fn dist_point_to_segment(p: Point2d, a: Point2d, b: Point2d) -> f64 {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq == 0.0 {
        return p.dist(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.dist(a + ab * t)
}
