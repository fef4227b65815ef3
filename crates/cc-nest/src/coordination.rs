use std::collections::HashMap;

use cc_core::{Point2d, dist_point_to_segment};
use cc_ring::{ClosedPointList, VertexKey};
use cc_snake::{ContourNode, SegParams, Snake, SnakeError};
use log::{debug, trace};

use crate::Nest;

/// Outward step of one loosening pass.
pub const LOOSEN_STEP: f64 = 0.1;

/// Radius, in units of `node_res`, of the circle snakes collapse to in
/// expanding mode. Used instead of a fixed 4 px radius, whose 8 nodes sit
/// closer than `min_dist` and would be thinned on the first resample; at
/// 1.5 `node_res` their spacing stays inside the resampling band.
pub const IMPLODE_RADIUS_FACTOR: f64 = 1.5;

/// Blows every snake active in `frame` outward by `blowup` in steps of
/// [`LOOSEN_STEP`], without letting neighbouring snakes come closer than
/// `prox_freeze`. All nodes are unfrozen afterwards.
pub fn loosen(nest: &mut Nest, frame: usize, params: &SegParams) {
    let mut snakes = nest.live_snakes_mut(frame);
    if snakes.is_empty() {
        return;
    }

    let steps = (params.blowup / LOOSEN_STEP).round() as usize;
    let mut held = 0;
    for _ in 0..steps {
        freeze_proximity(&mut snakes, params);

        let before: Vec<HashMap<VertexKey, Point2d>> = snakes
            .iter()
            .map(|s| s.ring().iter().map(|(k, v)| (k, v.point())).collect())
            .collect();

        for s in snakes.iter_mut() {
            s.scale(-LOOSEN_STEP);
        }
        held += hold_apart(&mut snakes, &before, params);
    }

    for s in snakes.iter_mut() {
        s.unfreeze_all();
    }
    debug!(
        "frame {frame}: loosened {} snakes by {}, {held} node moves held back",
        snakes.len(),
        params.blowup
    );
}

/// Collapses every snake active in `frame` to a small outward-facing circle
/// at its centroid. Returns the ids of snakes that could not be rebuilt.
pub fn implode(nest: &mut Nest, frame: usize, params: &SegParams) -> Vec<(u64, SnakeError)> {
    let radius = IMPLODE_RADIUS_FACTOR * params.node_res;
    let mut failed = Vec::new();
    let mut snakes = nest.live_snakes_mut(frame);
    for s in snakes.iter_mut() {
        if let Err(e) = s.implode(radius) {
            failed.push((s.id(), e));
        }
    }
    debug!("frame {frame}: imploded {} snakes", snakes.len() - failed.len());
    failed
}

/// Freezes every node lying within `prox_freeze` of another snake whose
/// centroid is within `proximity`.
pub fn freeze_proximity(snakes: &mut [&mut Snake], params: &SegParams) {
    let mut to_freeze: Vec<(usize, VertexKey)> = Vec::new();

    for (i, j) in close_pairs(snakes, params) {
        for (a, b) in [(i, j), (j, i)] {
            let other = snakes[b].as_polygon();
            for (k, v) in snakes[a].ring().iter() {
                if !v.value().frozen && dist_to_ring(v.point(), &other) < params.prox_freeze {
                    to_freeze.push((a, k));
                }
            }
        }
    }

    for (idx, key) in to_freeze {
        snakes[idx].freeze(key);
    }
}

/// Reverts and freezes moved nodes until no node is within `prox_freeze`
/// of a neighbouring ring. Returns the number of reverted nodes.
fn hold_apart(
    snakes: &mut [&mut Snake],
    before: &[HashMap<VertexKey, Point2d>],
    params: &SegParams,
) -> usize {
    let moved = |snakes: &[&mut Snake], idx: usize, key: VertexKey| {
        before[idx]
            .get(&key)
            .is_some_and(|&p| p != snakes[idx].point(key))
    };

    let mut total = 0;
    loop {
        let mut revert: Vec<(usize, VertexKey)> = Vec::new();

        for (i, j) in close_pairs(snakes, params) {
            for (a, b) in [(i, j), (j, i)] {
                let other = snakes[b].ring();
                for (k, v) in snakes[a].ring().iter() {
                    let p = v.point();
                    let Some((s0, s1, d)) = nearest_segment(p, other) else {
                        continue;
                    };
                    if d >= params.prox_freeze {
                        continue;
                    }
                    if moved(snakes, a, k) {
                        revert.push((a, k));
                    }
                    for end in [s0, s1] {
                        if moved(snakes, b, end) {
                            revert.push((b, end));
                        }
                    }
                }
            }
        }

        if revert.is_empty() {
            break;
        }
        revert.sort_unstable();
        revert.dedup();

        for &(idx, key) in &revert {
            if let Some(&p) = before[idx].get(&key) {
                snakes[idx].set_point(key, p);
                snakes[idx].freeze(key);
            }
        }
        total += revert.len();
        trace!("held back {} nodes", revert.len());
    }

    if total > 0 {
        for s in snakes.iter_mut() {
            s.update_normals();
        }
    }
    total
}

fn close_pairs(snakes: &[&mut Snake], params: &SegParams) -> Vec<(usize, usize)> {
    let centroids: Vec<Point2d> = snakes.iter().map(|s| s.centroid()).collect();
    let mut pairs = Vec::new();
    for i in 0..snakes.len() {
        for j in (i + 1)..snakes.len() {
            if centroids[i].dist(centroids[j]) <= params.proximity {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

fn dist_to_ring(p: Point2d, ring: &[Point2d]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| dist_point_to_segment(p, ring[i], ring[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

fn nearest_segment(
    p: Point2d,
    ring: &ClosedPointList<ContourNode>,
) -> Option<(VertexKey, VertexKey, f64)> {
    ring.iter()
        .map(|(k, v)| {
            let next = v.next();
            (k, next, dist_point_to_segment(p, v.point(), ring.point(next)))
        })
        .min_by(|a, b| a.2.total_cmp(&b.2))
}
