use cc_core::{IntensitySampler, Point2d, Vec2d};
use cc_ring::{ClosedPointList, VertexKey};

use crate::node::ContourNode;
use crate::{SegParams, Snake, SnakeError};

/// Sub-pixel step of the image-force sampling grid.
pub const SAMPLE_STEP: f64 = 0.75;

/// One force-model iteration.
///
/// Forces for every unfrozen node are computed from the current positions
/// first; displacements are applied afterwards, so the result does not
/// depend on traversal order. Returns whether every node is frozen.
pub fn constrict<S>(snake: &mut Snake, sampler: &S, params: &SegParams) -> Result<bool, SnakeError>
where
    S: IntensitySampler + ?Sized,
{
    let dt = params.delta_t;

    let updates: Vec<(VertexKey, ContourNode)> = snake
        .ring()
        .iter()
        .filter(|(_, v)| !v.value().frozen)
        .map(|(key, v)| {
            let mut node = *v.value();
            let force = central_force(snake.ring(), key, params)
                + contraction_force(snake.ring(), key, params)
                + image_force(snake.ring(), key, sampler, params);

            node.total_force = force;
            node.velocity += force * dt;
            node.pending = node.velocity * dt;
            node.velocity *= params.f_friction;
            if node.velocity.norm() < params.vel_crit {
                node.frozen = true;
            }
            (key, node)
        })
        .collect();

    let ring = snake.ring_mut();
    for (key, node) in updates {
        *ring.value_mut(key) = node;
    }

    for node in ring.values_mut() {
        node.point += node.pending;
        node.pending = Vec2d::default();
        if !node.point.is_finite() {
            return Err(SnakeError::NonFinite);
        }
    }
    ring.update_normals();

    snake.recount_frozen();
    Ok(snake.is_converged())
}

pub fn central_force(ring: &ClosedPointList<ContourNode>, key: VertexKey, params: &SegParams) -> Vec2d {
    ring.get(key)
        .map(|v| v.normal() * params.f_central)
        .unwrap_or_default()
}

/// Pulls a node towards the line through its neighbours.
pub fn contraction_force(
    ring: &ClosedPointList<ContourNode>,
    key: VertexKey,
    params: &SegParams,
) -> Vec2d {
    let p = ring.point(key);
    let to_prev = (ring.point(ring.prev(key)) - p).normalize();
    let to_next = (ring.point(ring.next(key)) - p).normalize();
    (to_prev + to_next) * (0.5 * params.f_contract)
}

/// Contrast force from a `sample_tan x sample_norm` rectangle straddling
/// the node.
///
/// Mean intensity on the geometric inside minus the outside, scaled to
/// `[-1, 1]`, is `ΔI`. A brighter inside pushes the node against its normal
/// by `sqrt(ΔI) * f_image`; otherwise the force is zero.
pub fn image_force<S>(
    ring: &ClosedPointList<ContourNode>,
    key: VertexKey,
    sampler: &S,
    params: &SegParams,
) -> Vec2d
where
    S: IntensitySampler + ?Sized,
{
    let Some(v) = ring.get(key) else {
        return Vec2d::default();
    };
    let p = v.point();
    let normal = v.normal();
    let tangent = v.tangent();
    let inside = normal * ring.orientation().sign();

    let kmax = (params.sample_tan / 2.0 / SAMPLE_STEP).round() as i32;
    let lmax = (params.sample_norm / 2.0 / SAMPLE_STEP).round().max(1.0) as i32;

    let probe = |q: Point2d| f64::from(sampler.intensity(q.x.round() as i32, q.y.round() as i32));

    let (mut sum_in, mut sum_out, mut n) = (0.0, 0.0, 0u32);
    for k in -kmax..=kmax {
        let base = p + tangent * (f64::from(k) * SAMPLE_STEP);
        for l in 1..=lmax {
            let off = inside * (f64::from(l) * SAMPLE_STEP);
            sum_in += probe(base + off);
            sum_out += probe(base - off);
            n += 1;
        }
    }

    let delta = (sum_in - sum_out) / f64::from(n) / 255.0;
    if delta > 0.0 {
        -normal * (delta.sqrt() * params.f_image)
    } else {
        Vec2d::default()
    }
}
