use cc_core::{Bounds2d, Point2d, Vec2d};
use log::trace;
use rand::Rng;
use slotmap::{SlotMap, new_key_type};

use crate::RingError;

/// Smallest cycle a ring may shrink to.
pub const MIN_RING_LEN: usize = 3;

new_key_type! {
    /// Stable handle to a ring vertex.
    pub struct VertexKey;
}

/// Payload stored in a ring slot.
pub trait RingPoint {
    fn point(&self) -> Point2d;

    fn set_point(&mut self, p: Point2d);

    /// Frozen payloads are skipped by [`ClosedPointList::scale`].
    fn is_frozen(&self) -> bool {
        false
    }
}

impl RingPoint for Point2d {
    fn point(&self) -> Point2d {
        *self
    }

    fn set_point(&mut self, p: Point2d) {
        *self = p;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            Self::Forward
        } else {
            Self::Backward
        }
    }
}

/// Which side of the contour the stored normals point to.
///
/// `Inward` is used while a contour contracts onto a cell; `Outward` while a
/// seed grows from inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalOrientation {
    #[default]
    Inward,
    Outward,
}

impl NormalOrientation {
    pub fn sign(self) -> f64 {
        match self {
            Self::Inward => 1.0,
            Self::Outward => -1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Vertex<T> {
    value: T,
    normal: Vec2d,
    tangent: Vec2d,
    track_id: u64,
    position: f64,
    prev: VertexKey,
    next: VertexKey,
}

impl<T> Vertex<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Unit normal as of the last normal update.
    pub fn normal(&self) -> Vec2d {
        self.normal
    }

    pub fn tangent(&self) -> Vec2d {
        self.tangent
    }

    /// Identifier unique within the owning ring's lifetime.
    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    /// Perimeter-normalised position in `[0, 1)` from the head, as of the last
    /// [`ClosedPointList::update_positions`].
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn prev(&self) -> VertexKey {
        self.prev
    }

    pub fn next(&self) -> VertexKey {
        self.next
    }
}

impl<T: RingPoint> Vertex<T> {
    pub fn point(&self) -> Point2d {
        self.value.point()
    }
}

/// Doubly-linked closed ring stored in a generational arena.
///
/// Accessors taking a [`VertexKey`] panic when the key is stale, like slice
/// indexing; editing operations report stale keys as [`RingError::StaleKey`].
#[derive(Debug, Clone)]
pub struct ClosedPointList<T> {
    slots: SlotMap<VertexKey, Vertex<T>>,
    head: VertexKey,
    next_track_id: u64,
    orientation: NormalOrientation,
}

impl<T> ClosedPointList<T> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn head(&self) -> VertexKey {
        self.head
    }

    pub fn contains(&self, key: VertexKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn orientation(&self) -> NormalOrientation {
        self.orientation
    }

    pub fn get(&self, key: VertexKey) -> Option<&Vertex<T>> {
        self.slots.get(key)
    }

    /// Like [`Self::value_mut`]: normals are not refreshed.
    pub fn get_mut(&mut self, key: VertexKey) -> Option<&mut Vertex<T>> {
        self.slots.get_mut(key)
    }

    pub fn value(&self, key: VertexKey) -> &T {
        &self.slots[key].value
    }

    /// Mutable payload access. Geometry changes made here do not refresh
    /// normals; call [`ClosedPointList::update_normal`] afterwards.
    pub fn value_mut(&mut self, key: VertexKey) -> &mut T {
        &mut self.slots[key].value
    }

    pub fn next(&self, key: VertexKey) -> VertexKey {
        self.slots[key].next
    }

    pub fn prev(&self, key: VertexKey) -> VertexKey {
        self.slots[key].prev
    }

    pub fn step(&self, key: VertexKey, direction: Direction) -> VertexKey {
        match direction {
            Direction::Forward => self.next(key),
            Direction::Backward => self.prev(key),
        }
    }

    /// Visits every vertex once, starting at the head, following `next`.
    pub fn iter(&self) -> Iter<'_, T> {
        self.iter_dir(Direction::Forward)
    }

    pub fn iter_dir(&self, direction: Direction) -> Iter<'_, T> {
        Iter {
            ring: self,
            cursor: self.head,
            remaining: self.slots.len(),
            direction,
        }
    }

    /// Snapshot of keys in traversal order from the head.
    pub fn keys(&self) -> Vec<VertexKey> {
        self.iter().map(|(k, _)| k).collect()
    }

    /// Payloads in unspecified order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.values_mut().map(|v| &mut v.value)
    }

    /// Swaps `next` and `prev` on every vertex.
    pub fn reverse(&mut self) {
        for v in self.slots.values_mut() {
            core::mem::swap(&mut v.prev, &mut v.next);
        }
    }

    /// Walks the cycle from the head and checks link symmetry, that the head
    /// is met again after exactly `len()` steps and never before.
    pub fn check_is_head(&self) -> bool {
        if !self.slots.contains_key(self.head) {
            return false;
        }

        let n = self.slots.len();
        let mut key = self.head;
        for i in 0..n {
            let Some(v) = self.slots.get(key) else {
                return false;
            };
            if self.slots.get(v.next).map(|nv| nv.prev) != Some(key) {
                return false;
            }
            key = v.next;
            if key == self.head && i + 1 != n {
                return false;
            }
        }
        key == self.head
    }

    fn fresh_track_id(&mut self) -> u64 {
        let id = self.next_track_id;
        self.next_track_id += 1;
        id
    }
}

impl<T: RingPoint> ClosedPointList<T> {
    /// Builds a ring in iteration order; the first value becomes the head.
    pub fn from_values<I: IntoIterator<Item = T>>(values: I) -> Result<Self, RingError> {
        Self::from_values_oriented(values, NormalOrientation::Inward)
    }

    pub fn from_values_oriented<I: IntoIterator<Item = T>>(
        values: I,
        orientation: NormalOrientation,
    ) -> Result<Self, RingError> {
        let values: Vec<T> = values.into_iter().collect();
        if values.len() < MIN_RING_LEN {
            return Err(RingError::TooFewNodes {
                count: values.len(),
            });
        }

        let n = values.len();
        let mut slots = SlotMap::with_capacity_and_key(n);
        let mut keys = Vec::with_capacity(n);
        for (i, value) in values.into_iter().enumerate() {
            keys.push(slots.insert(Vertex {
                value,
                normal: Vec2d::default(),
                tangent: Vec2d::default(),
                track_id: i as u64,
                position: 0.0,
                prev: VertexKey::default(),
                next: VertexKey::default(),
            }));
        }

        for (i, &key) in keys.iter().enumerate() {
            let v = &mut slots[key];
            v.prev = keys[(i + n - 1) % n];
            v.next = keys[(i + 1) % n];
        }

        let mut ring = Self {
            slots,
            head: keys[0],
            next_track_id: n as u64,
            orientation,
        };
        ring.update_normals();
        Ok(ring)
    }

    pub fn point(&self, key: VertexKey) -> Point2d {
        self.slots[key].value.point()
    }

    /// Moves a vertex without refreshing normals.
    pub fn set_point(&mut self, key: VertexKey, p: Point2d) {
        self.slots[key].value.set_point(p);
    }

    pub fn set_orientation(&mut self, orientation: NormalOrientation) {
        self.orientation = orientation;
        self.update_normals();
    }

    /// Splices `value` right after `key`; the new vertex gets a fresh track id.
    pub fn insert_after(&mut self, key: VertexKey, value: T) -> Result<VertexKey, RingError> {
        if !self.slots.contains_key(key) {
            return Err(RingError::StaleKey);
        }

        let next = self.slots[key].next;
        let track_id = self.fresh_track_id();
        let new_key = self.slots.insert(Vertex {
            value,
            normal: Vec2d::default(),
            tangent: Vec2d::default(),
            track_id,
            position: 0.0,
            prev: key,
            next,
        });
        self.slots[key].next = new_key;
        self.slots[next].prev = new_key;

        self.update_normal(new_key);
        Ok(new_key)
    }

    pub fn insert_before(&mut self, key: VertexKey, value: T) -> Result<VertexKey, RingError> {
        if !self.slots.contains_key(key) {
            return Err(RingError::StaleKey);
        }
        let prev = self.slots[key].prev;
        self.insert_after(prev, value)
    }

    /// Unlinks `key`. If it was the head, either neighbour becomes head with
    /// equal probability.
    pub fn remove<R: Rng + ?Sized>(&mut self, key: VertexKey, rng: &mut R) -> Result<T, RingError> {
        if !self.slots.contains_key(key) {
            return Err(RingError::StaleKey);
        }
        if self.slots.len() <= MIN_RING_LEN {
            return Err(RingError::TooFewNodes {
                count: self.slots.len(),
            });
        }

        let (prev, next) = {
            let v = &self.slots[key];
            (v.prev, v.next)
        };
        self.slots[prev].next = next;
        self.slots[next].prev = prev;

        if self.head == key {
            self.head = if rng.random_bool(0.5) { prev } else { next };
        }

        let removed = self.slots.remove(key).ok_or(RingError::StaleKey)?;
        self.update_normal(prev);
        self.update_normal(next);
        Ok(removed.value)
    }

    /// Replaces the open run `(after, through]` with one new vertex.
    ///
    /// Returns the new vertex key and the removed payloads in traversal order.
    /// The head moves to the new vertex if it was inside the run.
    pub fn replace_run(
        &mut self,
        after: VertexKey,
        through: VertexKey,
        value: T,
    ) -> Result<(VertexKey, Vec<T>), RingError> {
        if !self.slots.contains_key(after) || !self.slots.contains_key(through) || after == through
        {
            return Err(RingError::StaleKey);
        }

        let mut run = Vec::new();
        let mut key = self.next(after);
        loop {
            run.push(key);
            if key == through {
                break;
            }
            key = self.next(key);
            if key == after {
                return Err(RingError::StaleKey);
            }
        }

        let len = self.slots.len();
        if len - run.len() + 1 < MIN_RING_LEN {
            return Err(RingError::TooFewNodes { count: len });
        }

        let resume = self.next(through);
        let head_cut = run.contains(&self.head);

        let mut removed = Vec::with_capacity(run.len());
        for k in run {
            if let Some(v) = self.slots.remove(k) {
                removed.push(v.value);
            }
        }

        let track_id = self.fresh_track_id();
        let new_key = self.slots.insert(Vertex {
            value,
            normal: Vec2d::default(),
            tangent: Vec2d::default(),
            track_id,
            position: 0.0,
            prev: after,
            next: resume,
        });
        self.slots[after].next = new_key;
        self.slots[resume].prev = new_key;
        if head_cut {
            self.head = new_key;
        }

        trace!(
            "replaced run of {} vertices, ring now has {}",
            removed.len(),
            self.slots.len()
        );

        self.update_normal(after);
        self.update_normal(new_key);
        self.update_normal(resume);
        Ok((new_key, removed))
    }

    /// Recomputes tangent and normal of one vertex from its neighbours.
    pub fn update_normal(&mut self, key: VertexKey) {
        let (tangent, normal) = self.local_frame(key);
        let v = &mut self.slots[key];
        v.tangent = tangent;
        v.normal = normal;
    }

    pub fn update_normals(&mut self) {
        let frames: Vec<_> = self
            .slots
            .keys()
            .map(|k| (k, self.local_frame(k)))
            .collect();
        for (key, (tangent, normal)) in frames {
            let v = &mut self.slots[key];
            v.tangent = tangent;
            v.normal = normal;
        }
    }

    fn local_frame(&self, key: VertexKey) -> (Vec2d, Vec2d) {
        let v = &self.slots[key];
        let p = v.value.point();
        let tan_l = (p - self.slots[v.prev].value.point()).normalize();
        let tan_r = (self.slots[v.next].value.point() - p).normalize();

        let sum = tan_l + tan_r;
        let tangent = if sum.norm() > 1e-9 {
            sum.normalize()
        } else if tan_l != Vec2d::default() {
            tan_l
        } else {
            tan_r
        };

        (tangent, tangent.perp() * self.orientation.sign())
    }

    /// `Σ (x[i+1] - x[i]) * (y[i+1] + y[i])`, positive for clockwise rings.
    pub fn shoelace_sum(&self) -> f64 {
        self.iter()
            .map(|(_, v)| {
                let a = v.point();
                let b = self.point(v.next);
                (b.x - a.x) * (b.y + a.y)
            })
            .sum()
    }

    /// Signed enclosed area; positive after [`Self::make_anticlockwise`].
    pub fn signed_area(&self) -> f64 {
        -0.5 * self.shoelace_sum()
    }

    /// Reverses the ring if it winds clockwise. Returns whether it reversed.
    pub fn make_anticlockwise(&mut self) -> bool {
        let reversed = self.shoelace_sum() > 0.0;
        if reversed {
            self.reverse();
        }
        self.update_normals();
        reversed
    }

    /// Moves every unfrozen vertex by `step * normal`, then refreshes normals.
    pub fn scale(&mut self, step: f64) {
        for v in self.slots.values_mut() {
            if v.value.is_frozen() {
                continue;
            }
            let p = v.value.point() + v.normal * step;
            v.value.set_point(p);
        }
        self.update_normals();
    }

    /// Points from the head in `next` order.
    pub fn as_polygon(&self) -> Vec<Point2d> {
        self.iter().map(|(_, v)| v.point()).collect()
    }

    pub fn perimeter(&self) -> f64 {
        self.iter()
            .map(|(_, v)| v.point().dist(self.point(v.next)))
            .sum()
    }

    pub fn bounds(&self) -> Option<Bounds2d> {
        Bounds2d::from_points(self.iter().map(|(_, v)| v.point()))
    }

    /// Refreshes each vertex's perimeter-normalised position.
    pub fn update_positions(&mut self) {
        let perimeter = self.perimeter();
        let keys = self.keys();
        let mut acc = 0.0;
        for key in keys {
            let next = self.next(key);
            let step = self.point(key).dist(self.point(next));
            self.slots[key].position = if perimeter > 0.0 { acc / perimeter } else { 0.0 };
            acc += step;
        }
    }
}

pub struct Iter<'a, T> {
    ring: &'a ClosedPointList<T>,
    cursor: VertexKey,
    remaining: usize,
    direction: Direction,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (VertexKey, &'a Vertex<T>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.cursor;
        let v = &self.ring.slots[key];
        self.cursor = match self.direction {
            Direction::Forward => v.next,
            Direction::Backward => v.prev,
        };
        self.remaining -= 1;
        Some((key, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
