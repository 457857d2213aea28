use crate::glam::{DQuat, DVec3};
use crate::EPSILON;

use itertools::iproduct;

/// An axis-aligned box in world space, stored as its minimum and maximum corners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn from_min_max(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Closed-interval overlap test; boxes that only touch on a face are considered intersecting.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(&self, p: DVec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }
}

/// A box with arbitrary rotation about its center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    pub center: DVec3,
    pub half_extents: DVec3,
    pub rotation: DQuat,
}

impl OrientedBox {
    pub fn new(center: DVec3, half_extents: DVec3, rotation: DQuat) -> Self {
        Self {
            center,
            half_extents,
            rotation,
        }
    }

    /// The 8 world-space corners, ordered with X varying fastest.
    pub fn corners(&self) -> [DVec3; 8] {
        let mut corners = [DVec3::ZERO; 8];
        for (i, (sz, sy, sx)) in iproduct!([-1.0, 1.0], [-1.0, 1.0], [-1.0, 1.0]).enumerate() {
            let local = self.half_extents * DVec3::new(sx, sy, sz);
            corners[i] = self.center + self.rotation * local;
        }
        corners
    }

    /// Componentwise min/max over the rotated corners.
    pub fn world_aabb(&self) -> Aabb {
        let [first, rest @ ..] = self.corners();
        rest.iter().fold(Aabb::from_min_max(first, first), |acc, &p| Aabb {
            min: acc.min.min(p),
            max: acc.max.max(p),
        })
    }

    pub fn contains(&self, p: DVec3) -> bool {
        let local = self.rotation.inverse() * (p - self.center);
        local.abs().cmple(self.half_extents).all()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub start: DVec3,
    velocity: DVec3,
}

impl Ray {
    pub fn new(start: DVec3, velocity: DVec3) -> Self {
        Self { start, velocity }
    }

    pub fn velocity(&self) -> DVec3 {
        self.velocity
    }

    pub fn position_at(&self, t: f64) -> DVec3 {
        self.start + t * self.velocity
    }

    /// True when the velocity is too short to define a direction.
    pub fn is_degenerate(&self) -> bool {
        !self.velocity.is_finite() || self.velocity.length_squared() < EPSILON * EPSILON
    }

    /// If the ray intersects box `aabb`, returns `[tmin, tmax]`, the entrance and exit times of the ray. `tmin` may be
    /// negative when the ray starts inside the box.
    ///
    /// Slab method. Axes with a near-zero velocity component are treated as parallel to their slabs: the ray misses unless
    /// it already lies between them.
    pub fn cast_at_aabb(&self, aabb: &Aabb) -> Option<[f64; 2]> {
        if self.is_degenerate() || !self.start.is_finite() {
            return None;
        }

        let mut tmin = f64::NEG_INFINITY;
        let mut tmax = f64::INFINITY;
        for axis in 0..3 {
            let (s, v) = (self.start[axis], self.velocity[axis]);
            let (lo, hi) = (aabb.min[axis], aabb.max[axis]);
            if v.abs() < EPSILON {
                if s < lo || s > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / v;
            let t1 = (lo - s) * inv;
            let t2 = (hi - s) * inv;
            tmin = tmin.max(t1.min(t2));
            tmax = tmax.min(t1.max(t2));
        }

        (tmax >= tmin.max(0.0)).then(|| [tmin, tmax])
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Sphere {
    pub center: DVec3,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        self.center.distance_squared(p) <= self.radius * self.radius
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
