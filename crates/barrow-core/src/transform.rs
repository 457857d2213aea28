use crate::geometry::{Aabb, OrientedBox, Ray};
use crate::glam::{DQuat, DVec3};
use crate::units::WorldUnits;

/// A rigid transform (rotation about `origin`, then translation to `origin`) between world space and the local frame of a
/// space.
///
/// Euler angles are applied in intrinsic X, Y, Z order, i.e. `R = Rx * Ry * Rz`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpaceTransform {
    origin: DVec3,
    rotation: DQuat,
    inverse_rotation: DQuat,
}

impl SpaceTransform {
    pub fn new(origin: DVec3, rotation: DQuat) -> Self {
        let rotation = rotation.normalize();
        Self {
            origin,
            rotation,
            inverse_rotation: rotation.inverse(),
        }
    }

    pub fn from_euler(origin: DVec3, euler: DVec3) -> Self {
        Self::new(origin, euler_xyz(euler))
    }

    pub fn from_yaw(origin: DVec3, yaw: f64) -> Self {
        Self::new(origin, DQuat::from_rotation_y(yaw))
    }

    /// A pure translation; used for grids that stay axis-aligned to the world.
    pub fn translation(origin: DVec3) -> Self {
        Self {
            origin,
            rotation: DQuat::IDENTITY,
            inverse_rotation: DQuat::IDENTITY,
        }
    }

    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    pub fn rotation(&self) -> DQuat {
        self.rotation
    }

    /// Subtract the origin, then apply the inverse rotation.
    #[inline]
    pub fn to_local(&self, world: DVec3) -> DVec3 {
        self.inverse_rotation * (world - self.origin)
    }

    /// Apply the rotation, then add the origin.
    #[inline]
    pub fn to_world(&self, local: DVec3) -> DVec3 {
        self.rotation * local + self.origin
    }

    /// Rotation only, for directions.
    #[inline]
    pub fn transform_normal(&self, local_dir: DVec3) -> DVec3 {
        self.rotation * local_dir
    }

    #[inline]
    pub fn inverse_transform_normal(&self, world_dir: DVec3) -> DVec3 {
        self.inverse_rotation * world_dir
    }

    pub fn ray_to_local(&self, ray: WorldUnits<Ray>) -> Ray {
        let WorldUnits(ray) = ray;
        Ray::new(
            self.to_local(ray.start),
            self.inverse_transform_normal(ray.velocity()),
        )
    }

    /// The oriented box with the given half extents centered on this transform's origin.
    pub fn oriented_box(&self, half_extents: DVec3) -> OrientedBox {
        OrientedBox::new(self.origin, half_extents, self.rotation)
    }

    pub fn world_aabb(&self, half_extents: DVec3) -> Aabb {
        self.oriented_box(half_extents).world_aabb()
    }
}

/// Intrinsic X, Y, Z Euler angles (radians) as a quaternion.
pub fn euler_xyz(euler: DVec3) -> DQuat {
    DQuat::from_rotation_x(euler.x) * DQuat::from_rotation_y(euler.y) * DQuat::from_rotation_z(euler.z)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
