use crate::grid::VoxelGrid;
use crate::space::{Space, SpaceType};

use barrow_core::geometry::{OrientedBox, Sphere};
use barrow_core::glam::DVec3;
use barrow_core::transform::SpaceTransform;

/// How a participant's rotation is interpreted while sampling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RotationModel {
    /// The full X, Y, Z Euler rotation.
    Euler,
    /// Only the rotation about Y. Used by the retry pass when the full model finds nothing.
    YawOnly,
}

impl RotationModel {
    pub fn transform(self, space: &Space) -> SpaceTransform {
        match self {
            Self::Euler => space.transform(),
            Self::YawOnly => SpaceTransform::from_yaw(space.origin, space.rotation.y),
        }
    }
}

/// A space as seen by the occupancy pass: its baked grid if it has one, or an analytic shape otherwise.
#[derive(Clone, Debug)]
pub enum Participant<'a> {
    Grid {
        grid: &'a VoxelGrid,
        tfm: SpaceTransform,
    },
    Sphere(Sphere),
    Box(OrientedBox),
}

impl<'a> Participant<'a> {
    pub fn new(space: &'a Space, model: RotationModel) -> Self {
        if let Some(grid) = space.vox.as_ref() {
            let tfm = if grid.world_aligned() {
                SpaceTransform::translation(space.origin)
            } else {
                model.transform(space)
            };
            return Self::Grid { grid, tfm };
        }

        match space.kind {
            SpaceType::Cavern => Self::Sphere(Sphere::new(space.origin, inscribed_radius(space))),
            _ => Self::Box(model.transform(space).oriented_box(space.half_extents())),
        }
    }

    /// Whether this participant claims the world point: a `Rock` or `Wall` voxel, or a point inside the shape.
    #[inline]
    pub fn claims(&self, world: DVec3) -> bool {
        match self {
            Self::Grid { grid, tfm } => grid
                .sample_world(tfm, world)
                .map_or(false, |v| v.is_solid()),
            Self::Sphere(sphere) => sphere.contains_point(world),
            Self::Box(obb) => obb.contains(world),
        }
    }
}

/// Radius of the sphere standing in for an unbaked cavern: half of its smallest extent.
pub fn inscribed_radius(space: &Space) -> f64 {
    let s = space.size;
    0.5 * f64::from(s.x.min(s.y).min(s.z)) * space.res
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
