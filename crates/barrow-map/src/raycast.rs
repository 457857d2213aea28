use crate::grid::VoxelGrid;
use crate::space::Space;
use crate::voxel::VoxelType;

use barrow_core::geometry::{Aabb, Ray};
use barrow_core::glam::{DVec3, IVec3};
use barrow_core::transform::SpaceTransform;
use barrow_core::units::{VoxelUnits, WorldUnits};
use barrow_core::EPSILON;
use serde::{Deserialize, Serialize};

/// The first solid voxel along a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelHit {
    pub ix: u32,
    pub iy: u32,
    pub iz: u32,
    pub value: VoxelType,
    /// Ray parameter at which the ray enters the voxel, in units of the ray's (world-space) velocity.
    pub t: f64,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PickOptions {
    /// Number of layers at the top of the grid that are transparent to picking.
    pub hide_top_layers: u32,
}

impl PickOptions {
    /// Cells with `iy >= y_cut` are skipped. `None` when nothing is hidden.
    pub fn y_cut(&self, grid_height: u32) -> Option<u32> {
        (self.hide_top_layers > 0).then(|| grid_height.saturating_sub(self.hide_top_layers))
    }
}

/// Upper bound on DDA steps through a grid of `size`. A straight line can't visit more than `nx + ny + nz` cells, so this
/// only trips on numerical degeneracies.
pub fn step_guard(grid: &VoxelGrid) -> usize {
    let s = grid.size();
    3 * (s.x as usize + s.y as usize + s.z as usize) + 10
}

impl VoxelGrid {
    /// Visits every cell of the grid that intersects the ray, in order, along with the ray parameter where the ray enters
    /// that cell. Return `false` from `visitor` to stop the traversal.
    ///
    /// `tfm` places the grid in the world; see [`Space::grid_transform`].
    pub fn cast_through_grid(
        &self,
        tfm: &SpaceTransform,
        ray: WorldUnits<Ray>,
        mut visitor: impl FnMut(IVec3, VoxelType, f64) -> bool,
    ) {
        let VoxelUnits(ray) = self.ray_to_voxel_units(tfm, ray);
        let size = self.size().as_dvec3();
        let bounds = Aabb::from_min_max(DVec3::ZERO, size);
        let [t_min, t_max] = match ray.cast_at_aabb(&bounds) {
            Some(window) => window,
            None => return,
        };

        let mut t = t_min.max(0.0);
        let entry = ray.position_at(t);
        let max_cell = self.size().as_ivec3() - IVec3::ONE;
        let mut cell = entry.floor().as_ivec3().clamp(IVec3::ZERO, max_cell);

        let v = ray.velocity();
        let mut step = IVec3::ZERO;
        let mut t_next = DVec3::splat(f64::INFINITY);
        let mut t_delta = DVec3::splat(f64::INFINITY);
        for axis in 0..3 {
            let c = cell[axis] as f64;
            if v[axis] > EPSILON {
                step[axis] = 1;
                t_next[axis] = t + (c + 1.0 - entry[axis]) / v[axis];
                t_delta[axis] = 1.0 / v[axis];
            } else if v[axis] < -EPSILON {
                step[axis] = -1;
                t_next[axis] = t + (c - entry[axis]) / v[axis];
                t_delta[axis] = -1.0 / v[axis];
            }
        }

        let guard = step_guard(self);
        for _ in 0..guard {
            let value = match self.get(cell) {
                Some(value) => value,
                None => return,
            };
            if !visitor(cell, value, t) {
                return;
            }

            let axis = if t_next.x <= t_next.y && t_next.x <= t_next.z {
                0
            } else if t_next.y <= t_next.z {
                1
            } else {
                2
            };
            if !(t_next[axis] <= t_max) {
                return;
            }
            t = t_next[axis];
            cell[axis] += step[axis];
            t_next[axis] += t_delta[axis];
        }

        log::warn!("Grid ray traversal stopped by its step guard ({} steps)", guard);
    }

    /// The first `Rock` or `Wall` voxel along the ray. Cells at or above `y_cut` are skipped without ending the walk.
    pub fn cast_ray(
        &self,
        tfm: &SpaceTransform,
        ray: WorldUnits<Ray>,
        y_cut: Option<u32>,
    ) -> Option<VoxelHit> {
        let mut hit = None;
        self.cast_through_grid(tfm, ray, |p, value, t| {
            let hidden = y_cut.map_or(false, |cut| p.y as u32 >= cut);
            if hidden || !value.is_solid() {
                return true;
            }
            hit = Some(VoxelHit {
                ix: p.x as u32,
                iy: p.y as u32,
                iz: p.z as u32,
                value,
                t,
            });
            false
        });
        hit
    }

    /// Converts a world ray into continuous voxel coordinates of this grid, where the grid spans `[0, size]`. The ray
    /// parameter is preserved.
    fn ray_to_voxel_units(&self, tfm: &SpaceTransform, ray: WorldUnits<Ray>) -> VoxelUnits<Ray> {
        let local = tfm.ray_to_local(ray);
        let header = self.header();
        VoxelUnits(Ray::new(
            header.local_to_voxel(local.start),
            local.velocity() / header.res,
        ))
    }
}

/// Picks the first solid voxel of `space`'s grid along a world-space ray. `None` if the space isn't baked or nothing is hit.
pub fn pick_space(space: &Space, ray: WorldUnits<Ray>, options: &PickOptions) -> Option<VoxelHit> {
    let grid = space.vox.as_ref()?;
    let tfm = space.grid_transform(grid);
    grid.cast_ray(&tfm, ray, options.y_cut(grid.size().y))
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
