//! Bakers turn a [`Space`]'s oriented volume into a classified [`VoxelGrid`].
//!
//! Both bakers sample a world-aligned lattice covering the shape's world AABB, build an inside bitmap, and run the same
//! distance-transform shell extraction over it. The output grid is always `world_aligned`, even when the source space is
//! rotated.

mod noise;
mod shell;

pub use noise::{stable_hash, ValueNoise};
pub use shell::{distance_transform, extract_shell, UNREACHED};

use crate::grid::{GridError, VoxelGrid, WorldLattice};
use crate::space::{Space, SpaceError, SpaceType};

use barrow_core::glam::{DVec3, IVec3};
use barrow_core::transform::SpaceTransform;
use ndshape::Shape;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BakeOptions {
    /// Shell depth in voxels; at least 1.
    pub wall_thickness: u32,
    /// Use the procedural ovoid baker even for non-cavern spaces.
    pub ovoid: bool,
    /// Noise strength for ovoid caverns, in `[0, 1]`.
    pub roughness: f64,
    /// Timestamp recorded on the baked grid. Supplied by the host; the engine has no clock.
    pub baked_at: Option<u64>,
}

impl Default for BakeOptions {
    fn default() -> Self {
        Self {
            wall_thickness: 1,
            ovoid: false,
            roughness: 0.5,
            baked_at: None,
        }
    }
}

impl BakeOptions {
    pub fn validate(&self) -> Result<(), BakeError> {
        if self.wall_thickness < 1 {
            return Err(BakeError::InvalidWallThickness(self.wall_thickness));
        }
        if !(0.0..=1.0).contains(&self.roughness) {
            return Err(BakeError::InvalidRoughness(self.roughness));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BakeError {
    #[error(transparent)]
    Space(#[from] SpaceError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("wall thickness must be at least 1, got {0}")]
    InvalidWallThickness(u32),
    #[error("roughness must be within [0, 1], got {0}")]
    InvalidRoughness(f64),
    #[error("no space with id {0:?}")]
    UnknownSpace(String),
}

/// Which baker [`bake_space`] picks: the ovoid for caverns or when requested, the hollow box otherwise.
pub fn uses_ovoid(space: &Space, options: &BakeOptions) -> bool {
    options.ovoid || space.kind == SpaceType::Cavern
}

pub fn bake_space(space: &Space, options: &BakeOptions) -> Result<VoxelGrid, BakeError> {
    if uses_ovoid(space, options) {
        bake_cavern_ovoid(space, options)
    } else {
        bake_hollow_container(space, options)
    }
}

/// Bakes the space's oriented box into a hollow shell of `wall_thickness` voxels.
pub fn bake_hollow_container(space: &Space, options: &BakeOptions) -> Result<VoxelGrid, BakeError> {
    space.validate()?;
    options.validate()?;

    let half = space.half_extents();
    bake_shell(space, options, |local| local.abs().cmple(half).all())
}

/// Bakes a rough ellipsoidal cavern inscribed in the space's box.
///
/// The shape is a pure function of the space id, its geometry, and `options`; rebaking reproduces it bit for bit.
pub fn bake_cavern_ovoid(space: &Space, options: &BakeOptions) -> Result<VoxelGrid, BakeError> {
    space.validate()?;
    options.validate()?;

    let ovoid = Ovoid::new(space, options);
    bake_shell(space, options, |local| ovoid.contains(local))
}

fn bake_shell(
    space: &Space,
    options: &BakeOptions,
    inside_local: impl Fn(DVec3) -> bool,
) -> Result<VoxelGrid, BakeError> {
    let tfm = space.transform();
    let lattice = WorldLattice::covering(&space.world_aabb(), space.res);
    let inside = sample_inside(&lattice, &tfm, inside_local);

    let header = lattice.header()?;
    let voxels = extract_shell(&inside, lattice.size, options.wall_thickness);
    let mut grid = VoxelGrid::from_voxels(header, voxels)?;
    grid.set_wall_thickness(options.wall_thickness);
    grid.set_source(Some(space.id.clone()));
    grid.set_baked_at(options.baked_at);

    log::debug!(
        "Baked {:?} into {:?} grid; histogram = {:?}",
        space.id,
        lattice.size,
        grid.histogram()
    );

    Ok(grid)
}

fn sample_inside(
    lattice: &WorldLattice,
    tfm: &SpaceTransform,
    inside_local: impl Fn(DVec3) -> bool,
) -> Vec<bool> {
    let shape = lattice.shape();
    (0..shape.size())
        .map(|i| {
            let [x, y, z] = shape.delinearize(i);
            let world = lattice.cell_center_world(IVec3::new(x as i32, y as i32, z as i32));
            inside_local(tfm.to_local(world))
        })
        .collect()
}

/// Inside test for the procedural cavern, in the space's local frame.
struct Ovoid {
    radii: DVec3,
    noise: ValueNoise,
    amplitude: f64,
}

impl Ovoid {
    /// Base noise amplitude at full roughness, as a fraction of the radius.
    const MAX_AMPLITUDE: f64 = 0.25;

    fn new(space: &Space, options: &BakeOptions) -> Self {
        let half = space.half_extents();
        let margin = f64::from(options.wall_thickness) * space.res;
        let radii = (half - DVec3::splat(margin)).max(DVec3::splat(space.res));

        Self {
            radii,
            noise: ValueNoise::new(stable_hash(&space.id)),
            amplitude: Self::MAX_AMPLITUDE * options.roughness * footprint_roughness_scale(space),
        }
    }

    fn contains(&self, local: DVec3) -> bool {
        let q = local / self.radii;
        let d = q.length();
        let allowance = 1.0 + self.amplitude * self.noise.two_octaves(q);
        d <= allowance
    }
}

/// Noise scale by footprint aspect (X over Z): damped for near-square plans, growing with elongation up to 1.4.
fn footprint_roughness_scale(space: &Space) -> f64 {
    let w = f64::from(space.size.x);
    let d = f64::from(space.size.z);
    let aspect = w.max(d) / w.min(d);
    if aspect < 1.15 {
        0.6
    } else {
        (0.8 + 0.2 * (aspect - 1.0)).min(1.4)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;
    use crate::grid::GridSize;
    use crate::voxel::VoxelType;

    use std::f64::consts::FRAC_PI_4;

    fn cube(id: &str, n: u32) -> Space {
        Space::new(id, SpaceType::Room, DVec3::ZERO, GridSize::splat(n), 1.0)
    }

    fn shell_options(wall_thickness: u32) -> BakeOptions {
        BakeOptions {
            wall_thickness,
            ..Default::default()
        }
    }

    #[test]
    fn hollow_box_has_one_voxel_shell() {
        let grid = bake_hollow_container(&cube("box", 10), &shell_options(1)).unwrap();

        assert_eq!(grid.size(), GridSize::splat(10));
        assert!(grid.world_aligned());
        assert_eq!(grid.source(), Some("box"));
        assert_eq!(grid.count(VoxelType::Empty), 512);
        assert_eq!(grid.count(VoxelType::Wall), 1000 - 512);
        assert_eq!(grid.count(VoxelType::Uninstantiated), 0);
        assert_eq!(grid.get(IVec3::new(0, 5, 5)), Some(VoxelType::Wall));
        assert_eq!(grid.get(IVec3::new(1, 5, 5)), Some(VoxelType::Empty));
        assert!(grid.has_rock());
    }

    #[test]
    fn shell_respects_wall_thickness_bound() {
        let t = 3;
        let grid = bake_hollow_container(&cube("box", 12), &shell_options(t)).unwrap();
        let inside: Vec<bool> = grid
            .voxels()
            .iter()
            .map(|&v| v != VoxelType::Uninstantiated)
            .collect();
        let distance = distance_transform(&inside, grid.size(), u32::MAX);

        for (v, d) in grid.voxels().iter().zip(distance) {
            match v {
                VoxelType::Wall => assert!((1..=t).contains(&d)),
                VoxelType::Empty => assert!(d > t),
                _ => {}
            }
        }
        assert_eq!(grid.count(VoxelType::Empty), 6 * 6 * 6);
    }

    #[test]
    fn thickness_exceeding_half_width_makes_solid_shell() {
        let grid = bake_hollow_container(&cube("box", 4), &shell_options(5)).unwrap();
        assert_eq!(grid.count(VoxelType::Wall), 64);
        assert_eq!(grid.count(VoxelType::Empty), 0);
    }

    #[test]
    fn rotated_box_covers_its_world_aabb() {
        let space = cube("tilted", 8).with_rotation(DVec3::new(0.0, FRAC_PI_4, 0.0));
        let grid = bake_hollow_container(&space, &shell_options(1)).unwrap();

        // 8 * sqrt(2) = 11.3 rounds up to 12 cells across.
        assert_eq!(grid.size(), GridSize::new(12, 8, 12));
        assert!(grid.world_aligned());
        // Corners of the world AABB are outside of the rotated box.
        assert_eq!(grid.get(IVec3::new(0, 4, 0)), Some(VoxelType::Uninstantiated));
        // The center is deep inside.
        assert_eq!(grid.get(IVec3::new(6, 4, 6)), Some(VoxelType::Empty));
    }

    #[test]
    fn invalid_inputs_are_rejected_before_baking() {
        let mut flat = cube("flat", 4);
        flat.size.z = 0;
        assert!(matches!(
            bake_hollow_container(&flat, &shell_options(1)),
            Err(BakeError::Space(SpaceError::InvalidSize { axis: 'z', .. }))
        ));

        assert_eq!(
            bake_hollow_container(&cube("box", 4), &shell_options(0)),
            Err(BakeError::InvalidWallThickness(0))
        );

        let rough = BakeOptions {
            roughness: 1.5,
            ..Default::default()
        };
        assert_eq!(
            bake_cavern_ovoid(&cube("box", 4), &rough),
            Err(BakeError::InvalidRoughness(1.5))
        );
    }

    #[test]
    fn ovoid_is_deterministic() {
        let space = Space::new("grotto", SpaceType::Cavern, DVec3::new(3.0, 1.0, -2.0), GridSize::new(20, 12, 14), 0.5)
            .with_rotation(DVec3::new(0.1, 0.7, 0.0));
        let options = BakeOptions {
            wall_thickness: 2,
            roughness: 0.8,
            ..Default::default()
        };

        let a = bake_cavern_ovoid(&space, &options).unwrap();
        let b = bake_cavern_ovoid(&space, &options).unwrap();
        assert_eq!(a, b);
        assert!(a.count(VoxelType::Wall) > 0);
        assert!(a.count(VoxelType::Empty) > 0);
    }

    #[test]
    fn ovoid_depends_on_id() {
        let options = BakeOptions {
            roughness: 1.0,
            ..Default::default()
        };
        let a = Space::new("grotto-a", SpaceType::Cavern, DVec3::ZERO, GridSize::new(24, 16, 24), 1.0);
        let b = Space { id: "grotto-b".to_string(), ..a.clone() };

        let ga = bake_cavern_ovoid(&a, &options).unwrap();
        let gb = bake_cavern_ovoid(&b, &options).unwrap();
        assert_eq!(ga.size(), gb.size());
        assert_ne!(ga.voxels(), gb.voxels());
    }

    #[test]
    fn smooth_ovoid_is_an_ellipsoid_shell() {
        let space = Space::new("egg", SpaceType::Cavern, DVec3::ZERO, GridSize::new(16, 10, 16), 1.0);
        let options = BakeOptions {
            roughness: 0.0,
            ..Default::default()
        };
        let grid = bake_cavern_ovoid(&space, &options).unwrap();

        // Box corners are outside of the ellipsoid, the center is hollow.
        assert_eq!(grid.get(IVec3::ZERO), Some(VoxelType::Uninstantiated));
        assert_eq!(grid.get(IVec3::new(8, 5, 8)), Some(VoxelType::Empty));
        // Radii are 7 x 4 x 7 for a 1 voxel margin, so the second cell in from the box edge is on the shell.
        assert_eq!(grid.get(IVec3::new(1, 5, 8)), Some(VoxelType::Wall));
        assert_eq!(grid.get(IVec3::new(0, 5, 8)), Some(VoxelType::Uninstantiated));
    }

    #[test]
    fn bake_space_dispatches_on_type() {
        let cavern = Space::new("c", SpaceType::Cavern, DVec3::ZERO, GridSize::splat(10), 1.0);
        let room = Space { kind: SpaceType::Room, ..cavern.clone() };

        let options = BakeOptions::default();
        assert!(uses_ovoid(&cavern, &options));
        assert!(!uses_ovoid(&room, &options));
        assert_eq!(bake_space(&room, &options).unwrap().count(VoxelType::Uninstantiated), 0);
        assert!(bake_space(&cavern, &options).unwrap().count(VoxelType::Uninstantiated) > 0);
    }
}
