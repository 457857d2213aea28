use crate::voxel::VoxelType;

use barrow_core::geometry::Aabb;
use barrow_core::glam::{DVec3, IVec3};
use barrow_core::ilattice::prelude::Extent;
use barrow_core::transform::SpaceTransform;
use ndshape::{RuntimeShape, Shape};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Integer dimensions of a voxel grid.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct GridSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridSize {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(n: u32) -> Self {
        Self::new(n, n, n)
    }

    pub fn to_array(self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn as_ivec3(self) -> IVec3 {
        IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }

    pub fn as_dvec3(self) -> DVec3 {
        DVec3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    /// Cell count, or `None` when it doesn't fit in `usize`.
    pub fn checked_volume(self) -> Option<usize> {
        (self.x as usize)
            .checked_mul(self.y as usize)?
            .checked_mul(self.z as usize)
    }

    /// Cell count, saturating at `usize::MAX`. Sizes accepted by [`GridHeader::new`] never saturate.
    pub fn volume(self) -> usize {
        self.checked_volume().unwrap_or(usize::MAX)
    }

    pub fn is_degenerate(self) -> bool {
        self.x == 0 || self.y == 0 || self.z == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("grid shape mismatch: {left:?} at res {left_res} vs {right:?} at res {right_res}")]
    ShapeMismatch {
        left: GridSize,
        left_res: f64,
        right: GridSize,
        right_res: f64,
    },
    #[error("voxel data has {actual} values; grid dimensions require {expected}")]
    DataLength { expected: usize, actual: usize },
    #[error("grid dimensions must be at least 1 on every axis, got {0:?}")]
    DegenerateSize(GridSize),
    #[error("voxel resolution must be positive and finite, got {0}")]
    InvalidRes(f64),
    #[error("grid dimensions {0:?} exceed u32::MAX cells")]
    TooLarge(GridSize),
}

/// Largest cell count a grid may have. Linear indices are `u32`.
pub const MAX_GRID_VOLUME: usize = u32::MAX as usize;

/// Everything about a [`VoxelGrid`] except the voxel values themselves.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridHeader {
    /// Edge length of one voxel in world units.
    pub res: f64,
    pub size: GridSize,
    /// When set, the grid is never rotated by its owning space's rotation.
    #[serde(default)]
    pub world_aligned: bool,
    #[serde(default)]
    pub wall_thickness: u32,
    #[serde(default)]
    pub has_rock: bool,
    /// Id of the space that baked (or absorbed) this grid. A label, not a reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baked_at: Option<u64>,
}

impl GridHeader {
    pub fn new(size: GridSize, res: f64) -> Result<Self, GridError> {
        if size.is_degenerate() {
            return Err(GridError::DegenerateSize(size));
        }
        if !matches!(size.checked_volume(), Some(v) if v <= MAX_GRID_VOLUME) {
            return Err(GridError::TooLarge(size));
        }
        if !(res.is_finite() && res > 0.0) {
            return Err(GridError::InvalidRes(res));
        }
        Ok(Self {
            res,
            size,
            world_aligned: false,
            wall_thickness: 0,
            has_rock: false,
            source: None,
            baked_at: None,
        })
    }

    pub fn shape(&self) -> RuntimeShape<u32, 3> {
        RuntimeShape::<u32, 3>::new(self.size.to_array())
    }

    /// Half of the grid's world-space extent on each axis.
    pub fn half_extents(&self) -> DVec3 {
        self.size.as_dvec3() * (0.5 * self.res)
    }

    /// Center of cell `p` relative to the grid center, in world units (before any rotation).
    #[inline]
    pub fn cell_center_local(&self, p: IVec3) -> DVec3 {
        (p.as_dvec3() + 0.5 - self.size.as_dvec3() * 0.5) * self.res
    }

    /// Continuous voxel coordinates of a grid-centered local point; the grid spans `[0, size)` on each axis.
    #[inline]
    pub fn local_to_voxel(&self, local: DVec3) -> DVec3 {
        local / self.res + self.size.as_dvec3() * 0.5
    }

    /// The cell containing `local`, if it lies within the grid.
    #[inline]
    pub fn cell_at_local(&self, local: DVec3) -> Option<IVec3> {
        let v = self.local_to_voxel(local).floor();
        if !v.is_finite() {
            return None;
        }
        let p = v.as_ivec3();
        self.contains_cell(p).then(|| p)
    }

    #[inline]
    pub fn contains_cell(&self, p: IVec3) -> bool {
        let s = self.size.as_ivec3();
        p.x >= 0 && p.y >= 0 && p.z >= 0 && p.x < s.x && p.y < s.y && p.z < s.z
    }

    /// Every cell of the grid, as an extent at the origin.
    pub fn extent(&self) -> Extent<IVec3> {
        Extent::from_min_and_shape(IVec3::ZERO, self.size.as_ivec3())
    }
}

/// A dense 3D array of [`VoxelType`] plus placement metadata.
///
/// Linear index of `(x, y, z)` is `x + nx * (y + ny * z)`. The data length always equals `nx * ny * nz`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "GridRecord<Vec<VoxelType>>")]
pub struct VoxelGrid {
    #[serde(flatten)]
    header: GridHeader,
    data: Vec<VoxelType>,
}

/// Serialized form of a grid header with some representation of the voxel values.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GridRecord<D> {
    #[serde(flatten)]
    pub header: GridHeader,
    pub data: D,
}

impl TryFrom<GridRecord<Vec<VoxelType>>> for VoxelGrid {
    type Error = GridError;

    fn try_from(record: GridRecord<Vec<VoxelType>>) -> Result<Self, Self::Error> {
        Self::from_voxels(record.header, record.data)
    }
}

impl VoxelGrid {
    pub fn new(size: GridSize, res: f64, fill: VoxelType) -> Result<Self, GridError> {
        let header = GridHeader::new(size, res)?;
        let data = vec![fill; size.volume()];
        let mut grid = Self { header, data };
        grid.refresh_has_rock();
        Ok(grid)
    }

    /// Adopts `data` as the voxel values for `header`. `has_rock` is recomputed.
    pub fn from_voxels(header: GridHeader, data: Vec<VoxelType>) -> Result<Self, GridError> {
        GridHeader::new(header.size, header.res)?;
        let expected = header.size.volume();
        if data.len() != expected {
            return Err(GridError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        let mut grid = Self { header, data };
        grid.refresh_has_rock();
        Ok(grid)
    }

    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    pub fn size(&self) -> GridSize {
        self.header.size
    }

    pub fn res(&self) -> f64 {
        self.header.res
    }

    pub fn has_rock(&self) -> bool {
        self.header.has_rock
    }

    pub fn world_aligned(&self) -> bool {
        self.header.world_aligned
    }

    pub fn source(&self) -> Option<&str> {
        self.header.source.as_deref()
    }

    pub fn set_world_aligned(&mut self, world_aligned: bool) {
        self.header.world_aligned = world_aligned;
    }

    pub fn set_wall_thickness(&mut self, wall_thickness: u32) {
        self.header.wall_thickness = wall_thickness;
    }

    pub fn set_source(&mut self, source: Option<String>) {
        self.header.source = source;
    }

    pub fn set_baked_at(&mut self, baked_at: Option<u64>) {
        self.header.baked_at = baked_at;
    }

    pub fn voxels(&self) -> &[VoxelType] {
        &self.data
    }

    #[inline]
    pub fn linearize(&self, p: IVec3) -> usize {
        self.header
            .shape()
            .linearize([p.x as u32, p.y as u32, p.z as u32]) as usize
    }

    #[inline]
    pub fn get(&self, p: IVec3) -> Option<VoxelType> {
        self.header
            .contains_cell(p)
            .then(|| self.data[self.linearize(p)])
    }

    /// The voxel under a world point, where `tfm` places this grid in the world.
    pub fn sample_world(&self, tfm: &SpaceTransform, world: DVec3) -> Option<VoxelType> {
        self.header
            .cell_at_local(tfm.to_local(world))
            .map(|p| self.data[self.linearize(p)])
    }

    /// Writes one voxel. Returns `false` if `p` is outside of the grid.
    pub fn set(&mut self, p: IVec3, value: VoxelType) -> bool {
        if !self.header.contains_cell(p) {
            return false;
        }
        let i = self.linearize(p);
        self.data[i] = value;
        if value.is_solid() {
            self.header.has_rock = true;
        } else {
            self.refresh_has_rock();
        }
        true
    }

    pub fn fill(&mut self, value: VoxelType) {
        self.data.iter_mut().for_each(|v| *v = value);
        self.header.has_rock = value.is_solid();
    }

    /// Overwrites every voxel in `extent`, clipped to the grid.
    pub fn fill_extent(&mut self, extent: Extent<IVec3>, value: VoxelType) {
        let clipped = extent.intersection(&self.header.extent());
        if clipped.is_empty() {
            return;
        }
        let shape = self.header.shape();
        for p in clipped.iter3() {
            let i = shape.linearize([p.x as u32, p.y as u32, p.z as u32]) as usize;
            self.data[i] = value;
        }
        self.refresh_has_rock();
    }

    /// Mutates all voxels in place; `has_rock` is recomputed afterwards.
    pub fn edit(&mut self, f: impl FnOnce(&mut [VoxelType])) {
        f(&mut self.data);
        self.refresh_has_rock();
    }

    pub fn count(&self, value: VoxelType) -> usize {
        self.data.iter().filter(|&&v| v == value).count()
    }

    /// Number of `Rock` or `Wall` cells.
    pub fn occupied_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_solid()).count()
    }

    /// Counts indexed by voxel type discriminant.
    pub fn histogram(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for &v in self.data.iter() {
            counts[v as usize] += 1;
        }
        counts
    }

    pub fn refresh_has_rock(&mut self) {
        self.header.has_rock = self.data.iter().any(|v| v.is_solid());
    }

    /// Cell-by-cell [`VoxelType::merge`] of `other` into `self`. Both grids must have the same size and resolution.
    pub fn merge_same_shape(&mut self, other: &VoxelGrid) -> Result<(), GridError> {
        if self.header.size != other.header.size || self.header.res != other.header.res {
            return Err(GridError::ShapeMismatch {
                left: self.header.size,
                left_res: self.header.res,
                right: other.header.size,
                right_res: other.header.res,
            });
        }
        for (a, b) in self.data.iter_mut().zip(other.data.iter()) {
            *a = a.merge(*b);
        }
        self.refresh_has_rock();
        Ok(())
    }
}

/// A world-aligned lattice of cells covering some world-space box, used as the working grid of bakers and merges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldLattice {
    /// World position of the lattice's minimum corner.
    pub min: DVec3,
    pub size: GridSize,
    pub res: f64,
}

impl WorldLattice {
    /// Number of cells covering `extent` at `res`, never less than 1 per axis. The lattice is centered on the box.
    pub fn covering(aabb: &Aabb, res: f64) -> Self {
        // Forgive floating point error just above an integer number of cells.
        let cells = |len: f64| ((len / res) - 1e-9).ceil().max(1.0) as u32;
        let extent = aabb.size();
        let size = GridSize::new(cells(extent.x), cells(extent.y), cells(extent.z));
        let min = aabb.center() - size.as_dvec3() * (0.5 * res);
        Self { min, size, res }
    }

    pub fn center(&self) -> DVec3 {
        self.min + self.size.as_dvec3() * (0.5 * self.res)
    }

    #[inline]
    pub fn cell_center_world(&self, p: IVec3) -> DVec3 {
        self.min + (p.as_dvec3() + 0.5) * self.res
    }

    pub fn shape(&self) -> RuntimeShape<u32, 3> {
        RuntimeShape::<u32, 3>::new(self.size.to_array())
    }

    /// A world-aligned header for a grid sampled on this lattice.
    pub fn header(&self) -> Result<GridHeader, GridError> {
        let mut header = GridHeader::new(self.size, self.res)?;
        header.world_aligned = true;
        Ok(header)
    }
}

/// Visits the 6-connected neighbors of `p`; `None` for neighbors that fall outside of `size`.
#[inline]
pub(crate) fn visit_face_neighbors(
    shape: &RuntimeShape<u32, 3>,
    size: GridSize,
    p: [u32; 3],
    mut visitor: impl FnMut(Option<usize>),
) {
    let dims = size.to_array();
    for axis in 0..3 {
        for forward in [false, true] {
            let mut q = p;
            if forward {
                if q[axis] + 1 >= dims[axis] {
                    visitor(None);
                    continue;
                }
                q[axis] += 1;
            } else {
                if q[axis] == 0 {
                    visitor(None);
                    continue;
                }
                q[axis] -= 1;
            }
            visitor(Some(shape.linearize(q) as usize));
        }
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

    use barrow_core::approx::assert_relative_eq;

    #[test]
    fn linear_index_is_x_fastest() {
        let grid = VoxelGrid::new(GridSize::new(3, 4, 5), 1.0, VoxelType::Empty).unwrap();
        assert_eq!(grid.linearize(IVec3::new(1, 0, 0)), 1);
        assert_eq!(grid.linearize(IVec3::new(0, 1, 0)), 3);
        assert_eq!(grid.linearize(IVec3::new(0, 0, 1)), 12);
        assert_eq!(grid.linearize(IVec3::new(2, 3, 4)), 2 + 3 * (3 + 4 * 4));
        assert_eq!(grid.voxels().len(), 60);
    }

    #[test]
    fn sample_world_through_placement() {
        let mut grid = VoxelGrid::new(GridSize::new(4, 2, 2), 0.5, VoxelType::Empty).unwrap();
        grid.set(IVec3::new(3, 1, 0), VoxelType::Wall);
        let tfm = SpaceTransform::translation(DVec3::new(10.0, 0.0, 0.0));

        // Cell (3, 1, 0) spans x in [10.5, 11], y in [0, 0.5], z in [-0.5, 0].
        assert_eq!(grid.sample_world(&tfm, DVec3::new(10.75, 0.25, -0.25)), Some(VoxelType::Wall));
        assert_eq!(grid.sample_world(&tfm, DVec3::new(9.25, 0.25, -0.25)), Some(VoxelType::Empty));
        assert_eq!(grid.sample_world(&tfm, DVec3::new(11.25, 0.25, -0.25)), None);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert_eq!(
            VoxelGrid::new(GridSize::new(0, 1, 1), 1.0, VoxelType::Empty),
            Err(GridError::DegenerateSize(GridSize::new(0, 1, 1)))
        );
        assert_eq!(
            VoxelGrid::new(GridSize::splat(1), 0.0, VoxelType::Empty),
            Err(GridError::InvalidRes(0.0))
        );
        let header = GridHeader::new(GridSize::splat(2), 1.0).unwrap();
        assert_eq!(
            VoxelGrid::from_voxels(header, vec![VoxelType::Rock; 7]),
            Err(GridError::DataLength {
                expected: 8,
                actual: 7
            })
        );
        let huge = GridSize::new(1 << 16, 1 << 16, 2);
        assert_eq!(huge.checked_volume(), Some(1 << 33));
        assert_eq!(GridHeader::new(huge, 1.0), Err(GridError::TooLarge(huge)));
        let widest = GridSize::new(u32::MAX, 1, 1);
        assert!(GridHeader::new(widest, 1.0).is_ok());
        assert_eq!(GridSize::splat(u32::MAX).checked_volume(), None);
    }

    #[test]
    fn bulk_edits_track_has_rock() {
        let mut grid = VoxelGrid::new(GridSize::splat(4), 0.5, VoxelType::Empty).unwrap();
        assert!(!grid.header.has_rock);

        grid.fill_extent(
            Extent::from_min_and_shape(IVec3::new(2, 2, 2), IVec3::splat(5)),
            VoxelType::Rock,
        );
        assert!(grid.header.has_rock);
        assert_eq!(grid.count(VoxelType::Rock), 8);
        assert_eq!(grid.get(IVec3::new(3, 3, 3)), Some(VoxelType::Rock));
        assert_eq!(grid.get(IVec3::new(4, 3, 3)), None);

        grid.fill(VoxelType::Uninstantiated);
        assert!(!grid.header.has_rock);
        assert!(grid.set(IVec3::ZERO, VoxelType::Wall));
        assert!(grid.header.has_rock);
        assert!(grid.set(IVec3::ZERO, VoxelType::Empty));
        assert!(!grid.header.has_rock);
        assert_eq!(grid.histogram(), [63, 1, 0, 0]);

        grid.edit(|voxels| voxels[..10].fill(VoxelType::Rock));
        assert!(grid.header.has_rock);
        assert_eq!(grid.histogram(), [54, 0, 10, 0]);
    }

    #[test]
    fn merge_same_shape_applies_pairwise_rule() {
        let mut a = VoxelGrid::new(GridSize::splat(2), 1.0, VoxelType::Rock).unwrap();
        let mut b = VoxelGrid::new(GridSize::splat(2), 1.0, VoxelType::Uninstantiated).unwrap();
        b.set(IVec3::ZERO, VoxelType::Empty);
        b.set(IVec3::X, VoxelType::Wall);

        a.merge_same_shape(&b).unwrap();
        assert_eq!(a.get(IVec3::ZERO), Some(VoxelType::Empty));
        assert_eq!(a.get(IVec3::X), Some(VoxelType::Wall));
        assert_eq!(a.count(VoxelType::Rock), 6);
        assert!(a.header.has_rock);
    }

    #[test]
    fn merge_same_shape_rejects_mismatch() {
        let mut a = VoxelGrid::new(GridSize::splat(2), 1.0, VoxelType::Rock).unwrap();
        let b = VoxelGrid::new(GridSize::splat(2), 0.5, VoxelType::Rock).unwrap();
        let c = VoxelGrid::new(GridSize::new(2, 2, 3), 1.0, VoxelType::Rock).unwrap();

        assert!(matches!(a.merge_same_shape(&b), Err(GridError::ShapeMismatch { .. })));
        assert!(matches!(a.merge_same_shape(&c), Err(GridError::ShapeMismatch { .. })));
        assert_eq!(a.count(VoxelType::Rock), 8);
    }

    #[test]
    fn local_coordinates_are_grid_centered() {
        let header = GridHeader::new(GridSize::new(4, 2, 2), 0.5).unwrap();
        let c = header.cell_center_local(IVec3::ZERO);
        assert_relative_eq!(c.x, -0.75);
        assert_relative_eq!(c.y, -0.25);

        assert_eq!(header.cell_at_local(DVec3::new(-0.9, 0.1, 0.1)), Some(IVec3::new(0, 1, 1)));
        assert_eq!(header.cell_at_local(DVec3::new(1.01, 0.0, 0.0)), None);
    }

    #[test]
    fn lattice_covers_box() {
        let aabb = Aabb::from_min_max(DVec3::new(-2.5, -2.5, -2.5), DVec3::new(5.5, 2.5, 2.5));
        let lattice = WorldLattice::covering(&aabb, 1.0);
        assert_eq!(lattice.size, GridSize::new(8, 5, 5));
        assert_relative_eq!(lattice.center().x, 1.5);
        assert_relative_eq!(lattice.cell_center_world(IVec3::ZERO).x, -2.0);
    }
}
