use crate::grid::{GridSize, VoxelGrid};

use barrow_core::geometry::{Aabb, OrientedBox};
use barrow_core::glam::DVec3;
use barrow_core::transform::SpaceTransform;
use serde::{Deserialize, Serialize};

/// Advisory subtype of a [`Space`]. Affects the bake shape and the analytic merge test.
///
/// Written in lowercase; the capitalized names hosts use are accepted too.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceType {
    #[serde(alias = "Cavern")]
    Cavern,
    #[serde(alias = "Carddon")]
    Carddon,
    #[serde(alias = "Tunnel")]
    Tunnel,
    #[serde(alias = "Room")]
    Room,
    #[serde(alias = "Space")]
    Space,
}

impl Default for SpaceType {
    fn default() -> Self {
        Self::Space
    }
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum SpaceError {
    #[error("size along {axis} must be at least 1, got {value}")]
    InvalidSize { axis: char, value: u32 },
    #[error("voxel resolution must be positive and finite, got {0}")]
    InvalidRes(f64),
    #[error("origin and rotation must be finite")]
    NonFiniteTransform,
}

/// A named oriented volume in the document. Owns at most one baked [`VoxelGrid`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(from = "SpaceRecord<VoxelGrid>", into = "SpaceRecord<VoxelGrid>")]
pub struct Space {
    pub id: String,
    pub kind: SpaceType,
    /// World-space center.
    pub origin: DVec3,
    /// Extents in voxels.
    pub size: GridSize,
    /// World units per voxel edge.
    pub res: f64,
    /// Euler angles in radians, applied in X, Y, Z order.
    pub rotation: DVec3,
    pub vox: Option<VoxelGrid>,
}

impl Space {
    pub fn new(id: impl Into<String>, kind: SpaceType, origin: DVec3, size: GridSize, res: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            origin,
            size,
            res,
            rotation: DVec3::ZERO,
            vox: None,
        }
    }

    pub fn with_rotation(mut self, rotation: DVec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_vox(mut self, vox: VoxelGrid) -> Self {
        self.vox = Some(vox);
        self
    }

    /// A copy of everything but the grid.
    pub fn without_vox(&self) -> Self {
        Self {
            id: self.id.clone(),
            vox: None,
            ..*self
        }
    }

    /// Rejects geometry that cannot be baked. Nothing is clamped.
    pub fn validate(&self) -> Result<(), SpaceError> {
        for (axis, value) in ['x', 'y', 'z'].into_iter().zip(self.size.to_array()) {
            if value < 1 {
                return Err(SpaceError::InvalidSize { axis, value });
            }
        }
        if !(self.res.is_finite() && self.res > 0.0) {
            return Err(SpaceError::InvalidRes(self.res));
        }
        if !(self.origin.is_finite() && self.rotation.is_finite()) {
            return Err(SpaceError::NonFiniteTransform);
        }
        Ok(())
    }

    pub fn transform(&self) -> SpaceTransform {
        SpaceTransform::from_euler(self.origin, self.rotation)
    }

    /// The transform that places this space's grid in the world. World-aligned grids ignore the space's rotation.
    pub fn grid_transform(&self, grid: &VoxelGrid) -> SpaceTransform {
        if grid.world_aligned() {
            SpaceTransform::translation(self.origin)
        } else {
            self.transform()
        }
    }

    pub fn half_extents(&self) -> DVec3 {
        self.size.as_dvec3() * (0.5 * self.res)
    }

    pub fn oriented_box(&self) -> OrientedBox {
        self.transform().oriented_box(self.half_extents())
    }

    pub fn world_aabb(&self) -> Aabb {
        world_aabb_from_space(self)
    }

    /// Whether `id` ends in `-<digits>`, the naming pattern of copies.
    pub fn has_numeric_suffix(&self) -> bool {
        has_numeric_suffix(&self.id)
    }
}

/// Transforms the 8 corners of the space's oriented box and takes the componentwise min/max.
pub fn world_aabb_from_space(space: &Space) -> Aabb {
    space.oriented_box().world_aabb()
}

pub fn has_numeric_suffix(id: &str) -> bool {
    match id.rsplit_once('-') {
        Some((_, digits)) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
struct Xyz {
    x: f64,
    y: f64,
    z: f64,
}

impl From<DVec3> for Xyz {
    fn from(v: DVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Xyz> for DVec3 {
    fn from(v: Xyz) -> Self {
        DVec3::new(v.x, v.y, v.z)
    }
}

/// Document form of a [`Space`] carrying some representation `V` of its grid. Older documents only carry a yaw angle as
/// `rotY`.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpaceRecord<V> {
    id: String,
    #[serde(rename = "type", default)]
    kind: SpaceType,
    origin: Xyz,
    size: GridSize,
    res: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rotation: Option<Xyz>,
    #[serde(default, skip_serializing)]
    rot_y: Option<f64>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    vox: Option<V>,
}

impl<V> SpaceRecord<V> {
    /// Splits into a space without a grid, and the grid representation.
    pub(crate) fn split(self) -> (Space, Option<V>) {
        let rotation = match (self.rotation, self.rot_y) {
            (Some(r), _) => r.into(),
            (None, Some(yaw)) => DVec3::new(0.0, yaw, 0.0),
            (None, None) => DVec3::ZERO,
        };
        let space = Space {
            id: self.id,
            kind: self.kind,
            origin: self.origin.into(),
            size: self.size,
            res: self.res,
            rotation,
            vox: None,
        };
        (space, self.vox)
    }

    /// The inverse of [`split`](Self::split). Any grid left on `space` is dropped in favor of `vox`.
    pub(crate) fn join(space: Space, vox: Option<V>) -> Self {
        Self {
            id: space.id,
            kind: space.kind,
            origin: space.origin.into(),
            size: space.size,
            res: space.res,
            rotation: Some(space.rotation.into()),
            rot_y: None,
            vox,
        }
    }
}

impl From<SpaceRecord<VoxelGrid>> for Space {
    fn from(record: SpaceRecord<VoxelGrid>) -> Self {
        let (space, vox) = record.split();
        Self { vox, ..space }
    }
}

impl From<Space> for SpaceRecord<VoxelGrid> {
    fn from(mut space: Space) -> Self {
        let vox = space.vox.take();
        Self::join(space, vox)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
