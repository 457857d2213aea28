use crate::bake::{self, BakeError, BakeOptions};
use crate::codec::{compress, Codec, CodecError, StoredGrid};
use crate::grid::{GridSize, VoxelGrid};
use crate::merge::{MergeOptions, MergeTask};
use crate::raycast::{pick_space, PickOptions, VoxelHit};
use crate::space::{Space, SpaceRecord, SpaceType};

use barrow_core::geometry::Ray;
use barrow_core::glam::DVec3;
use barrow_core::units::WorldUnits;
use barrow_core::SmallKeyHashSet;
use float_ord::FloatOrd;
use serde::{Deserialize, Serialize};

/// The document: an ordered collection of uniquely named [`Space`]s.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Barrow {
    #[serde(default)]
    spaces: Vec<Space>,
    /// Resolution given to spaces created with [`Barrow::create_space`].
    #[serde(default = "default_res")]
    default_res: f64,
}

fn default_res() -> f64 {
    1.0
}

impl Default for Barrow {
    fn default() -> Self {
        Self::new(default_res())
    }
}

impl Barrow {
    pub fn new(default_res: f64) -> Self {
        Self {
            spaces: Vec::new(),
            default_res,
        }
    }

    pub fn default_res(&self) -> f64 {
        self.default_res
    }

    pub fn spaces(&self) -> &[Space] {
        &self.spaces
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Space> {
        self.spaces.iter()
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Space> {
        self.spaces.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Space> {
        self.spaces.iter_mut().find(|s| s.id == id)
    }

    /// Adds `space`, or replaces the space with the same id in place. Returns the replaced space.
    pub fn insert(&mut self, space: Space) -> Option<Space> {
        self.upsert(space).1
    }

    /// Creates an unbaked space at the document's default resolution, replacing any space with the same id.
    pub fn create_space(
        &mut self,
        id: impl Into<String>,
        kind: SpaceType,
        origin: DVec3,
        size: GridSize,
    ) -> &mut Space {
        let (index, _) = self.upsert(Space::new(id, kind, origin, size, self.default_res));
        &mut self.spaces[index]
    }

    pub fn remove(&mut self, id: &str) -> Option<Space> {
        let index = self.spaces.iter().position(|s| s.id == id)?;
        Some(self.spaces.remove(index))
    }

    pub(crate) fn remove_all(&mut self, ids: &[String]) {
        let ids: SmallKeyHashSet<&str> = ids.iter().map(String::as_str).collect();
        self.spaces.retain(|s| !ids.contains(s.id.as_str()));
    }

    fn upsert(&mut self, space: Space) -> (usize, Option<Space>) {
        match self.spaces.iter().position(|s| s.id == space.id) {
            Some(index) => (index, Some(std::mem::replace(&mut self.spaces[index], space))),
            None => {
                self.spaces.push(space);
                (self.spaces.len() - 1, None)
            }
        }
    }

    /// Bakes the space named `id` and stores the grid on it, replacing any previous grid.
    pub fn bake_space(&mut self, id: &str, options: &BakeOptions) -> Result<&VoxelGrid, BakeError> {
        let space = self
            .get_mut(id)
            .ok_or_else(|| BakeError::UnknownSpace(id.to_owned()))?;
        let grid = bake::bake_space(space, options)?;
        log::info!("Baked {:?}: {:?} grid", id, grid.size());
        Ok(space.vox.insert(grid))
    }

    /// The nearest solid voxel along the ray over every baked space.
    pub fn pick(&self, ray: WorldUnits<Ray>, options: &PickOptions) -> Option<(&Space, VoxelHit)> {
        self.spaces
            .iter()
            .filter_map(|space| pick_space(space, ray, options).map(|hit| (space, hit)))
            .min_by_key(|(_, hit)| FloatOrd(hit.t))
    }

    /// Plans a merge of `seed_id`'s overlap group on a background thread, from a snapshot of the current spaces.
    pub fn spawn_merge(&self, seed_id: &str, options: MergeOptions) -> MergeTask {
        MergeTask::spawn(self.spaces.clone(), seed_id, options)
    }

    /// The storage form of the document, with every grid compressed by `codec`.
    pub fn compress_all(&self, codec: Codec) -> Result<StoredBarrow, CodecError> {
        let spaces = self
            .spaces
            .iter()
            .map(|space| {
                let vox = match space.vox.as_ref() {
                    Some(grid) => Some(StoredGrid::from(compress(grid, codec)?)),
                    None => None,
                };
                Ok(StoredSpace {
                    space: space.without_vox(),
                    vox,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(StoredBarrow {
            spaces,
            default_res: self.default_res,
        })
    }

    /// Loads a stored document, expanding every grid back to the flat form.
    pub fn decompress_all(stored: StoredBarrow) -> Result<Self, CodecError> {
        let spaces = stored
            .spaces
            .into_iter()
            .map(|StoredSpace { space, vox }| {
                let vox = vox.map(StoredGrid::decompress).transpose()?;
                Ok(Space { vox, ..space })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(Self {
            spaces,
            default_res: stored.default_res,
        })
    }
}

/// A [`Barrow`] as saved: grids may be flat or compressed.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBarrow {
    pub spaces: Vec<StoredSpace>,
    #[serde(default = "default_res")]
    pub default_res: f64,
}

/// A [`Space`] as saved. `space.vox` is always `None`; the grid lives in `vox`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(from = "SpaceRecord<StoredGrid>", into = "SpaceRecord<StoredGrid>")]
pub struct StoredSpace {
    pub space: Space,
    pub vox: Option<StoredGrid>,
}

impl From<SpaceRecord<StoredGrid>> for StoredSpace {
    fn from(record: SpaceRecord<StoredGrid>) -> Self {
        let (space, vox) = record.split();
        Self { space, vox }
    }
}

impl From<StoredSpace> for SpaceRecord<StoredGrid> {
    fn from(stored: StoredSpace) -> Self {
        SpaceRecord::join(stored.space, stored.vox)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
