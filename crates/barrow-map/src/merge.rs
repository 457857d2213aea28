//! Merging of overlapping spaces into one world-aligned occupancy grid.
//!
//! A merge starts from a seed space and pulls in every space whose world AABB touches the growing union, transitively.
//! The union is resampled on a single lattice at the finest participating resolution, and any cell claimed by any
//! participant is occupied. Occupied cells become `Rock`, except those on the boundary of the occupied set, which become
//! `Wall`.
//!
//! Planning ([`plan_merge`]) only reads the spaces; the document is changed in one step by [`Barrow::apply_merge`]. The
//! occupancy pass runs in chunks of [`MergeOptions::chunk_size`] cells, and a [`MergeObserver`] sees progress and can
//! cancel between chunks. [`MergeTask`] runs the same plan on a background thread.

mod sampling;
mod task;

pub use sampling::{inscribed_radius, Participant, RotationModel};
pub use task::{CancelToken, MergeEvent, MergeTask};

use crate::bake::{distance_transform, UNREACHED};
use crate::barrow::Barrow;
use crate::grid::{GridError, VoxelGrid, WorldLattice};
use crate::space::{Space, SpaceError, SpaceType};
use crate::voxel::VoxelType;

use barrow_core::geometry::Aabb;
use barrow_core::glam::{DVec3, IVec3};
use float_ord::FloatOrd;
use ndshape::Shape;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MergeOptions {
    /// Number of cells sampled between two yield points.
    pub chunk_size: usize,
    /// Timestamp recorded on the merged grid.
    pub baked_at: Option<u64>,
    /// Emit per-sample, per-layer, and participant box events to the observer.
    pub debug: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            baked_at: None,
            debug: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum MergeError {
    #[error("merge was cancelled")]
    Cancelled,
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("space {id:?}: {source}")]
    Space { id: String, source: SpaceError },
    #[error("merge task panicked")]
    TaskPanicked,
    #[error("space {0:?} is no longer in the document")]
    StaleDocument(String),
}

/// Hooks into a running merge. Every method has a no-op default.
///
/// Observers only watch. Nothing they do changes the resulting grid, except that cancelling ends the merge with
/// [`MergeError::Cancelled`].
pub trait MergeObserver {
    /// The world corners of a participant's oriented box. Debug only.
    fn on_participant_box(&mut self, _id: &str, _corners: &[DVec3; 8]) {}

    /// `done` of `total` cells have been sampled. Called at every chunk boundary.
    fn on_progress(&mut self, _done: usize, _total: usize) {}

    /// A sampled cell center and whether it was claimed. Debug only.
    fn on_sample(&mut self, _world: DVec3, _occupied: bool) {}

    /// Number of occupied cells in layer `y` of the merged grid. Debug only.
    fn on_layer(&mut self, _y: u32, _occupied: usize) {}

    /// Checked at every chunk boundary.
    fn should_cancel(&self) -> bool {
        false
    }

    /// Called at every chunk boundary, after progress is reported.
    fn yield_now(&mut self) {}
}

/// Observes nothing. Used by the synchronous merge.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl MergeObserver for NoopObserver {}

/// Everything needed to apply a merge to the document.
#[derive(Clone, Debug, PartialEq)]
pub struct MergePlan {
    /// The surviving space. It becomes a [`SpaceType::Carddon`] owning `grid`.
    pub kept_id: String,
    /// Every other participant, in discovery order.
    pub removed_ids: Vec<String>,
    /// Center of the union AABB, the new origin of the kept space.
    pub origin: DVec3,
    pub grid: VoxelGrid,
    /// Whether the yaw-only retry produced this grid.
    pub used_yaw_fallback: bool,
}

impl MergePlan {
    /// All participant ids, the kept one first.
    pub fn participant_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.kept_id.as_str()).chain(self.removed_ids.iter().map(String::as_str))
    }
}

/// Merges the seed's overlap group in place and returns the kept id. `Ok(None)` when `seed_id` is unknown or nothing in
/// the group is occupied; the document is untouched in both cases.
pub fn merge_overlapping(
    barrow: &mut Barrow,
    seed_id: &str,
    options: &MergeOptions,
) -> Result<Option<String>, MergeError> {
    merge_overlapping_with(barrow, seed_id, options, &mut NoopObserver)
}

/// [`merge_overlapping`], reporting to `observer` between chunks.
pub fn merge_overlapping_with(
    barrow: &mut Barrow,
    seed_id: &str,
    options: &MergeOptions,
    observer: &mut impl MergeObserver,
) -> Result<Option<String>, MergeError> {
    match plan_merge(barrow.spaces(), seed_id, options, observer)? {
        Some(plan) => barrow.apply_merge(plan).map(Some),
        None => Ok(None),
    }
}

/// Computes the merge of `seed_id`'s overlap group without touching `spaces`.
pub fn plan_merge(
    spaces: &[Space],
    seed_id: &str,
    options: &MergeOptions,
    observer: &mut impl MergeObserver,
) -> Result<Option<MergePlan>, MergeError> {
    let seed = match spaces.iter().position(|s| s.id == seed_id) {
        Some(i) => i,
        None => {
            log::debug!("Merge seed {:?} not found", seed_id);
            return Ok(None);
        }
    };

    let (picked, union) = overlap_group(spaces, seed);
    let participants: SmallVec<[&Space; 8]> = picked.iter().map(|&i| &spaces[i]).collect();
    for space in participants.iter() {
        space.validate().map_err(|source| MergeError::Space {
            id: space.id.clone(),
            source,
        })?;
    }

    let keeper = choose_keeper(&participants, &spaces[seed]);
    let res = merged_res(&participants, keeper);
    let lattice = WorldLattice::covering(&union, res);
    let header = lattice.header()?;

    log::debug!(
        "Merging {} spaces into {:?} at res {}; lattice {:?}",
        participants.len(),
        keeper.id,
        res,
        lattice.size
    );

    if options.debug {
        for space in participants.iter() {
            observer.on_participant_box(&space.id, &space.oriented_box().corners());
        }
    }

    let mut used_yaw_fallback = false;
    let mut occupied = sample_occupancy(&lattice, &participants, RotationModel::Euler, options, observer)?;
    if !occupied.iter().any(|&o| o) {
        log::warn!(
            "Merge of {:?} found no occupied cells; retrying with yaw-only rotations",
            keeper.id
        );
        used_yaw_fallback = true;
        occupied = sample_occupancy(&lattice, &participants, RotationModel::YawOnly, options, observer)?;
        if !occupied.iter().any(|&o| o) {
            log::warn!("Merge of {:?} found no occupied cells; giving up", keeper.id);
            return Ok(None);
        }
    }

    if options.debug {
        report_layers(&lattice, &occupied, observer);
    }

    let mut grid = VoxelGrid::from_voxels(header, classify_boundary(&occupied, &lattice))?;
    grid.set_wall_thickness(1);
    grid.set_source(Some(keeper.id.clone()));
    grid.set_baked_at(options.baked_at);

    log::debug!(
        "Merged grid {:?}: {} occupied, histogram = {:?}",
        grid.size(),
        grid.occupied_count(),
        grid.histogram()
    );

    Ok(Some(MergePlan {
        kept_id: keeper.id.clone(),
        removed_ids: participants
            .iter()
            .filter(|s| s.id != keeper.id)
            .map(|s| s.id.clone())
            .collect(),
        origin: lattice.center(),
        grid,
        used_yaw_fallback,
    }))
}

/// Transitive closure of world AABB overlap starting from `seed`. Returns indices in discovery order, seed first, along
/// with the union of their boxes.
pub fn overlap_group(spaces: &[Space], seed: usize) -> (SmallVec<[usize; 8]>, Aabb) {
    let boxes: Vec<Aabb> = spaces.iter().map(Space::world_aabb).collect();
    let mut is_picked = vec![false; spaces.len()];
    let mut picked: SmallVec<[usize; 8]> = smallvec![seed];
    is_picked[seed] = true;
    let mut union = boxes[seed];

    loop {
        let mut grew = false;
        for (i, aabb) in boxes.iter().enumerate() {
            if !is_picked[i] && aabb.intersects(&union) {
                is_picked[i] = true;
                picked.push(i);
                union = union.union(aabb);
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }

    (picked, union)
}

/// The first participant whose id has no `-<digits>` suffix, else the seed.
fn choose_keeper<'a>(participants: &[&'a Space], seed: &'a Space) -> &'a Space {
    participants
        .iter()
        .copied()
        .find(|s| !s.has_numeric_suffix())
        .unwrap_or(seed)
}

/// The finest resolution among baked participants, else the keeper's.
fn merged_res(participants: &[&Space], keeper: &Space) -> f64 {
    participants
        .iter()
        .filter_map(|s| s.vox.as_ref().map(|g| FloatOrd(g.res())))
        .min()
        .map_or(keeper.res, |FloatOrd(res)| res)
}

fn sample_occupancy(
    lattice: &WorldLattice,
    spaces: &[&Space],
    model: RotationModel,
    options: &MergeOptions,
    observer: &mut impl MergeObserver,
) -> Result<Vec<bool>, MergeError> {
    let participants: SmallVec<[Participant; 8]> = spaces.iter().map(|s| Participant::new(s, model)).collect();
    let shape = lattice.shape();
    let total = shape.size() as usize;
    let chunk_size = options.chunk_size.max(1);

    let mut occupied = Vec::with_capacity(total);
    let mut start = 0;
    while start < total {
        if observer.should_cancel() {
            return Err(MergeError::Cancelled);
        }
        let end = (start + chunk_size).min(total);
        for i in start..end {
            let [x, y, z] = shape.delinearize(i as u32);
            let world = lattice.cell_center_world(IVec3::new(x as i32, y as i32, z as i32));
            let claimed = participants.iter().any(|p| p.claims(world));
            if options.debug {
                observer.on_sample(world, claimed);
            }
            occupied.push(claimed);
        }
        observer.on_progress(end, total);
        observer.yield_now();
        start = end;
    }

    Ok(occupied)
}

/// Occupied cells with an unoccupied or off-grid face neighbor are `Wall`, other occupied cells are `Rock`.
fn classify_boundary(occupied: &[bool], lattice: &WorldLattice) -> Vec<VoxelType> {
    // Distance 1 is exactly the boundary, so a capped transform is a single-depth pass.
    let distance = distance_transform(occupied, lattice.size, 1);
    occupied
        .iter()
        .zip(distance.iter())
        .map(|(&is_occupied, &d)| match (is_occupied, d) {
            (false, _) => VoxelType::Uninstantiated,
            (true, UNREACHED) => VoxelType::Rock,
            (true, _) => VoxelType::Wall,
        })
        .collect()
}

fn report_layers(lattice: &WorldLattice, occupied: &[bool], observer: &mut impl MergeObserver) {
    let layer_len = lattice.size.x as usize;
    let ny = lattice.size.y as usize;
    let mut counts = vec![0; ny];
    // Rows of X are contiguous and Y cycles fastest among rows.
    for (row, cells) in occupied.chunks(layer_len).enumerate() {
        counts[row % ny] += cells.iter().filter(|&&o| o).count();
    }
    for (y, count) in counts.into_iter().enumerate() {
        observer.on_layer(y as u32, count);
    }
}

impl Barrow {
    /// Applies a merge computed by [`plan_merge`] and returns the kept id.
    ///
    /// Every id in the plan must still be present; otherwise nothing changes and the first missing id is reported.
    pub fn apply_merge(&mut self, plan: MergePlan) -> Result<String, MergeError> {
        if let Some(missing) = plan.participant_ids().find(|id| self.get(id).is_none()) {
            return Err(MergeError::StaleDocument(missing.to_owned()));
        }

        let MergePlan {
            kept_id,
            removed_ids,
            origin,
            grid,
            ..
        } = plan;

        self.remove_all(&removed_ids);
        if let Some(keeper) = self.get_mut(&kept_id) {
            keeper.kind = SpaceType::Carddon;
            keeper.rotation = DVec3::ZERO;
            keeper.origin = origin;
            keeper.size = grid.size();
            keeper.res = grid.res();
            keeper.vox = Some(grid);
        }

        log::info!("Merged {:?} into {:?}", removed_ids, kept_id);

        Ok(kept_id)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
