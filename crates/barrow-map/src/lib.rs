//! The barrow voxel occupancy engine.
//!
//! # Documents
//!
//! A [`Barrow`] is an ordered collection of [`Space`]s. Each space is a named, oriented box in the world with a voxel
//! resolution, and it may own one baked [`VoxelGrid`]. The engine never reads ambient configuration; every operation takes
//! its options explicitly.
//!
//! # Voxels
//!
//! A [`VoxelGrid`] is a dense array of [`VoxelType`]s: `Uninstantiated` outside of any baked region, `Empty` for known air,
//! `Rock` for solid mass, and `Wall` for the solid shell around air. Values combine with [`VoxelType::merge`], where `Empty`
//! absorbs everything and `Uninstantiated` is the identity.
//!
//! A grid is centered on its owning space's origin. Unless it is `world_aligned`, it also takes the space's rotation.
//!
//! # Operations
//!
//! - [`bake`] turns a space's box (or a rough ellipsoid inscribed in it) into a hollow shell.
//! - [`merge`] unions every space overlapping a seed into one world-aligned grid.
//! - [`raycast`] picks the first solid voxel along a ray.
//! - [`codec`] compresses grids for storage, with RLE or LZ4.

pub mod bake;
pub mod codec;
pub mod merge;
pub mod raycast;

mod barrow;
mod grid;
mod space;
mod voxel;

pub use barrow::*;
pub use grid::*;
pub use space::*;
pub use voxel::*;

pub use bake::{bake_cavern_ovoid, bake_hollow_container, bake_space, BakeError, BakeOptions};
pub use codec::{compress, decompress, Codec, CodecError, StoredGrid};
pub use merge::{merge_overlapping, plan_merge, MergeError, MergeOptions, MergePlan, MergeTask};
pub use raycast::{pick_space, PickOptions, VoxelHit};
