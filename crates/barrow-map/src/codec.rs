//! Storage encodings for [`VoxelGrid`] data.
//!
//! Grids are stored either flat or with their voxel array replaced by a tagged [`CompressedVoxels`] payload, e.g.
//! `{"codec": "rle", "rle": [value, run, value, run, ...]}`. Every codec round trips exactly.

use crate::grid::{GridError, GridHeader, GridRecord, VoxelGrid};
use crate::voxel::{InvalidVoxelType, VoxelType};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::io::{self, Read, Write};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("run-length payload has an odd number of values ({0})")]
    OddPairCount(usize),
    #[error("run-length pair {pair} has a zero run")]
    ZeroRun { pair: usize },
    #[error(transparent)]
    InvalidVoxel(#[from] InvalidVoxelType),
    #[error("decoded {actual} voxels; grid dimensions require {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("lz4 frame error: {0}")]
    Lz4(#[from] lz4_flex::frame::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Which encoding to use for [`compress`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Rle,
    Lz4,
}

impl Default for Codec {
    fn default() -> Self {
        Self::Rle
    }
}

/// An encoded voxel array, tagged by its codec.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "codec", rename_all = "lowercase")]
pub enum CompressedVoxels {
    Rle { rle: Vec<u32> },
    Lz4 { bytes: Vec<u8> },
}

/// A grid whose voxel array has been replaced by a [`CompressedVoxels`] payload. The header is untouched.
pub type CompressedGrid = GridRecord<CompressedVoxels>;

/// A grid as found in storage: either already flat or compressed.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredGrid {
    Flat(VoxelGrid),
    Compressed(CompressedGrid),
}

impl From<VoxelGrid> for StoredGrid {
    fn from(grid: VoxelGrid) -> Self {
        Self::Flat(grid)
    }
}

impl From<CompressedGrid> for StoredGrid {
    fn from(grid: CompressedGrid) -> Self {
        Self::Compressed(grid)
    }
}

/// Encodes `voxels` as `[value, run, value, run, ...]`. Runs are maximal.
pub fn encode_rle(voxels: &[VoxelType]) -> Vec<u32> {
    let mut pairs = Vec::new();
    let mut iter = voxels.iter().copied();
    let mut current = match iter.next() {
        Some(v) => v,
        None => return pairs,
    };
    let mut run = 1u32;
    for v in iter {
        if v == current && run < u32::MAX {
            run += 1;
        } else {
            pairs.extend_from_slice(&[current.into(), run]);
            current = v;
            run = 1;
        }
    }
    pairs.extend_from_slice(&[current.into(), run]);
    pairs
}

/// Inverse of [`encode_rle`], expecting exactly `expected` voxels. Malformed payloads (odd length, unknown voxel
/// values, zero runs, wrong total) are rejected before anything is expanded.
pub fn decode_rle(pairs: &[u32], expected: usize) -> Result<Vec<VoxelType>, CodecError> {
    if pairs.len() % 2 != 0 {
        return Err(CodecError::OddPairCount(pairs.len()));
    }
    let mut total = 0usize;
    for (i, pair) in pairs.chunks_exact(2).enumerate() {
        VoxelType::try_from(pair[0])?;
        if pair[1] == 0 {
            return Err(CodecError::ZeroRun { pair: i });
        }
        total = total.saturating_add(pair[1] as usize);
    }
    if total != expected {
        return Err(CodecError::LengthMismatch { expected, actual: total });
    }

    let mut voxels = Vec::with_capacity(total);
    for pair in pairs.chunks_exact(2) {
        let value = VoxelType::try_from(pair[0])?;
        voxels.extend(std::iter::repeat(value).take(pair[1] as usize));
    }
    Ok(voxels)
}

fn encode_lz4(voxels: &[VoxelType]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = FrameEncoder::new(Vec::new());
    encoder.write_all(bytemuck::cast_slice(voxels))?;
    Ok(encoder.finish()?)
}

fn decode_lz4(bytes: &[u8], expected: usize) -> Result<Vec<VoxelType>, CodecError> {
    // One byte past the expected length is enough to tell that the frame is too long.
    let mut decoded = Vec::new();
    FrameDecoder::new(bytes)
        .take(expected as u64 + 1)
        .read_to_end(&mut decoded)?;
    if decoded.len() != expected {
        return Err(CodecError::LengthMismatch {
            expected,
            actual: decoded.len(),
        });
    }
    decoded
        .into_iter()
        .map(|b| VoxelType::try_from(b).map_err(CodecError::from))
        .collect()
}

impl CompressedVoxels {
    pub fn encode(codec: Codec, voxels: &[VoxelType]) -> Result<Self, CodecError> {
        Ok(match codec {
            Codec::Rle => Self::Rle {
                rle: encode_rle(voxels),
            },
            Codec::Lz4 => Self::Lz4 {
                bytes: encode_lz4(voxels)?,
            },
        })
    }

    pub fn codec(&self) -> Codec {
        match self {
            Self::Rle { .. } => Codec::Rle,
            Self::Lz4 { .. } => Codec::Lz4,
        }
    }

    /// Decodes exactly `expected` voxels, failing without expanding payloads of any other length.
    pub fn decode(&self, expected: usize) -> Result<Vec<VoxelType>, CodecError> {
        match self {
            Self::Rle { rle } => decode_rle(rle, expected),
            Self::Lz4 { bytes } => decode_lz4(bytes, expected),
        }
    }
}

/// Replaces the grid's voxel array with an encoded payload, keeping every other field.
pub fn compress(grid: &VoxelGrid, codec: Codec) -> Result<CompressedGrid, CodecError> {
    Ok(GridRecord {
        header: grid.header().clone(),
        data: CompressedVoxels::encode(codec, grid.voxels())?,
    })
}

/// Expands a stored grid back to the flat representation. Flat grids are returned unchanged.
pub fn decompress(stored: StoredGrid) -> Result<VoxelGrid, CodecError> {
    match stored {
        StoredGrid::Flat(grid) => Ok(grid),
        StoredGrid::Compressed(GridRecord { header, data }) => {
            GridHeader::new(header.size, header.res)?;
            let voxels = data.decode(header.size.volume())?;
            Ok(VoxelGrid::from_voxels(header, voxels)?)
        }
    }
}

impl StoredGrid {
    pub fn header(&self) -> &GridHeader {
        match self {
            Self::Flat(grid) => grid.header(),
            Self::Compressed(record) => &record.header,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed(_))
    }

    pub fn decompress(self) -> Result<VoxelGrid, CodecError> {
        decompress(self)
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
    use barrow_core::glam::IVec3;
    use barrow_core::ilattice::prelude::Extent;

    fn voxels(values: &[u32]) -> Vec<VoxelType> {
        values
            .iter()
            .map(|&v| VoxelType::try_from(v).unwrap())
            .collect()
    }

    fn layered_grid() -> VoxelGrid {
        let mut grid = VoxelGrid::new(GridSize::new(6, 5, 4), 0.25, VoxelType::Uninstantiated).unwrap();
        grid.fill_extent(
            Extent::from_min_and_shape(IVec3::ONE, IVec3::new(4, 3, 2)),
            VoxelType::Wall,
        );
        grid.fill_extent(
            Extent::from_min_and_shape(IVec3::new(2, 2, 1), IVec3::new(2, 1, 1)),
            VoxelType::Empty,
        );
        grid.set(IVec3::new(5, 4, 3), VoxelType::Rock);
        grid.set_source(Some("hall".to_string()));
        grid.set_wall_thickness(2);
        grid
    }

    #[test]
    fn encode_known_sequence() {
        let original = voxels(&[0, 0, 0, 1, 1, 2, 2, 2, 2, 3]);
        let rle = encode_rle(&original);
        assert_eq!(rle, vec![0, 3, 1, 2, 2, 4, 3, 1]);
        assert_eq!(decode_rle(&rle, original.len()).unwrap(), original);
    }

    #[test]
    fn empty_input_encodes_to_nothing() {
        assert!(encode_rle(&[]).is_empty());
        assert!(decode_rle(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn malformed_rle_is_rejected() {
        assert!(matches!(decode_rle(&[1, 2, 3], 3), Err(CodecError::OddPairCount(3))));
        assert!(matches!(
            decode_rle(&[1, 2, 3, 0], 2),
            Err(CodecError::ZeroRun { pair: 1 })
        ));
        assert!(matches!(
            decode_rle(&[9, 2], 2),
            Err(CodecError::InvalidVoxel(InvalidVoxelType(9)))
        ));
    }

    #[test]
    fn compress_round_trips_with_every_codec() {
        let grid = layered_grid();
        for codec in [Codec::Rle, Codec::Lz4] {
            let compressed = compress(&grid, codec).unwrap();
            assert_eq!(compressed.data.codec(), codec);
            assert_eq!(&compressed.header, grid.header());

            let restored = decompress(compressed.into()).unwrap();
            assert_eq!(restored, grid);
        }
    }

    #[test]
    fn decompress_is_idempotent_on_flat_grids() {
        let grid = layered_grid();
        assert_eq!(decompress(StoredGrid::Flat(grid.clone())).unwrap(), grid);
    }

    #[test]
    fn decompress_rejects_wrong_length() {
        let grid = layered_grid();
        let mut compressed = compress(&grid, Codec::Rle).unwrap();
        compressed.data = CompressedVoxels::Rle { rle: vec![1, 5] };

        assert!(matches!(
            decompress(compressed.into()),
            Err(CodecError::LengthMismatch {
                expected: 120,
                actual: 5
            })
        ));
    }

    #[test]
    fn oversized_payloads_fail_before_expanding() {
        let grid = VoxelGrid::new(GridSize::new(2, 1, 1), 1.0, VoxelType::Rock).unwrap();
        let mut compressed = compress(&grid, Codec::Rle).unwrap();

        compressed.data = CompressedVoxels::Rle {
            rle: vec![1, 1_500_000_000, 2, u32::MAX, 3, u32::MAX],
        };
        match decompress(compressed.clone().into()) {
            Err(CodecError::LengthMismatch { expected, actual }) => {
                assert_eq!(expected, 2);
                assert!(actual > 1_500_000_000);
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut vast = compressed.clone();
        vast.header.size = GridSize::splat(1 << 20);
        assert!(matches!(
            decompress(vast.into()),
            Err(CodecError::Grid(GridError::TooLarge(_)))
        ));

        // The LZ4 reader stops one byte past the grid's volume.
        compressed.data = CompressedVoxels::Lz4 {
            bytes: encode_lz4(&vec![VoxelType::Empty; 100_000]).unwrap(),
        };
        assert!(matches!(
            decompress(compressed.into()),
            Err(CodecError::LengthMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn compressed_grid_wire_shape() {
        let grid = VoxelGrid::new(GridSize::new(2, 1, 1), 1.0, VoxelType::Rock).unwrap();
        let json = serde_json::to_value(compress(&grid, Codec::Rle).unwrap()).unwrap();

        assert_eq!(json["data"]["codec"], "rle");
        assert_eq!(json["data"]["rle"], serde_json::json!([2, 2]));
        assert_eq!(json["hasRock"], true);
        assert_eq!(json["size"], serde_json::json!({"x": 2, "y": 1, "z": 1}));
    }

    #[test]
    fn stored_grid_deserializes_either_form() {
        let grid = layered_grid();

        let flat_json = serde_json::to_string(&grid).unwrap();
        let stored: StoredGrid = serde_json::from_str(&flat_json).unwrap();
        assert!(!stored.is_compressed());
        assert_eq!(stored.decompress().unwrap(), grid);

        let rle_json = serde_json::to_string(&compress(&grid, Codec::Rle).unwrap()).unwrap();
        let stored: StoredGrid = serde_json::from_str(&rle_json).unwrap();
        assert!(stored.is_compressed());
        assert_eq!(stored.decompress().unwrap(), grid);
    }

    #[test]
    fn flat_grid_rejects_out_of_range_voxels() {
        let json = r#"{"res":1.0,"size":{"x":2,"y":1,"z":1},"data":[1,4]}"#;
        assert!(serde_json::from_str::<VoxelGrid>(json).is_err());
    }
}
