use barrow_core::static_assertions::const_assert_eq;

use bytemuck::NoUninit;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::mem;

/// Classification of a single cell in a [`VoxelGrid`](crate::VoxelGrid).
///
/// Serialized as its integer discriminant. Any other integer is rejected when deserializing.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, NoUninit, PartialEq, Serialize)]
#[serde(try_from = "u32", into = "u8")]
#[repr(u8)]
pub enum VoxelType {
    /// Outside of any baked region; "no data."
    Uninstantiated = 0,
    /// Known interior air.
    Empty = 1,
    /// Solid interior mass.
    Rock = 2,
    /// Solid shell within the wall thickness of an outside or empty boundary.
    Wall = 3,
}

const_assert_eq!(mem::size_of::<VoxelType>(), 1);

impl Default for VoxelType {
    fn default() -> Self {
        Self::Uninstantiated
    }
}

impl VoxelType {
    pub const ALL: [Self; 4] = [Self::Uninstantiated, Self::Empty, Self::Rock, Self::Wall];

    /// `Rock` or `Wall`.
    #[inline]
    pub fn is_solid(self) -> bool {
        matches!(self, Self::Rock | Self::Wall)
    }

    /// Combines two classifications of the same cell.
    ///
    /// Commutative. `Uninstantiated` is the identity, `Empty` absorbs everything, and `Rock` with `Wall` stays `Wall`.
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        use VoxelType::*;

        match (self, other) {
            (Uninstantiated, x) | (x, Uninstantiated) => x,
            (Empty, _) | (_, Empty) => Empty,
            (Wall, _) | (_, Wall) => Wall,
            (Rock, Rock) => Rock,
        }
    }
}

/// An integer that doesn't name any [`VoxelType`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid voxel type {0}; expected 0..=3")]
pub struct InvalidVoxelType(pub u32);

impl TryFrom<u32> for VoxelType {
    type Error = InvalidVoxelType;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Uninstantiated),
            1 => Ok(Self::Empty),
            2 => Ok(Self::Rock),
            3 => Ok(Self::Wall),
            other => Err(InvalidVoxelType(other)),
        }
    }
}

impl TryFrom<u8> for VoxelType {
    type Error = InvalidVoxelType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from(u32::from(value))
    }
}

impl From<VoxelType> for u8 {
    fn from(v: VoxelType) -> Self {
        v as u8
    }
}

impl From<VoxelType> for u32 {
    fn from(v: VoxelType) -> Self {
        v as u32
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
    use VoxelType::*;

    #[test]
    fn merge_table() {
        let expected = [
            [Uninstantiated, Empty, Rock, Wall],
            [Empty, Empty, Empty, Empty],
            [Rock, Empty, Rock, Wall],
            [Wall, Empty, Wall, Wall],
        ];
        for (a, row) in VoxelType::ALL.iter().zip(expected.iter()) {
            for (b, want) in VoxelType::ALL.iter().zip(row.iter()) {
                assert_eq!(a.merge(*b), *want, "{:?} + {:?}", a, b);
            }
        }
    }

    #[test]
    fn merge_is_commutative_with_identity_and_absorber() {
        for a in VoxelType::ALL {
            assert_eq!(a.merge(Uninstantiated), a);
            assert_eq!(a.merge(Empty), Empty);
            for b in VoxelType::ALL {
                assert_eq!(a.merge(b), b.merge(a));
            }
        }
    }

    #[test]
    fn named_merges() {
        assert_eq!(Empty.merge(Rock), Empty);
        assert_eq!(Rock.merge(Wall), Wall);
        assert_eq!(Uninstantiated.merge(Wall), Wall);
    }

    #[test]
    fn integer_conversion_rejects_unknown_values() {
        assert_eq!(VoxelType::try_from(3u32), Ok(Wall));
        assert_eq!(VoxelType::try_from(4u32), Err(InvalidVoxelType(4)));
        assert_eq!(VoxelType::try_from(255u8), Err(InvalidVoxelType(255)));
    }

    #[test]
    fn serializes_as_integer() {
        assert_eq!(serde_json::to_string(&[Rock, Wall]).unwrap(), "[2,3]");
        assert_eq!(serde_json::from_str::<VoxelType>("1").unwrap(), Empty);
        assert!(serde_json::from_str::<VoxelType>("7").is_err());
    }
}
