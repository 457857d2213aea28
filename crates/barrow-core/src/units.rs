macro_rules! def_units {
    ($t: ident, $doc: literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, Default, PartialEq)]
        pub struct $t<T>(pub T);
    };
}

def_units!(
    WorldUnits,
    "Denotes that the inner `T` is given in world units (the document's coordinate space)."
);
def_units!(
    VoxelUnits,
    "Denotes that the inner `T` is given in units of voxels, relative to the minimum corner of some grid."
);
