use barrow_map::{BakeOptions, Barrow, Codec, MergeOptions, PickOptions};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Host-side defaults for every engine operation, usually read from a RON file.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Resolution of newly created spaces.
    pub default_res: f64,
    pub bake: BakeOptions,
    pub merge: MergeOptions,
    pub pick: PickOptions,
    /// Codec used when saving documents.
    pub codec: Codec,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_res: 1.0,
            bake: BakeOptions::default(),
            merge: MergeOptions::default(),
            pick: PickOptions::default(),
            codec: Codec::default(),
        }
    }
}

impl Config {
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, ron::Error> {
        let path = path.as_ref();
        let reader = std::fs::File::open(path)?;
        log::debug!("Reading config from {}", path.display());

        ron::de::from_reader(reader)
    }

    pub fn parse(text: &str) -> Result<Self, ron::Error> {
        ron::de::from_str(text)
    }

    /// An empty document using this config's default resolution.
    pub fn new_barrow(&self) -> Barrow {
        Barrow::new(self.default_res)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
