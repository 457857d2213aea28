//! Barrow: voxel occupancy for cavern and structure documents.
//!
//! This crate bundles the engine ([`barrow_map`]) with its math plumbing ([`barrow_core`]) and a file-backed [`Config`] of
//! default options for hosts.

mod config;

pub use config::Config;

pub use barrow_core;
pub use barrow_map::*;
