//! World export metadata

pub mod manifest;

pub use manifest::{WorldInfo, ViewInfo, MANIFEST_FILE};
