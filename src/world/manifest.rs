//! World manifest (`info.json`)

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result, Vec3};
use crate::streaming::view::{View, ViewSet};

/// Manifest file name at the world root
pub const MANIFEST_FILE: &str = "info.json";

fn default_chunk_span() -> i32 {
    1
}

/// One view entry as written by the exporter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewInfo {
    /// Mesh file prefix: `{filename}.{x}.{z}.m`
    pub filename: String,
    #[serde(default = "default_chunk_span")]
    pub chunk_span: i32,
    /// Observer distance above which the view becomes eligible
    pub distance: f64,
}

impl ViewInfo {
    pub fn to_view(&self) -> Result<View> {
        View::new(self.filename.clone(), self.chunk_span, self.distance)
    }
}

/// Parsed `info.json`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldInfo {
    /// Initial observer target in world coordinates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<Vec<f64>>,
    /// Extra material file keys
    #[serde(default)]
    pub materials: Vec<String>,
    pub views: Vec<ViewInfo>,
}

impl WorldInfo {
    /// Parse and validate a manifest
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let info: WorldInfo = serde_json::from_slice(bytes)
            .map_err(|e| Error::Manifest(format!("invalid {}: {}", MANIFEST_FILE, e)))?;
        info.validate()?;
        Ok(info)
    }

    pub fn validate(&self) -> Result<()> {
        for view in &self.views {
            view.to_view()?;
        }
        if let Some(home) = &self.home {
            if home.len() != 3 {
                return Err(Error::Manifest(format!(
                    "home must have 3 components, got {}",
                    home.len()
                )));
            }
        }
        Ok(())
    }

    /// Views sorted by distance threshold, farthest first
    pub fn view_set(&self) -> Result<ViewSet> {
        let views = self.views.iter().map(ViewInfo::to_view).collect::<Result<Vec<_>>>()?;
        ViewSet::new(views)
    }

    /// Home position, if the manifest names one
    pub fn home_position(&self) -> Option<Vec3> {
        match self.home.as_deref() {
            Some(&[x, y, z]) => Some(Vec3::new(x as f32, y as f32, z as f32)),
            _ => None,
        }
    }
}
