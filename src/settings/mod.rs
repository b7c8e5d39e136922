//! Terrain settings, types and defaults.
//!
//! Settings are stored as a RON file under `data/settings/` and are hot-reloadable
//! using the RON watcher utilities (see `ron::setup_ron_watcher`).
use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::chunk::lod::LodInfo;

pub mod loader;

/// Fractal noise parameters used by the height field generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSettings {
    #[serde(default = "NoiseSettings::default_scale")]
    pub scale: f64, // World samples per noise unit. Larger values stretch features.
    #[serde(default = "NoiseSettings::default_octaves")]
    pub octaves: usize, // Number of fbm layers.
    #[serde(default = "NoiseSettings::default_persistence")]
    pub persistence: f64, // Amplitude multiplier between octaves.
    #[serde(default = "NoiseSettings::default_lacunarity")]
    pub lacunarity: f64, // Frequency multiplier between octaves.
    #[serde(default = "NoiseSettings::default_seed")]
    pub seed: u32,
    #[serde(default)]
    pub offset: [f64; 2], // Constant offset added to every sample position.
}

impl NoiseSettings {
    fn default_scale() -> f64 { 50.0 }
    fn default_octaves() -> usize { 6 }
    fn default_persistence() -> f64 { 0.5 }
    fn default_lacunarity() -> f64 { 2.0 }
    fn default_seed() -> u32 { 12345 }
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            scale: Self::default_scale(),
            octaves: Self::default_octaves(),
            persistence: Self::default_persistence(),
            lacunarity: Self::default_lacunarity(),
            seed: Self::default_seed(),
            offset: [0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightMapSettings {
    #[serde(default)]
    pub noise: NoiseSettings,
    #[serde(default = "HeightMapSettings::default_height_multiplier")]
    pub height_multiplier: f32, // World height of a fully raised sample.
    #[serde(default = "HeightMapSettings::default_height_exponent")]
    pub height_exponent: f32, // Flattens lowlands when > 1.
}

impl HeightMapSettings {
    fn default_height_multiplier() -> f32 { 40.0 }
    fn default_height_exponent() -> f32 { 2.0 }

    /// Lowest height the generator can produce.
    #[must_use]
    pub fn min_height(&self) -> f32 {
        0.0
    }

    /// Highest height the generator can produce.
    #[must_use]
    pub fn max_height(&self) -> f32 {
        self.height_multiplier
    }
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            height_multiplier: Self::default_height_multiplier(),
            height_exponent: Self::default_height_exponent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSettings {
    #[serde(default = "MeshSettings::default_mesh_scale")]
    pub mesh_scale: f32, // World units between two adjacent LOD 0 vertices.
    #[serde(default = "MeshSettings::default_chunk_size_index")]
    pub chunk_size_index: usize, // Index into `SUPPORTED_CHUNK_SIZES`.
}

impl MeshSettings {
    pub const NUM_SUPPORTED_LODS: u8 = 5;
    /// Every size is divisible by each LOD vertex step (1, 2, 4, 6, 8).
    pub const SUPPORTED_CHUNK_SIZES: [usize; 9] = [48, 72, 96, 120, 144, 168, 192, 216, 240];

    fn default_mesh_scale() -> f32 { 2.5 }
    fn default_chunk_size_index() -> usize { 4 }

    /// Number of LOD 0 cells along one edge of a chunk.
    ///
    /// Falls back to the largest supported size when the index is out of
    /// range; `ChunkConfig::new` rejects such settings before they are used.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        Self::SUPPORTED_CHUNK_SIZES
            .get(self.chunk_size_index)
            .copied()
            .unwrap_or(Self::SUPPORTED_CHUNK_SIZES[Self::SUPPORTED_CHUNK_SIZES.len() - 1])
    }

    #[must_use]
    pub fn num_verts_per_line(&self) -> usize {
        self.chunk_size() + 1
    }

    /// Side length of one chunk in world units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mesh_world_size(&self) -> f32 {
        self.chunk_size() as f32 * self.mesh_scale
    }
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            mesh_scale: Self::default_mesh_scale(),
            chunk_size_index: Self::default_chunk_size_index(),
        }
    }
}

/// Top-level terrain settings.
#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainSettings {
    #[serde(default)]
    pub height_map: HeightMapSettings,
    #[serde(default)]
    pub mesh: MeshSettings,
    #[serde(default = "TerrainSettings::default_detail_levels")]
    pub detail_levels: Vec<LodInfo>,
    #[serde(default)]
    pub collider_lod_index: usize,
    #[serde(default = "TerrainSettings::default_collider_generation_distance")]
    pub collider_generation_distance: f32,
    #[serde(default = "TerrainSettings::default_viewer_move_threshold")]
    pub viewer_move_threshold: f32,
    #[serde(default = "TerrainSettings::default_unload_margin")]
    pub unload_margin: i32,
}

impl TerrainSettings {
    fn default_detail_levels() -> Vec<LodInfo> {
        vec![
            LodInfo { lod: 0, visible_dst_threshold: 200.0 },
            LodInfo { lod: 1, visible_dst_threshold: 400.0 },
            LodInfo { lod: 4, visible_dst_threshold: 600.0 },
        ]
    }
    fn default_collider_generation_distance() -> f32 { 5.0 }
    fn default_viewer_move_threshold() -> f32 { 25.0 }
    fn default_unload_margin() -> i32 { 2 }

    #[must_use]
    pub fn defaults() -> Self { TerrainSettings::default() }

    /// Descriptions for each setting so users know what changing it does.
    ///
    /// # Return
    /// A nested `HashMap` where the first level keys are section names (e.g. "mesh")
    /// and the second level maps setting field names to their descriptions.
    pub fn field_descriptions() -> std::collections::HashMap<&'static str, std::collections::HashMap<&'static str, &'static str>> {
        use std::collections::HashMap;
        let mut out: HashMap<&'static str, HashMap<&'static str, &'static str>> = HashMap::new();

        out.insert("height_map", {
            let mut m = HashMap::new();
            m.insert("noise", "Fractal noise parameters (scale, octaves, persistence, lacunarity, seed, offset).");
            m.insert("height_multiplier", "World height of a fully raised sample.");
            m.insert("height_exponent", "Exponent applied to normalized noise; values above 1 flatten lowlands.");
            m
        });

        out.insert("mesh", {
            let mut m = HashMap::new();
            m.insert("mesh_scale", "World units between two adjacent full-detail vertices.");
            m.insert("chunk_size_index", "Index into the supported chunk sizes (48..240 cells per edge).");
            m
        });

        out.insert("streaming", {
            let mut m = HashMap::new();
            m.insert("detail_levels", "Ordered (lod, visible distance) pairs; the last distance is the view distance.");
            m.insert("collider_lod_index", "Index into detail_levels whose mesh becomes the collision shape.");
            m.insert("collider_generation_distance", "Distance at which the collider mesh is assigned to a chunk.");
            m.insert("viewer_move_threshold", "How far the viewer moves before visible chunks are re-evaluated.");
            m.insert("unload_margin", "Chunks beyond the view radius plus this margin are destroyed.");
            m
        });

        out
    }
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            height_map: HeightMapSettings::default(),
            mesh: MeshSettings::default(),
            detail_levels: Self::default_detail_levels(),
            collider_lod_index: 0,
            collider_generation_distance: Self::default_collider_generation_distance(),
            viewer_move_threshold: Self::default_viewer_move_threshold(),
            unload_margin: Self::default_unload_margin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_world_size_follows_chunk_size() {
        let mesh = MeshSettings { mesh_scale: 2.0, chunk_size_index: 0 };
        assert_eq!(mesh.chunk_size(), 48);
        assert_eq!(mesh.num_verts_per_line(), 49);
        assert!((mesh.mesh_world_size() - 96.0).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: TerrainSettings = ron::from_str("(collider_lod_index: 1)").expect("valid ron");
        assert_eq!(parsed.collider_lod_index, 1);
        assert_eq!(parsed.detail_levels, TerrainSettings::default().detail_levels);
        assert_eq!(parsed.mesh, MeshSettings::default());
    }
}
