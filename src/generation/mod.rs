//! Height field and terrain mesh generation.
//!
//! Chunks never call the noise or mesh code directly. They hold an
//! `Arc<dyn TerrainGenerator>` and invoke it from worker jobs; the default
//! implementation, `NoiseTerrainGenerator`, delegates to `height` and `mesh`.
//! Both functions are pure: equal inputs give equal outputs and nothing
//! outside the returned value is touched, so they can run on any thread.
use bevy::math::Vec2;
use bevy::prelude::Mesh;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;

use crate::error::TerrainError;
use crate::settings::{HeightMapSettings, MeshSettings, TerrainSettings};

pub mod height;
pub mod mesh;

/// Immutable square grid of heights plus the observed extremes.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    width: usize,
    height: usize,
    values: Vec<f32>,
    min_value: f32,
    max_value: f32,
}

impl HeightField {
    /// Wrap `values` (row-major, `width * height` entries).
    ///
    /// # Errors
    /// `HeightFieldSize` when the value count does not match the dimensions.
    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> Result<Self, TerrainError> {
        let expected = width * height;
        if values.len() != expected || expected == 0 {
            return Err(TerrainError::HeightFieldSize { expected, actual: values.len() });
        }
        let (min_value, max_value) = values
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Ok(Self { width, height, values, min_value, max_value })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Height at column `x`, row `y`. Out-of-range coordinates are clamped.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.values[y * self.width + x]
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[must_use]
    pub fn min_value(&self) -> f32 {
        self.min_value
    }

    #[must_use]
    pub fn max_value(&self) -> f32 {
        self.max_value
    }
}

/// Raw mesh produced on a worker thread, realised into a Bevy `Mesh` on the
/// owning thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Build the renderable mesh. Consumes the buffers without copying.
    #[must_use]
    pub fn into_mesh(self) -> Mesh {
        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals);
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, self.uvs);
        mesh.insert_indices(Indices::U32(self.indices));
        mesh
    }
}

/// Source of height fields and terrain meshes, invoked from worker jobs.
pub trait TerrainGenerator: Send + Sync + 'static {
    /// Generate a `num_verts x num_verts` height field sampled around `sample_centre`.
    ///
    /// # Errors
    /// Implementation specific; surfaced to the owning thread as a job error.
    fn height_field(
        &self,
        num_verts: usize,
        settings: &HeightMapSettings,
        sample_centre: Vec2,
    ) -> Result<HeightField, TerrainError>;

    /// Build the mesh for `lod` from a chunk's height field.
    ///
    /// # Errors
    /// Implementation specific; surfaced to the owning thread as a job error.
    fn terrain_mesh(&self, heights: &HeightField, settings: &MeshSettings, lod: u8) -> Result<MeshData, TerrainError>;
}

/// Fractal-noise heights and regular-grid meshes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseTerrainGenerator;

impl TerrainGenerator for NoiseTerrainGenerator {
    fn height_field(
        &self,
        num_verts: usize,
        settings: &HeightMapSettings,
        sample_centre: Vec2,
    ) -> Result<HeightField, TerrainError> {
        height::generate_height_field(num_verts, num_verts, settings, sample_centre)
    }

    fn terrain_mesh(&self, heights: &HeightField, settings: &MeshSettings, lod: u8) -> Result<MeshData, TerrainError> {
        mesh::generate_terrain_mesh(heights, settings, lod)
    }
}

/// Synchronously generate the chunk at the origin for one LOD.
///
/// This is the map preview path: no jobs, no chunk state, just the two
/// generation steps back to back.
///
/// # Errors
/// Propagates generation errors.
pub fn preview(settings: &TerrainSettings, lod: u8) -> Result<(HeightField, MeshData), TerrainError> {
    let heights = height::generate_height_field(
        settings.mesh.num_verts_per_line(),
        settings.mesh.num_verts_per_line(),
        &settings.height_map,
        Vec2::ZERO,
    )?;
    let mesh = mesh::generate_terrain_mesh(&heights, &settings.mesh, lod)?;
    Ok((heights, mesh))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_field_tracks_extremes() {
        let field = HeightField::from_values(2, 2, vec![1.0, -3.0, 7.5, 2.0]).unwrap();
        assert_eq!(field.min_value(), -3.0);
        assert_eq!(field.max_value(), 7.5);
        assert_eq!(field.get(0, 1), 7.5);
        assert_eq!(field.get(5, 5), 2.0);
    }

    #[test]
    fn height_field_rejects_wrong_length() {
        assert!(matches!(
            HeightField::from_values(3, 3, vec![0.0; 8]),
            Err(TerrainError::HeightFieldSize { expected: 9, actual: 8 })
        ));
    }

    #[test]
    fn preview_produces_full_detail_mesh() {
        let mut settings = TerrainSettings::default();
        settings.mesh.chunk_size_index = 0;
        let (heights, mesh) = preview(&settings, 0).unwrap();
        assert_eq!(heights.width(), 49);
        assert_eq!(mesh.vertex_count(), 49 * 49);
        assert_eq!(mesh.triangle_count(), 2 * 48 * 48);

        let bevy_mesh = mesh.into_mesh();
        assert_eq!(bevy_mesh.count_vertices(), 49 * 49);
    }
}
