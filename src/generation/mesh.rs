//! Regular-grid terrain meshing with LOD vertex skipping.
use bevy::math::Vec3;

use super::{HeightField, MeshData};
use crate::error::TerrainError;
use crate::settings::MeshSettings;

/// Vertex stride along each axis for `lod`: 1 for full detail, `lod * 2` above.
#[must_use]
pub fn lod_step(lod: u8) -> usize {
    if lod == 0 { 1 } else { usize::from(lod) * 2 }
}

/// Triangulate `heights` for one LOD.
///
/// The mesh is centred on the chunk origin in XZ and scaled by
/// `settings.mesh_scale`. Every LOD keeps the border vertices, so chunks of
/// different LODs line up at their corners.
///
/// # Errors
/// `LodStepMismatch` when the LOD stride does not divide the grid.
pub fn generate_terrain_mesh(heights: &HeightField, settings: &MeshSettings, lod: u8) -> Result<MeshData, TerrainError> {
    let n = heights.width();
    let step = lod_step(lod);
    if n < 2 || (n - 1) % step != 0 || heights.height() != n {
        return Err(TerrainError::LodStepMismatch { lod, step, verts: n });
    }

    let verts_per_line = (n - 1) / step + 1;
    #[allow(clippy::cast_precision_loss)]
    let half = (n - 1) as f32 * 0.5;
    #[allow(clippy::cast_precision_loss)]
    let uv_scale = 1.0 / (n - 1) as f32;

    let mut data = MeshData {
        positions: Vec::with_capacity(verts_per_line * verts_per_line),
        normals: Vec::new(),
        uvs: Vec::with_capacity(verts_per_line * verts_per_line),
        indices: Vec::with_capacity((verts_per_line - 1) * (verts_per_line - 1) * 6),
    };

    for y in (0..n).step_by(step) {
        for x in (0..n).step_by(step) {
            #[allow(clippy::cast_precision_loss)]
            let (fx, fy) = (x as f32, y as f32);
            data.positions.push([
                (fx - half) * settings.mesh_scale,
                heights.get(x, y),
                (fy - half) * settings.mesh_scale,
            ]);
            data.uvs.push([fx * uv_scale, fy * uv_scale]);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let vpl = verts_per_line as u32;
    for row in 0..vpl - 1 {
        for col in 0..vpl - 1 {
            let tl = row * vpl + col;
            let tr = tl + 1;
            let bl = tl + vpl;
            let br = bl + 1;
            // counter-clockwise seen from above
            data.indices.extend_from_slice(&[tl, bl, tr, tr, bl, br]);
        }
    }

    data.normals = smooth_normals(&data.positions, &data.indices);
    Ok(data)
}

/// Area-weighted vertex normals. Degenerate vertices point straight up.
fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut acc = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let pa = Vec3::from(positions[a]);
        let face = (Vec3::from(positions[b]) - pa).cross(Vec3::from(positions[c]) - pa);
        acc[a] += face;
        acc[b] += face;
        acc[c] += face;
    }
    acc.into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}
