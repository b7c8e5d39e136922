//! Triangle statistics for the meshes currently shown by each chunk.
//!
//! # Example:
//! ```
//! use terrain_stream::chunk::{ChunkCoord, MeshGenerationStats};
//! let mut stats = MeshGenerationStats::default();
//! stats.update_chunk(ChunkCoord::new(0, 0), 100);
//! assert_eq!(stats.total_triangles, 100);
//! ```
use std::collections::HashMap;

use super::ChunkCoord;

/// `per_chunk_triangles` holds the triangle count of the mesh each chunk is
/// showing; `total_triangles` is their sum.
#[derive(Debug, Default)]
pub struct MeshGenerationStats {
    pub per_chunk_triangles: HashMap<ChunkCoord, usize>,
    pub total_triangles: usize,
}

impl MeshGenerationStats {
    /// Record the triangle count of the mesh now shown by `coord`.
    pub fn update_chunk(&mut self, coord: ChunkCoord, tri_count: usize) {
        let prev = self.per_chunk_triangles.insert(coord, tri_count).unwrap_or(0);
        self.total_triangles = self.total_triangles + tri_count - prev;
    }

    /// Forget a destroyed chunk.
    pub fn remove_chunk(&mut self, coord: ChunkCoord) {
        if let Some(prev) = self.per_chunk_triangles.remove(&coord) {
            self.total_triangles = self.total_triangles.saturating_sub(prev);
        }
    }

    /// The `n` chunks with the most triangles, descending.
    #[must_use]
    pub fn top_chunks(&self, n: usize) -> Vec<(ChunkCoord, usize)> {
        let mut entries: Vec<(ChunkCoord, usize)> = self.per_chunk_triangles.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        entries.into_iter().take(n).collect()
    }
}
