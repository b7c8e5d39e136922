//! Owner-thread chunk registry and completion routing.
//!
//! Job completions carry a `ChunkKey`. A completion is applied only when a
//! chunk with that coordinate still exists and its epoch matches; anything
//! else belongs to a chunk that has been destroyed (or replaced) since the
//! job was dispatched and is dropped.
use std::collections::HashMap;
use std::sync::Arc;

use bevy::log::debug;
use bevy::math::Vec2;
use bevy::prelude::{Entity, Handle, StandardMaterial};

use super::{ChunkConfig, ChunkCoord, MeshGenerationStats, TerrainChunk};
use crate::generation::{HeightField, MeshData};
use crate::jobs::{JobDispatcher, JobResult};
use crate::scene::SceneGraph;

/// Identity of one chunk instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub coord: ChunkCoord,
    pub epoch: u64,
}

/// Visibility edge reported by a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityChanged {
    pub coord: ChunkCoord,
    pub visible: bool,
}

/// Everything a chunk mutates besides itself.
#[derive(Default)]
pub struct ChunkEnv {
    pub scene: SceneGraph,
    pub viewer: Vec2,
    pub stats: MeshGenerationStats,
    visibility_events: Vec<VisibilityChanged>,
}

impl ChunkEnv {
    pub(crate) fn push_visibility(&mut self, event: VisibilityChanged) {
        self.visibility_events.push(event);
    }

    /// Take the visibility edges reported since the last call, in order.
    pub fn take_visibility_events(&mut self) -> Vec<VisibilityChanged> {
        std::mem::take(&mut self.visibility_events)
    }
}

#[derive(Default)]
pub struct ChunkHost {
    chunks: HashMap<ChunkCoord, TerrainChunk>,
    pub env: ChunkEnv,
    next_epoch: u64,
    stale_completions: u64,
}

impl ChunkHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chunk at `coord`, replacing (and destroying) any existing one.
    pub fn create_chunk(
        &mut self,
        coord: ChunkCoord,
        config: &Arc<ChunkConfig>,
        parent: Option<Entity>,
        material: Handle<StandardMaterial>,
    ) -> &mut TerrainChunk {
        self.destroy_chunk(coord);
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        let chunk = TerrainChunk::new(coord, Arc::clone(config), parent, material, epoch, &mut self.env.scene);
        self.chunks.entry(coord).or_insert(chunk)
    }

    /// Destroy the chunk at `coord`. In-flight jobs for it become stale.
    pub fn destroy_chunk(&mut self, coord: ChunkCoord) -> bool {
        match self.chunks.remove(&coord) {
            Some(chunk) => {
                self.env.stats.remove_chunk(coord);
                chunk.destroy(&mut self.env.scene);
                true
            }
            None => false,
        }
    }

    /// Destroy every chunk.
    pub fn clear(&mut self) {
        let coords: Vec<ChunkCoord> = self.chunks.keys().copied().collect();
        for coord in coords {
            self.destroy_chunk(coord);
        }
    }

    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&TerrainChunk> {
        self.chunks.get(&coord)
    }

    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &TerrainChunk> {
        self.chunks.values()
    }

    /// Completions dropped because their chunk was gone or replaced.
    #[must_use]
    pub fn stale_completions(&self) -> u64 {
        self.stale_completions
    }

    pub fn load(&mut self, coord: ChunkCoord, jobs: &mut JobDispatcher<ChunkHost>) {
        if let Some(chunk) = self.chunks.get_mut(&coord) {
            chunk.load(jobs);
        }
    }

    pub fn evaluate(&mut self, coord: ChunkCoord, jobs: &mut JobDispatcher<ChunkHost>) {
        if let Some(chunk) = self.chunks.get_mut(&coord) {
            chunk.evaluate(&mut self.env, jobs);
        }
    }

    pub fn evaluate_collider(&mut self, coord: ChunkCoord, jobs: &mut JobDispatcher<ChunkHost>) {
        if let Some(chunk) = self.chunks.get_mut(&coord) {
            chunk.evaluate_collider(&mut self.env, jobs);
        }
    }

    fn live_chunk(&mut self, key: ChunkKey, what: &str) -> Option<(&mut TerrainChunk, &mut ChunkEnv)> {
        match self.chunks.get_mut(&key.coord) {
            Some(chunk) if chunk.epoch() == key.epoch => Some((chunk, &mut self.env)),
            _ => {
                self.stale_completions += 1;
                debug!("discarding stale {what} for chunk {} (epoch {})", key.coord, key.epoch);
                None
            }
        }
    }

    pub(crate) fn on_height_field(
        &mut self,
        key: ChunkKey,
        result: JobResult<HeightField>,
        jobs: &mut JobDispatcher<ChunkHost>,
    ) {
        if let Some((chunk, env)) = self.live_chunk(key, "height field") {
            chunk.on_height_field(result, env, jobs);
        }
    }

    pub(crate) fn on_mesh_ready(
        &mut self,
        key: ChunkKey,
        index: usize,
        result: JobResult<MeshData>,
        jobs: &mut JobDispatcher<ChunkHost>,
    ) {
        if let Some((chunk, env)) = self.live_chunk(key, "mesh") {
            chunk.on_mesh_ready(index, result, env, jobs);
        }
    }
}
