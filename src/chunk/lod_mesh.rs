//! Per-detail-level mesh cache.
use std::sync::Arc;

use super::host::{ChunkHost, ChunkKey};
use super::ChunkConfig;
use crate::generation::HeightField;
use crate::jobs::JobDispatcher;
use crate::scene::MeshId;

/// What a chunk runs when one of its meshes becomes ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkNotification {
    Evaluate,
    EvaluateCollider,
}

/// Mesh for one entry of the detail level table.
///
/// Requested at most once; ready at most once; never regenerated. A failed
/// job clears `requested` so a later evaluation can ask again.
#[derive(Debug)]
pub struct LodMesh {
    lod: u8,
    mesh: Option<MeshId>,
    triangles: usize,
    requested: bool,
    subscribers: Vec<ChunkNotification>,
}

impl LodMesh {
    #[must_use]
    pub fn new(lod: u8) -> Self {
        Self { lod, mesh: None, triangles: 0, requested: false, subscribers: Vec::new() }
    }

    #[must_use]
    pub fn lod(&self) -> u8 {
        self.lod
    }

    /// The realised mesh, once the job completed.
    #[must_use]
    pub fn mesh(&self) -> Option<MeshId> {
        self.mesh
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.mesh.is_some()
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    #[must_use]
    pub fn triangles(&self) -> usize {
        self.triangles
    }

    /// Register a notification; notifications run in registration order.
    pub fn subscribe(&mut self, notification: ChunkNotification) {
        self.subscribers.push(notification);
    }

    /// Dispatch the mesh job for this level. No-op when already requested.
    ///
    /// `index` is this entry's position in the chunk's detail level table;
    /// the completion is routed back through `ChunkHost` by `key`.
    pub fn request_mesh(
        &mut self,
        key: ChunkKey,
        index: usize,
        heights: &Arc<HeightField>,
        config: &Arc<ChunkConfig>,
        jobs: &mut JobDispatcher<ChunkHost>,
    ) {
        if self.requested {
            return;
        }
        self.requested = true;

        let heights = Arc::clone(heights);
        let config = Arc::clone(config);
        let lod = self.lod;
        jobs.dispatch(
            move || config.generator.terrain_mesh(&heights, &config.mesh, lod),
            move |host: &mut ChunkHost, jobs: &mut JobDispatcher<ChunkHost>, result| {
                host.on_mesh_ready(key, index, result, jobs);
            },
        );
    }

    /// Store the realised mesh and return the notifications to run.
    ///
    /// A second delivery is ignored and returns no notifications.
    pub fn receive(&mut self, mesh: MeshId, triangles: usize) -> Vec<ChunkNotification> {
        if self.mesh.is_some() {
            return Vec::new();
        }
        self.mesh = Some(mesh);
        self.triangles = triangles;
        self.subscribers.clone()
    }

    /// Forget an in-flight request whose job failed.
    pub fn reset_request(&mut self) {
        if self.mesh.is_none() {
            self.requested = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_is_one_shot_and_keeps_subscriber_order() {
        let mut entry = LodMesh::new(2);
        entry.subscribe(ChunkNotification::Evaluate);
        entry.subscribe(ChunkNotification::EvaluateCollider);

        let first = entry.receive(MeshId(7), 12);
        assert_eq!(first, vec![ChunkNotification::Evaluate, ChunkNotification::EvaluateCollider]);
        assert_eq!(entry.mesh(), Some(MeshId(7)));
        assert_eq!(entry.triangles(), 12);

        assert!(entry.receive(MeshId(8), 99).is_empty());
        assert_eq!(entry.mesh(), Some(MeshId(7)));
    }

    #[test]
    fn reset_only_applies_before_ready() {
        let mut entry = LodMesh::new(0);
        entry.requested = true;
        entry.reset_request();
        assert!(!entry.is_requested());

        entry.requested = true;
        entry.receive(MeshId(1), 2);
        entry.reset_request();
        assert!(entry.is_requested());
    }
}
