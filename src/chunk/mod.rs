//! Terrain chunks: one streamed tile of the height-field terrain.
//!
//! A `TerrainChunk` owns its bounds, its height field once received, one
//! `LodMesh` per detail level, its visibility flag and the one-shot collider
//! flag. All chunk state is mutated on the owning thread; generation runs in
//! jobs and comes back through `ChunkHost`.
//!
//! Lifecycle: `new` (inactive scene object) -> `load` (height job) ->
//! height received -> `evaluate` on every viewer update and every mesh
//! completion -> `destroy`.
use std::fmt;
use std::sync::Arc;

use bevy::log::warn;
use bevy::math::{IVec2, Vec2, Vec3};
use bevy::prelude::{Entity, Handle, StandardMaterial};

use crate::error::TerrainError;
use crate::generation::{HeightField, MeshData, TerrainGenerator};
use crate::jobs::{JobDispatcher, JobResult};
use crate::scene::{SceneGraph, SceneObjectId};
use crate::settings::{HeightMapSettings, MeshSettings, TerrainSettings};

pub mod bounds;
pub mod host;
pub mod lod;
pub mod lod_mesh;
pub mod stats;
pub mod streaming;

pub use bounds::ChunkBounds;
pub use host::{ChunkEnv, ChunkHost, ChunkKey, VisibilityChanged};
pub use lod::{DetailLevel, DetailLevels, LodInfo};
pub use lod_mesh::{ChunkNotification, LodMesh};
pub use stats::MeshGenerationStats;
pub use streaming::{
    ChunkVisibilityChanged, TerrainPlugin, TerrainRoot, TerrainStreamer, TerrainViewer,
};

/// Integer lattice coordinate of a chunk. `y` runs along world Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing the planar world position `pos`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_world(pos: Vec2, world_size: f32) -> Self {
        Self { x: (pos.x / world_size).round() as i32, y: (pos.y / world_size).round() as i32 }
    }

    #[must_use]
    pub fn as_vec2(self) -> Vec2 {
        IVec2::new(self.x, self.y).as_vec2()
    }

    /// Chebyshev distance in chunks.
    #[must_use]
    pub fn chebyshev(self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Validated, shared construction parameters for every chunk of a terrain.
pub struct ChunkConfig {
    pub height_map: HeightMapSettings,
    pub mesh: MeshSettings,
    pub detail_levels: DetailLevels,
    pub collider_lod_index: usize,
    pub collider_generation_distance: f32,
    pub generator: Arc<dyn TerrainGenerator>,
}

impl ChunkConfig {
    /// Upper bound on the streaming radius, in chunks.
    pub const MAX_VIEW_RADIUS_CHUNKS: i32 = 64;

    /// # Errors
    /// - Any `DetailLevels::new` error for the table.
    /// - `ColliderLodOutOfRange` when `collider_lod_index` is not a table index.
    /// - `InvalidChunkSize` when the mesh settings name an unsupported size.
    /// - `InvalidMeshScale` unless `mesh_scale` is finite and positive.
    /// - `ViewRadiusTooLarge` when the view distance spans more than
    ///   `MAX_VIEW_RADIUS_CHUNKS` chunks.
    pub fn new(
        height_map: HeightMapSettings,
        mesh: MeshSettings,
        detail_levels: &[LodInfo],
        collider_lod_index: usize,
        collider_generation_distance: f32,
        generator: Arc<dyn TerrainGenerator>,
    ) -> Result<Self, TerrainError> {
        let detail_levels = DetailLevels::new(detail_levels)?;
        if collider_lod_index >= detail_levels.len() {
            return Err(TerrainError::ColliderLodOutOfRange {
                index: collider_lod_index,
                len: detail_levels.len(),
            });
        }
        if mesh.chunk_size_index >= MeshSettings::SUPPORTED_CHUNK_SIZES.len() {
            return Err(TerrainError::InvalidChunkSize {
                index: mesh.chunk_size_index,
                len: MeshSettings::SUPPORTED_CHUNK_SIZES.len(),
            });
        }
        if !mesh.mesh_scale.is_finite() || mesh.mesh_scale <= 0.0 {
            return Err(TerrainError::InvalidMeshScale { scale: mesh.mesh_scale });
        }
        let radius = (detail_levels.max_view_distance() / mesh.mesh_world_size()).round();
        #[allow(clippy::cast_precision_loss)]
        let max_radius = Self::MAX_VIEW_RADIUS_CHUNKS as f32;
        if !radius.is_finite() || radius > max_radius {
            return Err(TerrainError::ViewRadiusTooLarge { radius, max: Self::MAX_VIEW_RADIUS_CHUNKS });
        }
        Ok(Self {
            height_map,
            mesh,
            detail_levels,
            collider_lod_index,
            collider_generation_distance,
            generator,
        })
    }

    /// # Errors
    /// See `ChunkConfig::new`.
    pub fn from_settings(settings: &TerrainSettings, generator: Arc<dyn TerrainGenerator>) -> Result<Self, TerrainError> {
        Self::new(
            settings.height_map.clone(),
            settings.mesh.clone(),
            &settings.detail_levels,
            settings.collider_lod_index,
            settings.collider_generation_distance,
            generator,
        )
    }

    #[must_use]
    pub fn world_size(&self) -> f32 {
        self.mesh.mesh_world_size()
    }

    #[must_use]
    pub fn max_view_distance(&self) -> f32 {
        self.detail_levels.max_view_distance()
    }

    /// Chunks streamed around the viewer's chunk along each axis.
    #[must_use]
    pub fn view_radius_chunks(&self) -> i32 {
        // bounded by MAX_VIEW_RADIUS_CHUNKS at construction
        #[allow(clippy::cast_possible_truncation)]
        let radius = (self.max_view_distance() / self.world_size()).round() as i32;
        radius
    }

    #[must_use]
    pub fn sqr_collider_generation_distance(&self) -> f32 {
        self.collider_generation_distance * self.collider_generation_distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Received,
}

pub struct TerrainChunk {
    coord: ChunkCoord,
    epoch: u64,
    sample_centre: Vec2,
    bounds: ChunkBounds,
    object: SceneObjectId,
    config: Arc<ChunkConfig>,
    lod_meshes: Vec<LodMesh>,
    height_field: Option<Arc<HeightField>>,
    load_state: LoadState,
    previous_lod_index: Option<usize>,
    visible: bool,
    has_set_collider: bool,
}

impl TerrainChunk {
    /// Build the chunk and its inactive scene object.
    ///
    /// Every `LodMesh` notifies `Evaluate` on completion; the collider entry
    /// additionally notifies `EvaluateCollider`.
    pub fn new(
        coord: ChunkCoord,
        config: Arc<ChunkConfig>,
        parent: Option<Entity>,
        material: Handle<StandardMaterial>,
        epoch: u64,
        scene: &mut SceneGraph,
    ) -> Self {
        let world_size = config.world_size();
        let position = coord.as_vec2() * world_size;
        let sample_centre = position / config.mesh.mesh_scale;
        let bounds = ChunkBounds::new(position, world_size);

        let object = scene.spawn_object(
            format!("Terrain Chunk {coord}"),
            Vec3::new(position.x, 0.0, position.y),
            parent,
            material,
        );

        let lod_meshes = config
            .detail_levels
            .iter()
            .enumerate()
            .map(|(index, level)| {
                let mut entry = LodMesh::new(level.lod);
                entry.subscribe(ChunkNotification::Evaluate);
                if index == config.collider_lod_index {
                    entry.subscribe(ChunkNotification::EvaluateCollider);
                }
                entry
            })
            .collect();

        Self {
            coord,
            epoch,
            sample_centre,
            bounds,
            object,
            config,
            lod_meshes,
            height_field: None,
            load_state: LoadState::Idle,
            previous_lod_index: None,
            visible: false,
            has_set_collider: false,
        }
    }

    #[must_use]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn key(&self) -> ChunkKey {
        ChunkKey { coord: self.coord, epoch: self.epoch }
    }

    #[must_use]
    pub fn sample_centre(&self) -> Vec2 {
        self.sample_centre
    }

    #[must_use]
    pub fn bounds(&self) -> &ChunkBounds {
        &self.bounds
    }

    #[must_use]
    pub fn object(&self) -> SceneObjectId {
        self.object
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub fn has_height_field(&self) -> bool {
        self.height_field.is_some()
    }

    #[must_use]
    pub fn height_field(&self) -> Option<&HeightField> {
        self.height_field.as_deref()
    }

    #[must_use]
    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    #[must_use]
    pub fn has_collider(&self) -> bool {
        self.has_set_collider
    }

    /// Table index of the mesh currently shown, if any.
    #[must_use]
    pub fn current_lod_index(&self) -> Option<usize> {
        self.previous_lod_index
    }

    #[must_use]
    pub fn lod_meshes(&self) -> &[LodMesh] {
        &self.lod_meshes
    }

    /// Dispatch the height field job. No-op while loading or once received.
    pub fn load(&mut self, jobs: &mut JobDispatcher<ChunkHost>) {
        if self.load_state != LoadState::Idle {
            return;
        }
        self.load_state = LoadState::Loading;

        let config = Arc::clone(&self.config);
        let centre = self.sample_centre;
        let key = self.key();
        jobs.dispatch(
            move || config.generator.height_field(config.mesh.num_verts_per_line(), &config.height_map, centre),
            move |host: &mut ChunkHost, jobs: &mut JobDispatcher<ChunkHost>, result| {
                host.on_height_field(key, result, jobs);
            },
        );
    }

    pub(crate) fn on_height_field(
        &mut self,
        result: JobResult<HeightField>,
        env: &mut ChunkEnv,
        jobs: &mut JobDispatcher<ChunkHost>,
    ) {
        if self.height_field.is_some() {
            return;
        }
        match result {
            Ok(heights) => {
                self.height_field = Some(Arc::new(heights));
                self.load_state = LoadState::Received;
                self.evaluate(env, jobs);
            }
            Err(e) => {
                warn!("height field for chunk {} failed: {e}", self.coord);
                self.load_state = LoadState::Idle;
            }
        }
    }

    /// Update visibility and the shown LOD for the current viewer position.
    ///
    /// Does nothing until the height field has been received.
    pub fn evaluate(&mut self, env: &mut ChunkEnv, jobs: &mut JobDispatcher<ChunkHost>) {
        let Some(heights) = self.height_field.clone() else { return };

        let distance = self.bounds.distance(env.viewer);
        let selected = self.config.detail_levels.select_index(distance);
        let visible = selected.is_some();

        if let Some(index) = selected
            && self.previous_lod_index != Some(index)
        {
            let key = self.key();
            let entry = &mut self.lod_meshes[index];
            if let Some(mesh) = entry.mesh() {
                self.previous_lod_index = Some(index);
                env.scene.set_mesh(self.object, mesh);
                env.stats.update_chunk(self.coord, entry.triangles());
            } else if !entry.is_requested() {
                entry.request_mesh(key, index, &heights, &self.config, jobs);
            }
        }

        if visible != self.visible {
            self.visible = visible;
            env.scene.set_active(self.object, visible);
            env.push_visibility(VisibilityChanged { coord: self.coord, visible });
        }

        self.evaluate_collider(env, jobs);
    }

    /// Request the collider mesh when in range and assign it once close enough.
    ///
    /// Once the collider has been assigned this never does anything again.
    pub fn evaluate_collider(&mut self, env: &mut ChunkEnv, jobs: &mut JobDispatcher<ChunkHost>) {
        if self.has_set_collider {
            return;
        }
        let Some(heights) = self.height_field.clone() else { return };
        let index = self.config.collider_lod_index;
        let Some(level) = self.config.detail_levels.get(index).copied() else { return };

        let sqr_dst = self.bounds.sqr_distance(env.viewer);
        let key = self.key();
        let entry = &mut self.lod_meshes[index];

        if sqr_dst < level.sqr_visible_dst_threshold && !entry.is_requested() {
            entry.request_mesh(key, index, &heights, &self.config, jobs);
        }

        if sqr_dst < self.config.sqr_collider_generation_distance()
            && let Some(mesh) = entry.mesh()
        {
            env.scene.set_collider(self.object, mesh);
            self.has_set_collider = true;
        }
    }

    pub(crate) fn on_mesh_ready(
        &mut self,
        index: usize,
        result: JobResult<MeshData>,
        env: &mut ChunkEnv,
        jobs: &mut JobDispatcher<ChunkHost>,
    ) {
        let Some(entry) = self.lod_meshes.get_mut(index) else { return };
        match result {
            Ok(data) => {
                let triangles = data.triangle_count();
                let mesh = env.scene.create_mesh(data);
                for notification in entry.receive(mesh, triangles) {
                    match notification {
                        ChunkNotification::Evaluate => self.evaluate(env, jobs),
                        ChunkNotification::EvaluateCollider => self.evaluate_collider(env, jobs),
                    }
                }
            }
            Err(e) => {
                warn!("lod {} mesh for chunk {} failed: {e}", entry.lod(), self.coord);
                entry.reset_request();
            }
        }
    }

    /// Remove the scene object and release every realised mesh.
    pub fn destroy(self, scene: &mut SceneGraph) {
        scene.despawn(self.object);
        for mesh in self.lod_meshes.iter().filter_map(LodMesh::mesh) {
            scene.release_mesh(mesh);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedGenerator {
        height_calls: AtomicUsize,
        mesh_lods: Mutex<Vec<u8>>,
        fail_heights: AtomicBool,
        fail_meshes: AtomicBool,
    }

    impl TerrainGenerator for ScriptedGenerator {
        fn height_field(&self, num_verts: usize, _: &HeightMapSettings, _: Vec2) -> Result<HeightField, TerrainError> {
            self.height_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_heights.load(Ordering::SeqCst) {
                return Err(TerrainError::HeightFieldSize { expected: num_verts * num_verts, actual: 0 });
            }
            HeightField::from_values(num_verts, num_verts, vec![0.0; num_verts * num_verts])
        }

        fn terrain_mesh(&self, _: &HeightField, _: &MeshSettings, lod: u8) -> Result<MeshData, TerrainError> {
            self.mesh_lods.lock().unwrap().push(lod);
            if self.fail_meshes.load(Ordering::SeqCst) {
                return Err(TerrainError::LodStepMismatch { lod, step: 0, verts: 0 });
            }
            Ok(MeshData {
                positions: vec![[0.0; 3]; 3],
                normals: vec![[0.0, 1.0, 0.0]; 3],
                uvs: vec![[0.0; 2]; 3],
                indices: vec![0, 1, 2],
            })
        }
    }

    const ORIGIN: ChunkCoord = ChunkCoord::new(0, 0);

    struct Fixture {
        host: ChunkHost,
        jobs: JobDispatcher<ChunkHost>,
        generator: Arc<ScriptedGenerator>,
        config: Arc<ChunkConfig>,
    }

    impl Fixture {
        // 48-unit chunks, LOD table [100, 200, 300], collider on index 0.
        fn new() -> Self {
            let generator = Arc::new(ScriptedGenerator::default());
            let config = ChunkConfig::new(
                HeightMapSettings::default(),
                MeshSettings { mesh_scale: 1.0, chunk_size_index: 0 },
                &[
                    LodInfo { lod: 0, visible_dst_threshold: 100.0 },
                    LodInfo { lod: 1, visible_dst_threshold: 200.0 },
                    LodInfo { lod: 2, visible_dst_threshold: 300.0 },
                ],
                0,
                5.0,
                generator.clone(),
            )
            .unwrap();
            Self { host: ChunkHost::new(), jobs: JobDispatcher::new(), generator, config: Arc::new(config) }
        }

        fn spawn(&mut self, coord: ChunkCoord) {
            self.host.create_chunk(coord, &self.config, None, Handle::default());
        }

        fn chunk(&self) -> &TerrainChunk {
            self.host.chunk(ORIGIN).unwrap()
        }

        fn finish(&mut self) {
            self.jobs.finish_all(&mut self.host);
        }

        fn drain_until_height(&mut self) {
            while !self.chunk().has_height_field() {
                self.jobs.drain(&mut self.host);
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        }

        fn view_from(&mut self, x: f32) {
            self.host.env.viewer = Vec2::new(x, 0.0);
            self.host.evaluate(ORIGIN, &mut self.jobs);
        }

        fn mesh_lods(&self) -> Vec<u8> {
            self.generator.mesh_lods.lock().unwrap().clone()
        }
    }

    #[test]
    fn construction_places_chunk_and_stays_inactive() {
        let mut f = Fixture::new();
        f.host.create_chunk(ChunkCoord::new(2, -1), &f.config, None, Handle::default());
        let chunk = f.host.chunk(ChunkCoord::new(2, -1)).unwrap();

        assert_eq!(chunk.sample_centre(), Vec2::new(96.0, -48.0));
        assert_eq!(chunk.bounds().centre(), Vec2::new(96.0, -48.0));
        assert_eq!(chunk.lod_meshes().len(), 3);
        assert!(!chunk.is_visible());
        let object = f.host.env.scene.object(chunk.object()).unwrap();
        assert!(!object.active);
        assert_eq!(object.position, Vec3::new(96.0, 0.0, -48.0));
    }

    #[test]
    fn config_rejects_bad_collider_index_and_chunk_size() {
        let generator: Arc<dyn TerrainGenerator> = Arc::new(ScriptedGenerator::default());
        let levels = [LodInfo { lod: 0, visible_dst_threshold: 10.0 }];
        assert!(matches!(
            ChunkConfig::new(HeightMapSettings::default(), MeshSettings::default(), &levels, 1, 5.0, generator.clone()),
            Err(TerrainError::ColliderLodOutOfRange { index: 1, len: 1 })
        ));
        let mesh = MeshSettings { mesh_scale: 1.0, chunk_size_index: 42 };
        assert!(matches!(
            ChunkConfig::new(HeightMapSettings::default(), mesh, &levels, 0, 5.0, generator.clone()),
            Err(TerrainError::InvalidChunkSize { index: 42, .. })
        ));
        assert!(matches!(
            ChunkConfig::new(HeightMapSettings::default(), MeshSettings::default(), &[], 0, 5.0, generator),
            Err(TerrainError::EmptyDetailLevels)
        ));
    }

    #[test]
    fn config_rejects_degenerate_mesh_scale_and_huge_radius() {
        let generator: Arc<dyn TerrainGenerator> = Arc::new(ScriptedGenerator::default());
        let levels = [LodInfo { lod: 0, visible_dst_threshold: 100.0 }];
        for scale in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let mesh = MeshSettings { mesh_scale: scale, chunk_size_index: 0 };
            assert!(
                matches!(
                    ChunkConfig::new(HeightMapSettings::default(), mesh, &levels, 0, 5.0, generator.clone()),
                    Err(TerrainError::InvalidMeshScale { .. })
                ),
                "scale {scale}"
            );
        }

        // 48-unit chunks at scale 0.001 put 100 units about 2083 chunks away
        let tiny = MeshSettings { mesh_scale: 0.001, chunk_size_index: 0 };
        assert!(matches!(
            ChunkConfig::new(HeightMapSettings::default(), tiny, &levels, 0, 5.0, generator.clone()),
            Err(TerrainError::ViewRadiusTooLarge { max: ChunkConfig::MAX_VIEW_RADIUS_CHUNKS, .. })
        ));

        let mesh = MeshSettings { mesh_scale: 1.0, chunk_size_index: 0 };
        let config = ChunkConfig::new(HeightMapSettings::default(), mesh, &levels, 0, 5.0, generator).unwrap();
        assert_eq!(config.view_radius_chunks(), 2);
    }

    #[test]
    fn no_mesh_job_before_height_field() {
        let mut f = Fixture::new();
        f.spawn(ORIGIN);
        for _ in 0..5 {
            f.host.evaluate(ORIGIN, &mut f.jobs);
            f.host.evaluate_collider(ORIGIN, &mut f.jobs);
        }
        assert_eq!(f.jobs.dispatched(), 0);

        f.host.load(ORIGIN, &mut f.jobs);
        f.host.load(ORIGIN, &mut f.jobs);
        f.host.evaluate(ORIGIN, &mut f.jobs);
        assert_eq!(f.jobs.dispatched(), 1);
        assert_eq!(f.chunk().load_state(), LoadState::Loading);

        f.finish();
        assert_eq!(f.generator.height_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.chunk().load_state(), LoadState::Received);
        assert_eq!(f.mesh_lods(), vec![0]);
    }

    #[test]
    fn mesh_job_dispatched_once_per_lod() {
        let mut f = Fixture::new();
        f.spawn(ORIGIN);
        f.host.load(ORIGIN, &mut f.jobs);
        f.drain_until_height();

        // the LOD 0 job is in flight now
        assert!(f.chunk().lod_meshes()[0].is_requested());
        for _ in 0..10 {
            f.host.evaluate(ORIGIN, &mut f.jobs);
            f.host.evaluate_collider(ORIGIN, &mut f.jobs);
        }
        f.finish();

        assert_eq!(f.mesh_lods(), vec![0]);
        assert_eq!(f.jobs.dispatched(), 2);
        assert_eq!(f.chunk().current_lod_index(), Some(0));
    }

    #[test]
    fn visibility_notifies_once_per_edge() {
        let mut f = Fixture::new();
        f.spawn(ORIGIN);
        f.host.load(ORIGIN, &mut f.jobs);
        f.finish();
        let on = VisibilityChanged { coord: ORIGIN, visible: true };
        let off = VisibilityChanged { coord: ORIGIN, visible: false };
        assert_eq!(f.host.env.take_visibility_events(), vec![on]);

        for _ in 0..3 {
            f.view_from(0.0);
        }
        assert!(f.host.env.take_visibility_events().is_empty());

        f.view_from(1000.0);
        f.view_from(1000.0);
        assert_eq!(f.host.env.take_visibility_events(), vec![off]);
        assert!(!f.host.env.scene.object(f.chunk().object()).unwrap().active);

        f.view_from(10.0);
        assert_eq!(f.host.env.take_visibility_events(), vec![on]);
        assert_eq!(f.host.env.scene.counters().active_changes, 3);
    }

    #[test]
    fn lod_selection_follows_distance_and_reapplies_nothing() {
        let mut f = Fixture::new();
        f.spawn(ORIGIN);
        f.host.load(ORIGIN, &mut f.jobs);
        f.finish();
        assert_eq!(f.host.env.scene.counters().mesh_sets, 1);

        for _ in 0..5 {
            f.view_from(0.0);
        }
        assert_eq!(f.host.env.scene.counters().mesh_sets, 1);

        // 24 + 150 from the centre: index 1
        f.view_from(174.0);
        assert_eq!(f.chunk().current_lod_index(), Some(0));
        f.finish();
        assert_eq!(f.chunk().current_lod_index(), Some(1));
        assert_eq!(f.host.env.scene.counters().mesh_sets, 2);

        // back to the ready LOD 0 mesh: applied without a new job
        f.view_from(0.0);
        assert_eq!(f.chunk().current_lod_index(), Some(0));
        assert_eq!(f.host.env.scene.counters().mesh_sets, 3);
        assert_eq!(f.mesh_lods(), vec![0, 1]);
        assert_eq!(f.host.env.stats.total_triangles, 1);
    }

    #[test]
    fn collider_is_assigned_once_when_close() {
        let mut f = Fixture::new();
        f.host.env.viewer = Vec2::new(34.0, 0.0); // 10 units outside the bounds
        f.spawn(ORIGIN);
        f.host.load(ORIGIN, &mut f.jobs);
        f.finish();
        assert!(f.chunk().lod_meshes()[0].is_ready());
        assert!(!f.chunk().has_collider());

        f.host.env.viewer = Vec2::new(26.0, 0.0);
        f.host.evaluate_collider(ORIGIN, &mut f.jobs);
        assert!(f.chunk().has_collider());

        for _ in 0..5 {
            f.view_from(0.0);
            f.host.evaluate_collider(ORIGIN, &mut f.jobs);
        }
        f.view_from(500.0);
        f.view_from(0.0);
        assert!(f.chunk().has_collider());
        assert_eq!(f.host.env.scene.counters().collider_sets, 1);
        let object = f.host.env.scene.object(f.chunk().object()).unwrap();
        assert_eq!(object.collider, f.chunk().lod_meshes()[0].mesh());
    }

    #[test]
    fn collider_lod_is_requested_within_its_threshold() {
        let mut f = Fixture::new();
        // 150 away: LOD index 1, outside the collider LOD's range
        f.host.env.viewer = Vec2::new(174.0, 0.0);
        f.spawn(ORIGIN);
        f.host.load(ORIGIN, &mut f.jobs);
        f.finish();
        assert_eq!(f.mesh_lods(), vec![1]);

        // 80 away: inside the collider LOD threshold, LOD index 0 selected anyway
        f.host.env.viewer = Vec2::new(104.0, 0.0);
        f.host.evaluate_collider(ORIGIN, &mut f.jobs);
        f.finish();
        assert_eq!(f.mesh_lods(), vec![1, 0]);
        assert!(!f.chunk().has_collider());
    }

    #[test]
    fn failed_jobs_leave_chunk_retryable() {
        let mut f = Fixture::new();
        f.generator.fail_heights.store(true, Ordering::SeqCst);
        f.spawn(ORIGIN);
        f.host.load(ORIGIN, &mut f.jobs);
        f.finish();
        assert_eq!(f.chunk().load_state(), LoadState::Idle);
        assert!(!f.chunk().has_height_field());
        assert_eq!(f.jobs.failed(), 1);

        f.generator.fail_heights.store(false, Ordering::SeqCst);
        f.generator.fail_meshes.store(true, Ordering::SeqCst);
        f.host.load(ORIGIN, &mut f.jobs);
        f.finish();
        assert!(f.chunk().has_height_field());
        assert!(!f.chunk().lod_meshes()[0].is_requested());
        assert_eq!(f.host.env.scene.counters().mesh_sets, 0);
        assert_eq!(f.host.env.scene.counters().meshes_created, 0);

        f.generator.fail_meshes.store(false, Ordering::SeqCst);
        f.view_from(0.0);
        f.finish();
        assert_eq!(f.host.env.scene.counters().mesh_sets, 1);
        assert_eq!(f.mesh_lods(), vec![0, 0]);
    }

    #[test]
    fn completions_for_destroyed_chunks_are_discarded() {
        let mut f = Fixture::new();
        f.spawn(ORIGIN);
        f.host.load(ORIGIN, &mut f.jobs);
        f.drain_until_height();
        // LOD 0 mesh in flight
        assert!(f.host.destroy_chunk(ORIGIN));
        f.finish();
        assert_eq!(f.host.stale_completions(), 1);
        assert_eq!(f.host.env.scene.counters().meshes_created, 0);
        assert_eq!(f.host.env.scene.counters().despawned, 1);

        // a replacement at the same coordinate ignores the old chunk's height job
        f.spawn(ORIGIN);
        f.host.load(ORIGIN, &mut f.jobs);
        f.spawn(ORIGIN);
        f.finish();
        assert_eq!(f.host.stale_completions(), 2);
        assert!(!f.chunk().has_height_field());
        assert_eq!(f.chunk().load_state(), LoadState::Idle);
    }
}
