//! Chunk streaming around the viewer and the Bevy glue that drives it.
//!
//! `TerrainStreamer` owns every chunk, the job dispatcher and the visible
//! set. Once per frame `stream_terrain` feeds it the viewer position; the
//! streamer drains finished jobs, re-evaluates chunks when the viewer moved
//! far enough, creates chunks entering the view radius and destroys chunks
//! that left it. Scene changes are replayed into the ECS by
//! `sync_terrain_scene` right after.
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use bevy::prelude::*;

use super::host::{ChunkHost, VisibilityChanged};
use super::{ChunkConfig, ChunkCoord, LoadState};
use crate::error::TerrainError;
use crate::generation::{NoiseTerrainGenerator, TerrainGenerator};
use crate::jobs::JobDispatcher;
use crate::scene::{apply_scene_ops, SceneBindings};
use crate::settings::loader::{self as settings_loader, TerrainSettingsWatcher};
use crate::settings::TerrainSettings;

/// Marks the entity whose position drives streaming (usually the camera).
#[derive(Component, Debug, Default)]
pub struct TerrainViewer;

/// Bevy side of a chunk visibility edge.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkVisibilityChanged {
    pub coord: ChunkCoord,
    pub visible: bool,
}

impl From<VisibilityChanged> for ChunkVisibilityChanged {
    fn from(e: VisibilityChanged) -> Self {
        Self { coord: e.coord, visible: e.visible }
    }
}

/// Parent entity and shared material for every chunk entity.
#[derive(Resource, Debug, Clone)]
pub struct TerrainRoot {
    pub entity: Entity,
    pub material: Handle<StandardMaterial>,
}

/// Generator used when the streamer is (re)built. Defaults to noise.
#[derive(Resource, Clone)]
pub struct TerrainGeneratorHandle(pub Arc<dyn TerrainGenerator>);

impl Default for TerrainGeneratorHandle {
    fn default() -> Self {
        Self(Arc::new(NoiseTerrainGenerator))
    }
}

/// Snapshot of streaming counters, logged periodically and written to the debug dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingDiagnostics {
    pub chunks: usize,
    pub visible: usize,
    pub in_flight: usize,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub stale_completions: u64,
    pub triangles: usize,
}

impl fmt::Display for StreamingDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunks={} visible={} in_flight={} completed={} failed={} stale={} triangles={}",
            self.chunks,
            self.visible,
            self.in_flight,
            self.completed_jobs,
            self.failed_jobs,
            self.stale_completions,
            self.triangles
        )
    }
}

#[derive(Resource)]
pub struct TerrainStreamer {
    host: ChunkHost,
    jobs: JobDispatcher<ChunkHost>,
    config: Arc<ChunkConfig>,
    generator: Arc<dyn TerrainGenerator>,
    parent: Option<Entity>,
    material: Handle<StandardMaterial>,
    visible: HashSet<ChunkCoord>,
    events: Vec<VisibilityChanged>,
    viewer: Option<Vec2>,
    last_update_viewer: Option<Vec2>,
    sqr_move_threshold: f32,
    chunks_visible_in_view_dst: i32,
    unload_margin: i32,
}

impl TerrainStreamer {
    /// # Errors
    /// Any configuration error from `ChunkConfig::from_settings`.
    pub fn new(settings: &TerrainSettings, generator: Arc<dyn TerrainGenerator>) -> Result<Self, TerrainError> {
        let config = Arc::new(ChunkConfig::from_settings(settings, Arc::clone(&generator))?);
        let mut streamer = Self {
            host: ChunkHost::new(),
            jobs: JobDispatcher::new(),
            config,
            generator,
            parent: None,
            material: Handle::default(),
            visible: HashSet::new(),
            events: Vec::new(),
            viewer: None,
            last_update_viewer: None,
            sqr_move_threshold: 0.0,
            chunks_visible_in_view_dst: 0,
            unload_margin: 0,
        };
        streamer.apply_streaming_settings(settings);
        Ok(streamer)
    }

    /// Spawn chunk entities under `parent` with `material`.
    #[must_use]
    pub fn with_scene_root(mut self, parent: Option<Entity>, material: Handle<StandardMaterial>) -> Self {
        self.parent = parent;
        self.material = material;
        self
    }

    fn apply_streaming_settings(&mut self, settings: &TerrainSettings) {
        self.sqr_move_threshold = settings.viewer_move_threshold * settings.viewer_move_threshold;
        self.chunks_visible_in_view_dst = self.config.view_radius_chunks();
        self.unload_margin = settings.unload_margin.max(0);
    }

    /// Advance streaming for a viewer at planar position `viewer` (world XZ).
    ///
    /// Returns the visibility edges reported since the previous call.
    pub fn tick(&mut self, viewer: Vec2) -> Vec<VisibilityChanged> {
        self.host.env.viewer = viewer;
        self.jobs.drain(&mut self.host);

        if self.viewer != Some(viewer) {
            for coord in self.sorted_visible() {
                self.host.evaluate_collider(coord, &mut self.jobs);
            }
        }
        self.viewer = Some(viewer);

        let needs_update = self
            .last_update_viewer
            .is_none_or(|last| last.distance_squared(viewer) > self.sqr_move_threshold);
        if needs_update {
            self.last_update_viewer = Some(viewer);
            self.update_visible_chunks(viewer);
        }

        self.collect_events();
        std::mem::take(&mut self.events)
    }

    fn sorted_visible(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self.visible.iter().copied().collect();
        coords.sort_unstable();
        coords
    }

    fn collect_events(&mut self) {
        for event in self.host.env.take_visibility_events() {
            if event.visible {
                self.visible.insert(event.coord);
            } else {
                self.visible.remove(&event.coord);
            }
            self.events.push(event);
        }
    }

    fn update_visible_chunks(&mut self, viewer: Vec2) {
        let mut already_updated = HashSet::new();
        for coord in self.sorted_visible() {
            already_updated.insert(coord);
            self.host.evaluate(coord, &mut self.jobs);
        }

        let current = ChunkCoord::from_world(viewer, self.config.world_size());
        let radius = self.chunks_visible_in_view_dst;
        for y_offset in -radius..=radius {
            for x_offset in -radius..=radius {
                let coord = ChunkCoord::new(current.x + x_offset, current.y + y_offset);
                if already_updated.contains(&coord) {
                    continue;
                }
                match self.host.chunk(coord).map(super::TerrainChunk::load_state) {
                    Some(LoadState::Idle) => self.host.load(coord, &mut self.jobs),
                    Some(_) => self.host.evaluate(coord, &mut self.jobs),
                    None => {
                        self.host.create_chunk(coord, &self.config, self.parent, self.material.clone());
                        self.host.load(coord, &mut self.jobs);
                    }
                }
            }
        }

        self.collect_events();
        self.unload_far_chunks(current);
    }

    fn unload_far_chunks(&mut self, current: ChunkCoord) {
        let keep = self.chunks_visible_in_view_dst + self.unload_margin;
        let far: Vec<ChunkCoord> = self
            .host
            .chunks()
            .map(super::TerrainChunk::coord)
            .filter(|c| c.chebyshev(current) > keep && !self.visible.contains(c))
            .collect();
        for coord in far {
            self.host.destroy_chunk(coord);
        }
    }

    /// Replace the configuration. Every chunk is destroyed and streaming
    /// restarts on the next tick, which also reports the chunks that were
    /// visible as hidden. The old configuration stays when the new one is
    /// invalid.
    ///
    /// # Errors
    /// Any configuration error from `ChunkConfig::from_settings`.
    pub fn rebuild(&mut self, settings: &TerrainSettings) -> Result<(), TerrainError> {
        let config = ChunkConfig::from_settings(settings, Arc::clone(&self.generator))?;
        self.config = Arc::new(config);
        self.apply_streaming_settings(settings);

        for coord in self.sorted_visible() {
            self.events.push(VisibilityChanged { coord, visible: false });
        }
        self.visible.clear();
        self.host.clear();
        self.viewer = None;
        self.last_update_viewer = None;
        Ok(())
    }

    /// Block until every in-flight job (and its follow-ups) completed.
    pub fn finish_jobs(&mut self) {
        self.jobs.finish_all(&mut self.host);
        self.collect_events();
    }

    /// Replay pending scene operations into the ECS.
    pub fn apply_scene(&mut self, bindings: &mut SceneBindings, commands: &mut Commands, meshes: &mut Assets<Mesh>) {
        apply_scene_ops(&mut self.host.env.scene, bindings, commands, meshes);
    }

    #[must_use]
    pub fn host(&self) -> &ChunkHost {
        &self.host
    }

    #[must_use]
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    #[must_use]
    pub fn is_visible(&self, coord: ChunkCoord) -> bool {
        self.visible.contains(&coord)
    }

    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    #[must_use]
    pub fn chunks_visible_in_view_dst(&self) -> i32 {
        self.chunks_visible_in_view_dst
    }

    #[must_use]
    pub fn diagnostics(&self) -> StreamingDiagnostics {
        StreamingDiagnostics {
            chunks: self.host.len(),
            visible: self.visible.len(),
            in_flight: self.jobs.in_flight(),
            completed_jobs: self.jobs.completed(),
            failed_jobs: self.jobs.failed(),
            stale_completions: self.host.stale_completions(),
            triangles: self.host.env.stats.total_triangles,
        }
    }
}

/// Loads settings, wires the watcher and registers the streaming systems.
pub struct TerrainPlugin;

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        let settings = settings_loader::load_settings_from_dir(settings_loader::SETTINGS_DIR);
        let watcher = settings_loader::setup_settings_watcher(settings_loader::SETTINGS_DIR).unwrap_or_else(|e| {
            warn!("terrain settings hot-reload disabled: {e}");
            TerrainSettingsWatcher::stub()
        });

        app.insert_resource(settings)
            .insert_resource(watcher)
            .init_resource::<TerrainGeneratorHandle>()
            .init_resource::<SceneBindings>()
            .add_event::<ChunkVisibilityChanged>()
            .add_systems(Startup, setup_terrain)
            .add_systems(
                Update,
                (
                    settings_loader::check_terrain_settings_changes,
                    rebuild_on_settings_change,
                    stream_terrain,
                    sync_terrain_scene,
                )
                    .chain(),
            );
    }
}

/// Spawn the terrain root and shared material, then build the streamer.
#[allow(clippy::needless_pass_by_value)]
pub fn setup_terrain(
    mut commands: Commands,
    settings: Res<TerrainSettings>,
    generator: Res<TerrainGeneratorHandle>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let entity = commands.spawn((SpatialBundle::default(), Name::new("Terrain"))).id();
    let material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.42, 0.55, 0.32),
        perceptual_roughness: 0.95,
        ..default()
    });
    let root = TerrainRoot { entity, material };

    match TerrainStreamer::new(&settings, Arc::clone(&generator.0)) {
        Ok(streamer) => {
            info!(
                "terrain streaming ready: chunk world size {} view radius {} chunks",
                streamer.config().world_size(),
                streamer.chunks_visible_in_view_dst()
            );
            commands.insert_resource(streamer.with_scene_root(Some(root.entity), root.material.clone()));
        }
        Err(e) => error!("invalid terrain settings, streaming disabled: {e}"),
    }
    commands.insert_resource(root);
}

/// Rebuild (or create) the streamer after `TerrainSettings` changed.
#[allow(clippy::needless_pass_by_value)]
pub fn rebuild_on_settings_change(
    mut commands: Commands,
    settings: Res<TerrainSettings>,
    generator: Res<TerrainGeneratorHandle>,
    root: Option<Res<TerrainRoot>>,
    streamer: Option<ResMut<TerrainStreamer>>,
) {
    if !settings.is_changed() || settings.is_added() {
        return;
    }
    match streamer {
        Some(mut streamer) => match streamer.rebuild(&settings) {
            Ok(()) => info!("terrain streamer rebuilt from new settings"),
            Err(e) => error!("new terrain settings rejected, keeping previous: {e}"),
        },
        None => {
            let Some(root) = root else { return };
            match TerrainStreamer::new(&settings, Arc::clone(&generator.0)) {
                Ok(streamer) => {
                    commands.insert_resource(streamer.with_scene_root(Some(root.entity), root.material.clone()));
                }
                Err(e) => error!("new terrain settings rejected: {e}"),
            }
        }
    }
}

/// Feed the viewer position to the streamer and forward visibility edges.
#[allow(clippy::needless_pass_by_value)]
pub fn stream_terrain(
    streamer: Option<ResMut<TerrainStreamer>>,
    viewer: Query<&GlobalTransform, With<TerrainViewer>>,
    mut events: EventWriter<ChunkVisibilityChanged>,
    time: Res<Time>,
    mut last_log_seconds: Local<f64>,
) {
    crate::debug::record_thread_global("stream_terrain");

    let Some(mut streamer) = streamer else { return };
    let Ok(transform) = viewer.get_single() else { return };
    let position = transform.translation();

    let edges = streamer.tick(Vec2::new(position.x, position.z));
    events.send_batch(edges.into_iter().map(ChunkVisibilityChanged::from));

    let now = time.elapsed_seconds_f64();
    if now - *last_log_seconds > 1.0 {
        *last_log_seconds = now;
        info!("StreamingDiag: {}", streamer.diagnostics());
    }
}

/// Mirror the streamer's scene graph into entities and mesh assets.
#[allow(clippy::needless_pass_by_value)]
pub fn sync_terrain_scene(
    streamer: Option<ResMut<TerrainStreamer>>,
    mut bindings: ResMut<SceneBindings>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    if let Some(mut streamer) = streamer {
        streamer.apply_scene(&mut bindings, &mut commands, &mut meshes);
    }
}
