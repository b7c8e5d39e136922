//! Startup systems for the viewer application: lights and the flying
//! camera that drives terrain streaming.
use bevy::math::EulerRot;
use bevy::prelude::*;
use terrain_stream::chunk::{ChunkVisibilityChanged, TerrainViewer};
use terrain_stream::settings::TerrainSettings;
use terrain_stream::viewer::FlyViewer;

/// Spawn a sun, ambient light and the viewer camera above the terrain.
#[allow(clippy::needless_pass_by_value)]
pub fn setup(mut commands: Commands, settings: Res<TerrainSettings>) {
    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            illuminance: 9000.0,
            shadows_enabled: false,
            ..default()
        },
        transform: Transform::from_rotation(Quat::from_euler(EulerRot::YXZ, 0.6, -0.9, 0.0)),
        ..default()
    });

    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.72, 0.78, 0.90),
        brightness: 300.0,
    });

    let start_height = settings.height_map.max_height() + 20.0;
    let viewer = FlyViewer { pitch: -0.35, ..default() };
    commands.spawn((
        Camera3dBundle {
            transform: Transform::from_xyz(0.0, start_height, 0.0).with_rotation(viewer.rotation()),
            ..default()
        },
        viewer,
        TerrainViewer,
    ));
}

/// Log chunk visibility edges at debug level.
pub fn log_visibility_changes(mut events: EventReader<ChunkVisibilityChanged>) {
    for event in events.read() {
        debug!("chunk {} visible={}", event.coord, event.visible);
    }
}
