use bevy::diagnostic::{FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin};
use bevy::prelude::*;
use bevy::window::{PresentMode, Window, WindowPlugin};
use terrain_stream::chunk::TerrainPlugin;
use terrain_stream::debug::DebugDumpPlugin;
use terrain_stream::viewer::{cursor_grab, fly_viewer, viewer_look};

mod app;
use app::{log_visibility_changes, setup};

fn main() {
    let mut app = App::new();

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "terrain-stream".into(),
            position: WindowPosition::Centered(MonitorSelection::Primary),
            present_mode: PresentMode::AutoNoVsync,
            ..default()
        }),
        ..default()
    }))
    .add_plugins(FrameTimeDiagnosticsPlugin)
    .add_plugins(LogDiagnosticsPlugin::default())
    .add_plugins(TerrainPlugin)
    .add_plugins(DebugDumpPlugin);

    app.insert_resource(ClearColor(Color::srgb(0.62, 0.76, 0.92)));

    app.add_systems(Startup, setup);
    app.add_systems(Update, (cursor_grab, viewer_look, fly_viewer).chain());
    app.add_systems(Update, log_visibility_changes);

    app.run();
}
