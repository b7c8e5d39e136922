//! Free-flying viewer camera: WASD + space/shift movement, mouse look and
//! cursor grabbing. The entity also carries `TerrainViewer`, so wherever it
//! flies the terrain streams in around it.
use bevy::input::mouse::MouseMotion;
use bevy::math::EulerRot;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, PrimaryWindow};

const MAX_PITCH_DEG: f32 = 85.0;

/// Movement and look state of the flying viewer.
#[derive(Component, Debug, Clone)]
pub struct FlyViewer {
    pub speed: f32,       // World units per second.
    pub boost: f32,       // Speed multiplier while control is held.
    pub sensitivity: f32, // Radians per 10k pixels of mouse motion.
    pub yaw: f32,
    pub pitch: f32,
}

impl Default for FlyViewer {
    fn default() -> Self {
        Self { speed: 60.0, boost: 4.0, sensitivity: 12.0, yaw: 0.0, pitch: 0.0 }
    }
}

impl FlyViewer {
    /// Apply a raw mouse delta; pitch is clamped short of straight up/down.
    pub fn apply_delta(&mut self, delta: Vec2) {
        let max_pitch = MAX_PITCH_DEG.to_radians();
        self.yaw -= delta.x * (self.sensitivity / 10000.0);
        self.pitch -= delta.y * (self.sensitivity / 10000.0);
        self.pitch = self.pitch.clamp(-max_pitch, max_pitch);
    }

    #[must_use]
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }
}

/// Which movement keys are held this frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

/// Unit (or zero) movement direction for `input`, horizontal axes taken
/// from the camera's facing projected onto the ground plane.
#[must_use]
pub fn movement_direction(forward: Vec3, right: Vec3, input: MoveInput) -> Vec3 {
    let fwd = Vec3::new(forward.x, 0.0, forward.z).normalize_or_zero();
    let right = Vec3::new(right.x, 0.0, right.z).normalize_or_zero();
    let mut dir = Vec3::ZERO;
    if input.forward {
        dir += fwd;
    }
    if input.back {
        dir -= fwd;
    }
    if input.right {
        dir += right;
    }
    if input.left {
        dir -= right;
    }
    if input.up {
        dir += Vec3::Y;
    }
    if input.down {
        dir -= Vec3::Y;
    }
    dir.normalize_or_zero()
}

#[allow(clippy::needless_pass_by_value)]
pub fn fly_viewer(
    keys: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    mut query: Query<(&mut Transform, &FlyViewer)>,
) {
    let input = MoveInput {
        forward: keys.pressed(KeyCode::KeyW),
        back: keys.pressed(KeyCode::KeyS),
        left: keys.pressed(KeyCode::KeyA),
        right: keys.pressed(KeyCode::KeyD),
        up: keys.pressed(KeyCode::Space),
        down: keys.pressed(KeyCode::ShiftLeft),
    };
    let boosted = keys.pressed(KeyCode::ControlLeft);

    for (mut transform, viewer) in &mut query {
        let dir = movement_direction(*transform.forward(), *transform.right(), input);
        let speed = if boosted { viewer.speed * viewer.boost } else { viewer.speed };
        transform.translation += dir * speed * time.delta_seconds();
    }
}

/// Mouse look, active only while the cursor is grabbed.
#[allow(clippy::needless_pass_by_value)]
pub fn viewer_look(
    windows: Query<&Window, With<PrimaryWindow>>,
    mut motion: EventReader<MouseMotion>,
    mut query: Query<(&mut Transform, &mut FlyViewer)>,
) {
    let delta: Vec2 = motion.read().map(|ev| ev.delta).sum();
    if delta == Vec2::ZERO {
        return;
    }
    let Ok(window) = windows.get_single() else { return };
    if window.cursor.visible {
        return;
    }
    for (mut transform, mut viewer) in &mut query {
        viewer.apply_delta(delta);
        transform.rotation = viewer.rotation();
    }
}

/// Left click grabs the cursor, Escape releases it.
#[allow(clippy::needless_pass_by_value)]
pub fn cursor_grab(
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
    mouse: Res<ButtonInput<MouseButton>>,
    keys: Res<ButtonInput<KeyCode>>,
) {
    let Ok(mut window) = windows.get_single_mut() else { return };
    if mouse.just_pressed(MouseButton::Left) {
        window.cursor.grab_mode = CursorGrabMode::Locked;
        window.cursor.visible = false;
    }
    if keys.just_pressed(KeyCode::Escape) {
        window.cursor.grab_mode = CursorGrabMode::None;
        window.cursor.visible = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_clamped() {
        let mut viewer = FlyViewer::default();
        viewer.apply_delta(Vec2::new(0.0, -1.0e7));
        assert!((viewer.pitch - MAX_PITCH_DEG.to_radians()).abs() < 1e-5);
        viewer.apply_delta(Vec2::new(0.0, 1.0e7));
        assert!((viewer.pitch + MAX_PITCH_DEG.to_radians()).abs() < 1e-5);
    }

    #[test]
    fn movement_ignores_camera_tilt() {
        // looking down at 45 degrees still moves along the ground
        let forward = Vec3::new(0.0, -1.0, -1.0).normalize();
        let dir = movement_direction(forward, Vec3::X, MoveInput { forward: true, ..default() });
        assert!((dir - Vec3::NEG_Z).length() < 1e-5);

        let dir = movement_direction(forward, Vec3::X, MoveInput { forward: true, back: true, ..default() });
        assert_eq!(dir, Vec3::ZERO);

        let dir = movement_direction(forward, Vec3::X, MoveInput { right: true, up: true, ..default() });
        assert!((dir.length() - 1.0).abs() < 1e-5);
        assert!(dir.x > 0.0 && dir.y > 0.0);
    }
}
