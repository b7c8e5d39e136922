//! Terrain settings loading and hot-reloading.
//!
//! Settings are loaded from RON files in the `data/settings` directory. If multiple
//! RON files are present, the first successfully parsed `TerrainSettings` is used.
//! If no RON files are found or none parse, default settings are used.
//!
//! Hot reloads are stricter: the first file is parsed again and any read or
//! parse error keeps the live settings, so a half-saved file never resets the
//! terrain to defaults.
use crate::error::TerrainError;
use crate::ron_loader::{load_ron_files, ron_file_paths, setup_ron_watcher};
use crate::settings::TerrainSettings;
use bevy::prelude::*;

pub const SETTINGS_DIR: &str = "data/settings";

#[derive(Resource)]
pub struct TerrainSettingsWatcher(pub crate::ron::RonWatcher);

impl TerrainSettingsWatcher {
    #[must_use]
    pub fn stub() -> Self {
        TerrainSettingsWatcher(crate::ron::RonWatcher::stub())
    }

    /// Take the changed flag, resetting it. Recovers from a poisoned mutex.
    pub fn take_changed(&self) -> bool {
        let mut flag = match self.0.changed.lock() {
            Ok(flag) => flag,
            Err(poisoned) => {
                warn!("settings watcher mutex poisoned, recovering");
                poisoned.into_inner()
            }
        };
        std::mem::replace(&mut *flag, false)
    }
}

/// Load settings from `path` (directory). If none exist the `Default` is used.
///
/// # Example
/// ```
/// let settings = terrain_stream::settings::loader::load_settings_from_dir("data/settings");
/// assert!(!settings.detail_levels.is_empty());
/// ```
#[must_use]
pub fn load_settings_from_dir(path: &str) -> TerrainSettings {
    let items: Vec<TerrainSettings> = load_ron_files(path);
    items.into_iter().next().unwrap_or_else(TerrainSettings::defaults)
}

/// Parse a single settings document.
///
/// # Errors
/// `TerrainError::Settings` with the parser's position on malformed input.
pub fn parse_settings(source: &str) -> Result<TerrainSettings, TerrainError> {
    Ok(ron::from_str(source)?)
}

/// Re-read the first settings file in `path` into `current`.
///
/// Returns whether `current` changed. An empty directory leaves it as is.
///
/// # Errors
/// `Io` or `Settings` when the file cannot be read or parsed; `current` is
/// untouched in that case.
pub fn reload_settings(path: &str, current: &mut TerrainSettings) -> Result<bool, TerrainError> {
    let Some(file) = ron_file_paths(path).into_iter().next() else {
        return Ok(false);
    };
    let reloaded = parse_settings(&std::fs::read_to_string(file)?)?;
    if reloaded == *current {
        return Ok(false);
    }
    *current = reloaded;
    Ok(true)
}

/// Create a watcher for the settings directory (hot-reload).
///
/// # Errors
/// Returns a `notify::Error` if the directory cannot be watched.
pub fn setup_settings_watcher(path: &str) -> Result<TerrainSettingsWatcher, notify::Error> {
    setup_ron_watcher(path).map(TerrainSettingsWatcher)
}

/// Reload the settings resource when the watched files change.
///
/// The streamer notices the resource change and rebuilds itself
/// (see `chunk::streaming::rebuild_on_settings_change`).
#[allow(clippy::needless_pass_by_value)]
pub fn check_terrain_settings_changes(
    watcher: Res<TerrainSettingsWatcher>,
    mut settings: ResMut<TerrainSettings>,
) {
    if !watcher.take_changed() {
        return;
    }
    // writes through ResMut mark the resource changed
    let mut candidate = (*settings).clone();
    match reload_settings(SETTINGS_DIR, &mut candidate) {
        Ok(true) => {
            info!("terrain settings changed, reloading");
            *settings = candidate;
        }
        Ok(false) => {}
        Err(e) => warn!("keeping current terrain settings: {e}"),
    }
}
