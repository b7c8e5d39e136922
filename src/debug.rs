//! Debug utilities: a worker-thread registry and an F3 dump of diagnostics,
//! entity and asset counts, memory, thread usage and terrain streaming
//! counters to a timestamped text file in `./debug-dumps/`.
use bevy::diagnostic::{Diagnostic, DiagnosticPath, DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::fs;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

use crate::chunk::streaming::{StreamingDiagnostics, TerrainStreamer};
use crate::chunk::ChunkCoord;

pub const DUMP_DIR: &str = "debug-dumps";

// Global, thread-safe collector for instrumenting background worker threads
static GLOBAL_THREAD_MAP: OnceLock<Mutex<HashMap<String, HashSet<String>>>> = OnceLock::new();

fn thread_map() -> std::sync::MutexGuard<'static, HashMap<String, HashSet<String>>> {
    let map = GLOBAL_THREAD_MAP.get_or_init(|| Mutex::new(HashMap::new()));
    map.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Record the current thread id for `system` from any thread (worker or main).
pub fn record_thread_global(system: &str) {
    let tid = format!("{:?}", std::thread::current().id());
    thread_map().entry(system.to_string()).or_default().insert(tid);
}

/// Return a snapshot of the global thread map (system -> sorted list of thread ids).
#[must_use]
pub fn snapshot_global_thread_map() -> HashMap<String, Vec<String>> {
    thread_map()
        .iter()
        .map(|(k, s)| {
            let mut v: Vec<_> = s.iter().cloned().collect();
            v.sort();
            (k.clone(), v)
        })
        .collect()
}

pub struct DebugDumpPlugin;

impl Plugin for DebugDumpPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, debug_input_system);
    }
}

fn kb_to_mb(kb: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let mb = kb as f64 / 1024.0;
    format!("{mb:.2} MB")
}

/// Everything the dump reports, gathered before formatting.
#[derive(Debug, Default)]
pub struct DumpInfo {
    pub timestamp: String,
    pub epoch_secs: u64,
    pub fps: f64,
    pub frame_time: f64,
    pub entities: usize,
    pub meshes: usize,
    pub materials: usize,
    pub cores: usize,
    pub process_memory_kb: u64,
    pub total_memory_kb: u64,
    pub used_memory_kb: u64,
    pub streaming: Option<StreamingDiagnostics>,
    pub top_chunks: Vec<(ChunkCoord, usize)>,
    pub threads: HashMap<String, Vec<String>>,
}

/// Render the dump text.
#[must_use]
pub fn format_dump(info: &DumpInfo) -> String {
    let mut out = String::new();
    writeln!(out, "Debug dump: {}", info.epoch_secs).ok();
    writeln!(out, "Timestamp: {} (epoch secs: {})", info.timestamp, info.epoch_secs).ok();
    writeln!(out, "FPS: {:.1}, frame_time: {:.4} ms", info.fps, info.frame_time * 1000.0).ok();
    writeln!(out, "Entities: {}", info.entities).ok();
    writeln!(out, "Assets: meshes={} materials={}", info.meshes, info.materials).ok();
    writeln!(out, "CPU cores (available): {}", info.cores).ok();
    writeln!(out, "Process memory: {}", kb_to_mb(info.process_memory_kb)).ok();
    writeln!(
        out,
        "System memory: total={} used={}",
        kb_to_mb(info.total_memory_kb),
        kb_to_mb(info.used_memory_kb)
    )
    .ok();

    writeln!(out, "\nTerrain streaming:").ok();
    match &info.streaming {
        Some(diag) => {
            writeln!(out, "  {diag}").ok();
        }
        None => {
            writeln!(out, "  (streamer not running)").ok();
        }
    }
    if !info.top_chunks.is_empty() {
        writeln!(out, "Top chunks by triangles:").ok();
        for (coord, tris) in &info.top_chunks {
            writeln!(out, "  {coord} -> {tris}").ok();
        }
    }

    writeln!(out, "\nGlobal thread map (systems / workers):").ok();
    if info.threads.is_empty() {
        writeln!(out, "  (no thread entries recorded)").ok();
    } else {
        let mut systems: Vec<_> = info.threads.iter().collect();
        systems.sort_by(|a, b| a.0.cmp(b.0));
        for (sys, threads) in systems {
            writeln!(out, "  {} -> threads: {}", sys, threads.join(", ")).ok();
        }
    }
    out
}

/// Write a dump when F3 is pressed.
#[allow(clippy::needless_pass_by_value)]
fn debug_input_system(
    keys: Res<ButtonInput<KeyCode>>,
    diagnostics: Option<Res<DiagnosticsStore>>,
    query_entities: Query<Entity>,
    meshes: Res<Assets<Mesh>>,
    materials: Res<Assets<StandardMaterial>>,
    streamer: Option<Res<TerrainStreamer>>,
) {
    if !keys.just_pressed(KeyCode::F3) {
        return;
    }

    let now = SystemTime::now();
    let epoch_secs = now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let dt: DateTime<Utc> = DateTime::from(now);

    let smoothed = |path: &DiagnosticPath| {
        diagnostics
            .as_ref()
            .and_then(|d| d.get(path))
            .and_then(Diagnostic::smoothed)
            .unwrap_or(0.0)
    };

    let mut sys = System::new_all();
    sys.refresh_all();
    let process_memory_kb = sys.process(Pid::from_u32(std::process::id())).map_or(0, ProcessExt::memory);

    let info = DumpInfo {
        timestamp: dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        epoch_secs,
        fps: smoothed(&FrameTimeDiagnosticsPlugin::FPS),
        frame_time: smoothed(&FrameTimeDiagnosticsPlugin::FRAME_TIME),
        entities: query_entities.iter().count(),
        meshes: meshes.len(),
        materials: materials.len(),
        cores: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        process_memory_kb,
        total_memory_kb: sys.total_memory(),
        used_memory_kb: sys.used_memory(),
        streaming: streamer.as_ref().map(|s| s.diagnostics()),
        top_chunks: streamer.as_ref().map(|s| s.host().env.stats.top_chunks(10)).unwrap_or_default(),
        threads: snapshot_global_thread_map(),
    };

    let fname = format!("{DUMP_DIR}/debug-{epoch_secs}.txt");
    if let Err(e) = fs::create_dir_all(DUMP_DIR) {
        error!("debug dump: failed to create dir '{DUMP_DIR}': {e}");
        return;
    }
    if let Err(e) = fs::write(&fname, format_dump(&info)) {
        error!("debug dump: failed to write {fname}: {e}");
    } else {
        info!("wrote debug dump: {fname}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_threads_per_system() {
        record_thread_global("debug_test_system");
        let snapshot = snapshot_global_thread_map();
        let threads = &snapshot["debug_test_system"];
        assert!(threads.contains(&format!("{:?}", std::thread::current().id())));
    }

    #[test]
    fn dump_lists_streaming_counters_and_chunks() {
        let info = DumpInfo {
            streaming: Some(StreamingDiagnostics { chunks: 25, visible: 21, ..Default::default() }),
            top_chunks: vec![(ChunkCoord::new(1, -2), 4608)],
            ..Default::default()
        };
        let text = format_dump(&info);
        assert!(text.contains("chunks=25 visible=21"));
        assert!(text.contains("(1, -2) -> 4608"));
        assert!(text.contains("(no thread entries recorded)"));
    }
}
