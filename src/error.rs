//! Error types for terrain configuration and generation.
//!
//! Configuration errors are reported while building a `ChunkConfig` so a
//! chunk can never be constructed from a table it cannot reason about.
//! Generation errors are produced inside worker jobs and surfaced to the
//! owning thread through `jobs::JobError`.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("detail level table is empty")]
    EmptyDetailLevels,

    #[error("detail level {index} threshold {threshold} is below the previous threshold {previous}")]
    UnsortedDetailLevels { index: usize, threshold: f32, previous: f32 },

    #[error("detail level {index} has an invalid visible distance threshold {threshold}")]
    InvalidThreshold { index: usize, threshold: f32 },

    #[error("lod {lod} is not supported (max {max})")]
    UnsupportedLod { lod: u8, max: u8 },

    #[error("collider lod index {index} is out of range for {len} detail levels")]
    ColliderLodOutOfRange { index: usize, len: usize },

    #[error("chunk size index {index} is out of range for {len} supported chunk sizes")]
    InvalidChunkSize { index: usize, len: usize },

    #[error("mesh scale {scale} must be finite and greater than zero")]
    InvalidMeshScale { scale: f32 },

    #[error("view distance spans {radius} chunks, more than the supported {max}")]
    ViewRadiusTooLarge { radius: f32, max: i32 },

    #[error("lod {lod} step {step} does not divide a line of {verts} vertices")]
    LodStepMismatch { lod: u8, step: usize, verts: usize },

    #[error("height field holds {actual} values, expected {expected}")]
    HeightFieldSize { expected: usize, actual: usize },

    #[error("failed to parse settings: {0}")]
    Settings(#[from] ron::error::SpannedError),

    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
}
