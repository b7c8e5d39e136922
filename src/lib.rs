pub mod chunk;
pub mod debug;
pub mod error;
pub mod generation;
pub mod jobs;
pub mod ron;
pub use crate::ron as ron_loader;
pub mod scene;
pub mod settings;
pub mod viewer;
