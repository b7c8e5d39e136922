pub mod setup;

pub use setup::{log_visibility_changes, setup};
