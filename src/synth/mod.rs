pub mod algorithm;
pub mod allocator;
pub mod engine;
pub mod envelope;
pub mod note;
pub mod operator;
pub mod params;
pub mod patch;
pub mod voice;

pub use engine::{Engine, EngineConfig};
