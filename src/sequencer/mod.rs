pub mod bridge;
pub mod pattern;

pub use bridge::{StepEvent, TriggerBridge};
pub use pattern::{Pattern, Step, StepScheduler};
