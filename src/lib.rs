//! A 4-operator FM synthesis voice engine.
//!
//! The DSP core lives in [`synth`]: sine [operators](synth::operator) wired
//! through one of 8 fixed routing [algorithms](synth::algorithm), shaped by
//! per-operator [envelopes](synth::envelope), played by a fixed pool of
//! [voices](synth::voice) behind the [engine](synth::engine).
//!
//! Control traffic (notes, parameter changes, per-step parameter locks)
//! flows through the [`control`] channel: the sequencer layer and any UI or
//! MIDI collaborator enqueue [`control::ControlMsg`]s, which the engine
//! drains in FIFO order at every buffer boundary before rendering. The
//! render path itself never locks, allocates or performs I/O.
//!
//! The [`sequencer`] module provides the sample-accurate step scheduler and
//! the trigger bridge that validates incoming events.

pub mod control;
pub mod error;
pub mod sequencer;
pub mod synth;

#[cfg(feature = "native")]
pub mod audio;
#[cfg(feature = "native")]
pub mod input;

pub use control::{control_channel, ControlMsg};
pub use error::Error;
pub use synth::{Engine, EngineConfig};
