use crossbeam_channel::{bounded, Receiver, Sender};

use crate::synth::note::NoteEvent;
use crate::synth::params::{ParameterId, ParameterSet};

/// Messages from the control plane (UI, sequencer, MIDI) to the engine.
///
/// The engine drains its receiver in FIFO order at the start of every audio
/// buffer, before any sample of that buffer renders, so a note-on and the
/// parameter locks sent just before it always apply together.
#[derive(Debug, Clone)]
pub enum ControlMsg {
    NoteOn {
        event: NoteEvent,
        /// Per-step parameter locks: transient overrides applied to a copy
        /// of the track patch, only for the voice this note triggers.
        plocks: Vec<(ParameterId, f32)>,
    },
    NoteOff {
        event: NoteEvent,
    },
    SetParameter {
        track: usize,
        id: ParameterId,
        normalized: f32,
    },
    LoadParameterSet {
        track: usize,
        set: ParameterSet,
    },
    SetMasterVolume(f32),
}

/// Default capacity of the control queue. Bounded so a runaway control
/// thread back-pressures instead of growing without limit.
pub const CONTROL_QUEUE_CAPACITY: usize = 1024;

/// Build the control channel connecting bridges/UI to an engine.
pub fn control_channel() -> (Sender<ControlMsg>, Receiver<ControlMsg>) {
    bounded(CONTROL_QUEUE_CAPACITY)
}
