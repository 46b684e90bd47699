use crossbeam_channel::Sender;

use crate::control::ControlMsg;
use crate::error::Error;
use crate::synth::note::{NoteEvent, NoteSource};
use crate::synth::params::ParameterId;

/// A sequencer step event as handed over by the pattern scheduler (or any
/// other step source). `note == None` means the step carries no trig.
#[derive(Debug, Clone, Default)]
pub struct StepEvent {
    pub step: usize,
    pub track: usize,
    pub note: Option<u8>,
    pub velocity: Option<u8>,
    pub plocks: Vec<(ParameterId, f32)>,
}

/// Default velocity for steps that don't specify one.
pub const DEFAULT_STEP_VELOCITY: u8 = 100;

/// Stateless translator from sequencer/MIDI events into engine control
/// messages.
///
/// Malformed events (note out of MIDI range, unknown track) are dropped
/// with a diagnostic and reported to the caller; they never reach the
/// render path.
#[derive(Debug, Clone)]
pub struct TriggerBridge {
    sender: Sender<ControlMsg>,
    track_count: usize,
}

impl TriggerBridge {
    pub fn new(sender: Sender<ControlMsg>, track_count: usize) -> Self {
        Self {
            sender,
            track_count,
        }
    }

    fn check_track(&self, track: usize) -> Result<(), Error> {
        if track < self.track_count {
            Ok(())
        } else {
            Err(Error::UnknownTrack(track))
        }
    }

    /// Translate one step event. Parameter locks are sent with the note-on
    /// message itself, so they are applied atomically with it at the next
    /// buffer boundary.
    pub fn on_step_event(&self, event: StepEvent) -> Result<(), Error> {
        self.check_track(event.track).inspect_err(|_| {
            log::warn!("step event dropped: unknown track {}", event.track);
        })?;
        let Some(note) = event.note else {
            return Ok(()); // trigless step
        };
        let velocity = event.velocity.unwrap_or(DEFAULT_STEP_VELOCITY);
        let note_event = NoteEvent::new(event.track, note, velocity, true, NoteSource::Sequencer)
            .inspect_err(|_| {
                log::warn!("step event dropped: note {note} out of range");
            })?;
        self.sender.try_send(ControlMsg::NoteOn {
            event: note_event,
            plocks: event.plocks,
        })?;
        Ok(())
    }

    /// End the note a previous step started (gate length expired).
    pub fn on_step_release(&self, track: usize, note: u8) -> Result<(), Error> {
        self.check_track(track)?;
        let event = NoteEvent::new(track, note, 0, false, NoteSource::Sequencer)?;
        self.sender.try_send(ControlMsg::NoteOff { event })?;
        Ok(())
    }

    /// Translate an external (MIDI-like) note event. The channel addresses
    /// the track directly.
    pub fn on_external_note(
        &self,
        is_on: bool,
        note: u8,
        velocity: u8,
        channel: u8,
    ) -> Result<(), Error> {
        let track = channel as usize;
        self.check_track(track).inspect_err(|_| {
            log::warn!("external note dropped: no track for channel {channel}");
        })?;
        let event = NoteEvent::new(track, note, velocity, is_on, NoteSource::External)
            .inspect_err(|_| {
                log::warn!("external note dropped: note {note} out of range");
            })?;
        let msg = if is_on {
            ControlMsg::NoteOn {
                event,
                plocks: Vec::new(),
            }
        } else {
            ControlMsg::NoteOff { event }
        };
        self.sender.try_send(msg)?;
        Ok(())
    }

    /// Forward a normalized parameter change from UI/automation.
    pub fn set_parameter(
        &self,
        track: usize,
        id: ParameterId,
        normalized: f32,
    ) -> Result<(), Error> {
        self.check_track(track)?;
        self.sender.try_send(ControlMsg::SetParameter {
            track,
            id,
            normalized,
        })?;
        Ok(())
    }
}
