use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Where a note event originated. Stored on the voice so a note-off only
/// releases notes started by the same collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteSource {
    Sequencer,
    External,
}

/// A validated note-on/off event addressed to one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub track: usize,
    pub note: u8,
    pub velocity: u8,
    pub is_on: bool,
    pub source: NoteSource,
}

impl NoteEvent {
    /// Build an event, rejecting note numbers outside the MIDI range.
    /// Velocity is clamped rather than rejected.
    pub fn new(
        track: usize,
        note: u8,
        velocity: u8,
        is_on: bool,
        source: NoteSource,
    ) -> Result<Self, Error> {
        if note > 127 {
            return Err(Error::InvalidNote(note));
        }
        Ok(Self {
            track,
            note,
            velocity: velocity.min(127),
            is_on,
            source,
        })
    }
}

/// Equal-tempered frequency for a (possibly fractional) MIDI note number,
/// A4 = 440 Hz.
pub fn note_to_frequency(note: f32) -> f32 {
    440.0 * 2.0_f32.powf((note - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_reference_points() {
        assert!((note_to_frequency(69.0) - 440.0).abs() < 1e-3);
        assert!((note_to_frequency(60.0) - 261.6256).abs() < 1e-2);
        assert!((note_to_frequency(81.0) - 880.0).abs() < 1e-2);
    }

    #[test]
    fn velocity_is_clamped_not_rejected() {
        let event = NoteEvent::new(0, 60, 200, true, NoteSource::External).unwrap();
        assert_eq!(event.velocity, 127);
    }
}
