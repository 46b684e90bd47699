use crate::synth::note::{NoteEvent, NoteSource};
use crate::synth::patch::Patch;
use crate::synth::voice::{Voice, VoiceState};

/// Read-only pool snapshot for the host's monitoring collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStatus {
    pub active: usize,
    pub releasing: usize,
    pub free: usize,
}

/// Owns the fixed voice pool and assigns incoming notes to free or stolen
/// voices.
///
/// Every voice is pre-allocated at construction; nothing here allocates
/// during playback. Pool exhaustion is resolved by the stealing policy and
/// is never an error.
pub struct VoiceAllocator {
    voices: Vec<Voice>,
    age_counter: u64,
}

impl VoiceAllocator {
    pub fn new(polyphony: usize, sample_rate: f32) -> Self {
        let voices = (0..polyphony.max(1)).map(|_| Voice::new(sample_rate)).collect();
        Self {
            voices,
            age_counter: 0,
        }
    }

    pub fn polyphony(&self) -> usize {
        self.voices.len()
    }

    pub fn status(&self) -> PoolStatus {
        let mut status = PoolStatus::default();
        for voice in &self.voices {
            match voice.state() {
                VoiceState::Active => status.active += 1,
                VoiceState::Releasing => status.releasing += 1,
                VoiceState::Free => status.free += 1,
            }
        }
        status
    }

    /// Assign a note-on to a voice: a free one if available, otherwise steal
    /// per policy (release-phase voices first, then oldest, ties broken by
    /// lowest velocity).
    pub fn trigger(&mut self, event: &NoteEvent, patch: &Patch) {
        self.age_counter += 1;
        let age = self.age_counter;

        if let Some(voice) = self
            .voices
            .iter_mut()
            .find(|voice| voice.state() == VoiceState::Free)
        {
            voice.note_on(event, patch, age);
            return;
        }

        let steal_index = self.steal_target();
        self.voices[steal_index].steal(event, patch, age);
    }

    fn steal_target(&self) -> usize {
        let mut best = 0;
        let mut best_key = (usize::MAX, u64::MAX, u8::MAX);
        for (index, voice) in self.voices.iter().enumerate() {
            let state_rank = match voice.state() {
                VoiceState::Releasing => 0,
                _ => 1,
            };
            let key = (state_rank, voice.age(), voice.velocity());
            if key < best_key {
                best_key = key;
                best = index;
            }
        }
        best
    }

    /// Release every voice sounding `note` on `track` from `source`.
    pub fn release(&mut self, track: usize, note: u8, source: NoteSource) {
        for voice in self.voices.iter_mut() {
            if voice.matches(track, note, source) {
                voice.note_off();
            }
        }
    }

    /// Add all sounding voices' samples into `output`. Voices whose
    /// envelopes finish return themselves to the free pool immediately after
    /// the sample that finishes them.
    pub fn render(&mut self, output: &mut [f32]) {
        for voice in self.voices.iter_mut() {
            if voice.state() == VoiceState::Free {
                continue;
            }
            for out in output.iter_mut() {
                *out += voice.render_sample();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::note::NoteSource;

    const SAMPLE_RATE: f32 = 48000.0;

    fn note_on(allocator: &mut VoiceAllocator, note: u8, velocity: u8) {
        let event = NoteEvent::new(0, note, velocity, true, NoteSource::External).unwrap();
        allocator.trigger(&event, &Patch::default());
    }

    #[test]
    fn pool_never_exceeds_polyphony() {
        let mut allocator = VoiceAllocator::new(8, SAMPLE_RATE);
        for note in 0..32 {
            note_on(&mut allocator, 40 + note, 100);
            let mut buffer = [0.0f32; 64];
            allocator.render(&mut buffer);
            assert!(buffer.iter().all(|s| s.is_finite()));
        }
        let status = allocator.status();
        assert_eq!(status.active + status.releasing, 8);
        assert_eq!(status.free, 0);
    }

    #[test]
    fn released_voice_returns_to_pool() {
        let mut allocator = VoiceAllocator::new(4, SAMPLE_RATE);
        note_on(&mut allocator, 60, 100);
        assert_eq!(allocator.status().active, 1);

        allocator.release(0, 60, NoteSource::External);
        assert_eq!(allocator.status().releasing, 1);

        let mut buffer = vec![0.0f32; SAMPLE_RATE as usize];
        allocator.render(&mut buffer);
        assert_eq!(allocator.status().free, 4);
    }

    #[test]
    fn oldest_voice_is_stolen_first() {
        let mut allocator = VoiceAllocator::new(2, SAMPLE_RATE);
        note_on(&mut allocator, 60, 100);
        note_on(&mut allocator, 62, 100);
        note_on(&mut allocator, 64, 100);

        // Note 60 held the oldest voice; it should be the one reassigned.
        let mut buffer = vec![0.0f32; 4800];
        allocator.render(&mut buffer);
        allocator.release(0, 60, NoteSource::External);
        assert_eq!(allocator.status().releasing, 0);
        allocator.release(0, 64, NoteSource::External);
        assert_eq!(allocator.status().releasing, 1);
    }

    #[test]
    fn releasing_voices_are_preferred_steal_targets() {
        let mut allocator = VoiceAllocator::new(2, SAMPLE_RATE);
        note_on(&mut allocator, 60, 100);
        note_on(&mut allocator, 62, 100);
        // Put the newer voice into release; it should be stolen before the
        // older but still-held note 60.
        allocator.release(0, 62, NoteSource::External);
        note_on(&mut allocator, 64, 100);

        let mut buffer = vec![0.0f32; 4800];
        allocator.render(&mut buffer);
        allocator.release(0, 60, NoteSource::External);
        assert_eq!(allocator.status().releasing, 1);
    }
}
