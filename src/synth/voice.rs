use crate::synth::algorithm::{AlgorithmDefinition, OPERATOR_COUNT};
use crate::synth::envelope::{EnvelopeGenerator, TrigMode};
use crate::synth::note::{note_to_frequency, NoteEvent, NoteSource};
use crate::synth::operator::Operator;
use crate::synth::patch::Patch;

/// Fade length applied to a stolen voice before its pending note starts.
/// Short enough to sit below perceptual onset jitter, long enough to
/// avoid a click from the hard cut.
const STEAL_FADE_SECONDS: f32 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    #[default]
    Free,
    Active,
    Releasing,
}

#[derive(Debug, Clone, Copy)]
struct PendingNote {
    event: NoteEvent,
    patch: Patch,
}

/// One sounding note: 4 operators, their envelopes, an amplitude envelope
/// and the routing algorithm, rendered one summed sample per call.
///
/// Owned exclusively by the allocator; operators and envelopes are never
/// shared across voices.
pub struct Voice {
    operators: [Operator; OPERATOR_COUNT],
    envelopes: [EnvelopeGenerator; OPERATOR_COUNT],
    amp_envelope: EnvelopeGenerator,
    algorithm: &'static AlgorithmDefinition,
    previous_outputs: [f32; OPERATOR_COUNT],
    frequencies: [f32; OPERATOR_COUNT],
    mix: f32,
    velocity_scale: f32,
    state: VoiceState,
    track: usize,
    note_number: u8,
    velocity: u8,
    source: Option<NoteSource>,
    age: u64,
    sample_rate: f32,
    fade_total: u32,
    fade_remaining: u32,
    pending: Option<PendingNote>,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            operators: Default::default(),
            envelopes: [
                EnvelopeGenerator::new(),
                EnvelopeGenerator::new(),
                EnvelopeGenerator::new(),
                EnvelopeGenerator::new(),
            ],
            amp_envelope: EnvelopeGenerator::new(),
            algorithm: AlgorithmDefinition::get(1).expect("algorithm 1 exists"),
            previous_outputs: [0.0; OPERATOR_COUNT],
            frequencies: [0.0; OPERATOR_COUNT],
            mix: 0.0,
            velocity_scale: 0.0,
            state: VoiceState::Free,
            track: 0,
            note_number: 0,
            velocity: 0,
            source: None,
            age: 0,
            sample_rate,
            fade_total: 0,
            fade_remaining: 0,
            pending: None,
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    /// Whether this voice currently answers for `note` on `track` from the
    /// given source (a stolen voice answers for its pending note instead).
    pub fn matches(&self, track: usize, note: u8, source: NoteSource) -> bool {
        if let Some(pending) = &self.pending {
            return pending.event.track == track
                && pending.event.note == note
                && pending.event.source == source;
        }
        self.state != VoiceState::Free
            && self.track == track
            && self.note_number == note
            && self.source == Some(source)
    }

    /// Activate the voice for a note, configuring operators and envelopes
    /// from the patch.
    pub fn note_on(&mut self, event: &NoteEvent, patch: &Patch, age: u64) {
        self.age = age;
        self.activate(event, patch);
    }

    /// Reassign a sounding voice: fade the current content out over a couple
    /// of milliseconds, then start the pending note. The new note's onset is
    /// delayed by the fade length.
    pub fn steal(&mut self, event: &NoteEvent, patch: &Patch, age: u64) {
        self.age = age;
        self.fade_total = ((STEAL_FADE_SECONDS * self.sample_rate) as u32).max(1);
        self.fade_remaining = self.fade_total;
        self.pending = Some(PendingNote {
            event: *event,
            patch: *patch,
        });
    }

    fn activate(&mut self, event: &NoteEvent, patch: &Patch) {
        self.track = event.track;
        self.note_number = event.note;
        self.velocity = event.velocity;
        self.source = Some(event.source);
        self.velocity_scale = patch.velocity_to_scale(event.velocity);
        self.mix = patch.mix;
        // An out-of-table id keeps the previous routing rather than failing
        // the trigger.
        self.algorithm = AlgorithmDefinition::get(patch.algorithm).unwrap_or(self.algorithm);

        let tune_offset = patch.tune + patch.fine / 100.0;
        // Scale quantization shapes the pitch only; the voice keeps keying
        // on the raw note so the matching note-off always finds it.
        let note = patch.quantize_note(event.note) as f32;
        let carrier_frequency = note_to_frequency(note + tune_offset);
        // Key tracking interpolates the note the modulators follow between a
        // fixed C4 reference and the played key.
        let tracked = 60.0 + (note - 60.0) * patch.key_tracking.clamp(0.0, 1.0);
        let modulator_frequency = note_to_frequency(tracked + tune_offset);
        self.frequencies = [
            carrier_frequency,
            modulator_frequency,
            modulator_frequency,
            modulator_frequency,
        ];

        let ratio_b = patch.ratio_b + patch.offset_b;
        let tunings: [(f32, f32); OPERATOR_COUNT] = [
            (patch.ratio_c, 0.0),
            (patch.ratio_a + patch.offset_a, patch.harmony * 100.0),
            (ratio_b, patch.detune * 0.5),
            (ratio_b, -patch.detune * 0.5),
        ];
        let levels = [1.0, patch.level_a, patch.level_b, patch.level_b];
        for (i, operator) in self.operators.iter_mut().enumerate() {
            operator.set_ratio(tunings[i].0);
            operator.set_fine_detune(tunings[i].1);
            operator.output_level = levels[i];
            operator.feedback_amount = patch.feedback;
            if patch.phase_reset {
                operator.reset();
            } else {
                operator.apply_pending();
            }
        }
        if patch.phase_reset {
            self.previous_outputs = [0.0; OPERATOR_COUNT];
        }

        let shapes: [(f32, f32, f32, TrigMode, f32); OPERATOR_COUNT] = [
            // The carrier has no modulation envelope of its own; its level
            // is shaped by the amplitude envelope.
            (0.0, 0.0, 1.0, TrigMode::Gate, 0.0),
            (patch.attack_a, patch.decay_a, patch.end_a, patch.trig_mode, patch.env_delay),
            (patch.attack_b, patch.decay_b, patch.end_b, patch.trig_mode, patch.env_delay),
            (patch.attack_b, patch.decay_b, patch.end_b, patch.trig_mode, patch.env_delay),
        ];
        for (i, envelope) in self.envelopes.iter_mut().enumerate() {
            let (attack, decay, end, mode, delay) = shapes[i];
            envelope.attack_time = attack;
            envelope.decay_time = decay;
            envelope.end_level = end;
            envelope.sustain_level = end;
            envelope.release_time = decay.max(0.01);
            envelope.delay_time = delay;
            envelope.trig_mode = mode;
            envelope.note_on();
        }

        self.amp_envelope.attack_time = patch.amp_attack;
        self.amp_envelope.decay_time = patch.amp_decay;
        self.amp_envelope.end_level = patch.amp_sustain;
        self.amp_envelope.sustain_level = patch.amp_sustain;
        self.amp_envelope.release_time = patch.amp_release;
        self.amp_envelope.delay_time = 0.0;
        self.amp_envelope.trig_mode = TrigMode::Gate;
        self.amp_envelope.note_on();

        self.state = VoiceState::Active;
    }

    /// Begin the release stage on every gate-mode envelope.
    pub fn note_off(&mut self) {
        if self.state != VoiceState::Active {
            return;
        }
        for envelope in self.envelopes.iter_mut() {
            envelope.note_off();
        }
        self.amp_envelope.note_off();
        self.state = VoiceState::Releasing;
    }

    /// True once every envelope has reached idle and the voice can return to
    /// the free pool.
    pub fn is_finished(&self) -> bool {
        self.amp_envelope.is_idle() && self.pending.is_none()
    }

    fn reset_to_free(&mut self) {
        self.state = VoiceState::Free;
        self.source = None;
        self.previous_outputs = [0.0; OPERATOR_COUNT];
        self.fade_remaining = 0;
        self.pending = None;
    }

    /// Render one summed carrier sample.
    ///
    /// Always returns a finite value: a non-finite result trips the fuse and
    /// resets the voice to the free pool.
    pub fn render_sample(&mut self) -> f32 {
        if self.state == VoiceState::Free {
            return 0.0;
        }

        let dt = 1.0 / self.sample_rate;
        let mut envelope_levels = [0.0f32; OPERATOR_COUNT];
        for (level, envelope) in envelope_levels.iter_mut().zip(self.envelopes.iter_mut()) {
            *level = envelope.advance(dt);
        }
        let amp = self.amp_envelope.advance(dt);

        let sample = self.algorithm.render_sample(
            &mut self.operators,
            &self.frequencies,
            &envelope_levels,
            &mut self.previous_outputs,
            self.sample_rate,
            self.mix,
        );
        let mut out = sample * amp * self.velocity_scale;

        if self.fade_remaining > 0 {
            self.fade_remaining -= 1;
            out *= self.fade_remaining as f32 / self.fade_total as f32;
            if self.fade_remaining == 0 {
                if let Some(pending) = self.pending.take() {
                    self.activate(&pending.event, &pending.patch);
                }
                return out;
            }
        }

        if !out.is_finite() {
            self.reset_to_free();
            return 0.0;
        }

        if self.state == VoiceState::Releasing && self.is_finished() {
            self.reset_to_free();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::note::NoteSource;

    const SAMPLE_RATE: f32 = 48000.0;

    fn trigger(voice: &mut Voice, note: u8) {
        let event = NoteEvent::new(0, note, 100, true, NoteSource::External).unwrap();
        voice.note_on(&event, &Patch::default(), 1);
    }

    #[test]
    fn voice_lifecycle_reaches_free_after_release() {
        let mut voice = Voice::new(SAMPLE_RATE);
        trigger(&mut voice, 60);
        assert_eq!(voice.state(), VoiceState::Active);

        for _ in 0..1000 {
            voice.render_sample();
        }
        voice.note_off();
        assert_eq!(voice.state(), VoiceState::Releasing);

        // Default amp release is 0.25 s; one second is ample.
        for _ in 0..(SAMPLE_RATE as usize) {
            voice.render_sample();
        }
        assert_eq!(voice.state(), VoiceState::Free);
        assert!(voice.is_finished());
    }

    #[test]
    fn rendered_output_is_audible_and_finite() {
        let mut voice = Voice::new(SAMPLE_RATE);
        trigger(&mut voice, 60);
        let mut peak = 0.0f32;
        for _ in 0..4800 {
            let sample = voice.render_sample();
            assert!(sample.is_finite());
            peak = peak.max(sample.abs());
        }
        assert!(peak > 0.01, "voice rendered silence, peak {peak}");
    }

    #[test]
    fn stolen_voice_fades_then_plays_pending_note() {
        let mut voice = Voice::new(SAMPLE_RATE);
        trigger(&mut voice, 60);
        for _ in 0..1000 {
            voice.render_sample();
        }

        let event = NoteEvent::new(0, 72, 100, true, NoteSource::External).unwrap();
        voice.steal(&event, &Patch::default(), 2);
        assert!(voice.matches(0, 72, NoteSource::External));

        // Run past the fade; the pending note must have taken over.
        for _ in 0..(SAMPLE_RATE * 0.01) as usize {
            voice.render_sample();
        }
        assert_eq!(voice.state(), VoiceState::Active);
        assert!(voice.matches(0, 72, NoteSource::External));
    }

    #[test]
    fn quantized_pitch_keeps_raw_note_identity() {
        use crate::synth::patch::ScaleKind;

        let mut voice = Voice::new(SAMPLE_RATE);
        let mut patch = Patch::default();
        patch.scale = ScaleKind::Major;

        // C# snaps to C for pitch, but the voice still answers for the
        // note number it was triggered with.
        let event = NoteEvent::new(0, 61, 100, true, NoteSource::External).unwrap();
        voice.note_on(&event, &patch, 1);
        assert!(voice.matches(0, 61, NoteSource::External));
        assert!(!voice.matches(0, 60, NoteSource::External));
    }
}
