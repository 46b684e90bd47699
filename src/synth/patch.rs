use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, FromRepr};

use crate::synth::envelope::TrigMode;
use crate::synth::params::{ParameterId, ParameterSet};

/// Note quantization scales for incoming triggers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter,
    EnumString, FromRepr,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ScaleKind {
    #[default]
    Chromatic,
    Major,
    Minor,
    MajorPentatonic,
    MinorPentatonic,
}

impl ScaleKind {
    fn intervals(&self) -> &'static [u8] {
        match self {
            ScaleKind::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            ScaleKind::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleKind::Minor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleKind::MajorPentatonic => &[0, 2, 4, 7, 9],
            ScaleKind::MinorPentatonic => &[0, 3, 5, 7, 10],
        }
    }

    /// Snap a note down to the nearest scale degree for the given root
    /// (0 = C). Chromatic is the identity. Notes that would snap below 0
    /// clamp to the bottom of the MIDI range.
    pub fn quantize(&self, note: u8, root: u8) -> u8 {
        let relative = (note as i32 - root as i32).rem_euclid(12);
        let degree = self
            .intervals()
            .iter()
            .rev()
            .find(|&&interval| interval as i32 <= relative)
            .map(|&interval| interval as i32)
            .unwrap_or(0);
        (note as i32 - (relative - degree)).clamp(0, 127) as u8
    }
}

/// The DSP-domain value object for one track: everything a voice needs to
/// configure its operators and envelopes on note-on.
///
/// A `Patch` is plain copyable data. The engine keeps one per track; a
/// triggered step with parameter locks works on a transient copy, so locks
/// never write back into the track's base values.
#[derive(Debug, Clone, Copy)]
pub struct Patch {
    /// Algorithm id, 1-8.
    pub algorithm: u8,
    pub ratio_c: f32,
    pub ratio_a: f32,
    pub ratio_b: f32,
    /// Interval shift of operator A, in semitones.
    pub harmony: f32,
    /// Cents spread between the B1/B2 pair (split ± around ratio B).
    pub detune: f32,
    /// Feedback amount applied to the algorithm's feedback operator.
    pub feedback: f32,
    /// Crossfade between the algorithm's X and Y carrier buses.
    pub mix: f32,
    pub attack_a: f32,
    pub decay_a: f32,
    pub end_a: f32,
    pub level_a: f32,
    pub attack_b: f32,
    pub decay_b: f32,
    pub end_b: f32,
    pub level_b: f32,
    /// Onset delay before the modulator envelopes start, in seconds.
    pub env_delay: f32,
    pub trig_mode: TrigMode,
    pub phase_reset: bool,
    /// 0 = modulators stay pinned to a C4 reference, 1 = full key tracking.
    pub key_tracking: f32,
    /// Additive ratio offsets for A and the B pair.
    pub offset_a: f32,
    pub offset_b: f32,
    pub velocity_sensitivity: f32,
    pub scale: ScaleKind,
    /// Scale root, 0-11 (0 = C).
    pub root: u8,
    /// Coarse tune in semitones.
    pub tune: f32,
    /// Fine tune in cents.
    pub fine: f32,
    pub amp_attack: f32,
    pub amp_decay: f32,
    pub amp_sustain: f32,
    pub amp_release: f32,
}

impl Patch {
    /// Map one normalized value onto its DSP field. Unknown values cannot
    /// occur (the id enum is closed); out-of-range input is clamped by the
    /// parameter's curve.
    pub fn apply(&mut self, id: ParameterId, normalized: f32) {
        let value = id.curve().map(normalized);
        match id {
            ParameterId::Algorithm => self.algorithm = value as u8 + 1,
            ParameterId::RatioC => self.ratio_c = value,
            ParameterId::RatioA => self.ratio_a = value,
            ParameterId::RatioB => self.ratio_b = value,
            ParameterId::Harmony => self.harmony = value,
            ParameterId::Detune => self.detune = value,
            ParameterId::Feedback => self.feedback = value,
            ParameterId::Mix => self.mix = value,
            ParameterId::AttackA => self.attack_a = value,
            ParameterId::DecayA => self.decay_a = value,
            ParameterId::EndA => self.end_a = value,
            ParameterId::LevelA => self.level_a = value,
            ParameterId::AttackB => self.attack_b = value,
            ParameterId::DecayB => self.decay_b = value,
            ParameterId::EndB => self.end_b = value,
            ParameterId::LevelB => self.level_b = value,
            ParameterId::Delay => self.env_delay = value,
            ParameterId::TrigMode => {
                self.trig_mode = TrigMode::from_repr(value as usize).unwrap_or_default()
            }
            ParameterId::PhaseReset => self.phase_reset = value >= 1.0,
            ParameterId::KeyTracking => self.key_tracking = value,
            ParameterId::OffsetA => self.offset_a = value,
            ParameterId::OffsetB => self.offset_b = value,
            ParameterId::VelocitySensitivity => self.velocity_sensitivity = value,
            ParameterId::Scale => {
                self.scale = ScaleKind::from_repr(value as usize).unwrap_or_default()
            }
            ParameterId::Root => self.root = value as u8,
            ParameterId::Tune => self.tune = value,
            ParameterId::Fine => self.fine = value,
            ParameterId::AmpAttack => self.amp_attack = value,
            ParameterId::AmpDecay => self.amp_decay = value,
            ParameterId::AmpSustain => self.amp_sustain = value,
            ParameterId::AmpRelease => self.amp_release = value,
        }
    }

    /// Map a whole preset record onto this patch. Ids absent from the set
    /// keep their current values.
    pub fn apply_set(&mut self, set: &ParameterSet) {
        for (id, normalized) in set.iter() {
            self.apply(id, normalized);
        }
    }

    /// Quantize an incoming note number to the patch's scale and root.
    pub fn quantize_note(&self, note: u8) -> u8 {
        self.scale.quantize(note.min(127), self.root)
    }

    /// Gain factor for a MIDI velocity. Sensitivity 0 plays every note at
    /// full level; 1 follows the velocity curve entirely.
    pub fn velocity_to_scale(&self, velocity: u8) -> f32 {
        let normalized = (velocity.clamp(1, 127) as f32 / 127.0).powf(1.5);
        1.0 + self.velocity_sensitivity.clamp(0.0, 1.0) * (normalized - 1.0)
    }
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            algorithm: 1,
            ratio_c: 1.0,
            ratio_a: 1.0,
            ratio_b: 1.0,
            harmony: 0.0,
            detune: 0.0,
            feedback: 0.0,
            mix: 0.0,
            attack_a: 0.005,
            decay_a: 0.3,
            end_a: 0.0,
            level_a: 0.5,
            attack_b: 0.005,
            decay_b: 0.3,
            end_b: 0.0,
            level_b: 0.5,
            env_delay: 0.0,
            trig_mode: TrigMode::Gate,
            phase_reset: true,
            key_tracking: 1.0,
            offset_a: 0.0,
            offset_b: 0.0,
            velocity_sensitivity: 1.0,
            scale: ScaleKind::Chromatic,
            root: 0,
            tune: 0.0,
            fine: 0.0,
            amp_attack: 0.005,
            amp_decay: 0.1,
            amp_sustain: 0.8,
            amp_release: 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_parameter_round_trip() {
        let mut patch = Patch::default();
        patch.apply(ParameterId::RatioC, 0.0);
        assert!((patch.ratio_c - 0.5).abs() < 1e-4);
        patch.apply(ParameterId::RatioC, 1.0);
        assert!((patch.ratio_c - 32.0).abs() < 1e-3);
    }

    #[test]
    fn algorithm_parameter_maps_to_one_through_eight() {
        let mut patch = Patch::default();
        patch.apply(ParameterId::Algorithm, 0.0);
        assert_eq!(patch.algorithm, 1);
        patch.apply(ParameterId::Algorithm, 1.0);
        assert_eq!(patch.algorithm, 8);
    }

    #[test]
    fn scale_quantization_snaps_down() {
        let scale = ScaleKind::Major;
        assert_eq!(scale.quantize(60, 0), 60); // C stays C
        assert_eq!(scale.quantize(61, 0), 60); // C# -> C
        assert_eq!(scale.quantize(66, 0), 65); // F# -> F
        assert_eq!(ScaleKind::Chromatic.quantize(61, 0), 61);
    }

    #[test]
    fn quantization_clamps_at_the_bottom_of_the_range() {
        // Note 0 with a shifted root snaps to a degree below MIDI 0; the
        // result must clamp instead of wrapping.
        assert_eq!(ScaleKind::Minor.quantize(0, 1), 0);
        assert_eq!(ScaleKind::MajorPentatonic.quantize(1, 1), 1);
        for root in 0..12u8 {
            for note in 0..24u8 {
                assert!(ScaleKind::MinorPentatonic.quantize(note, root) <= note);
            }
        }
    }

    #[test]
    fn applying_every_id_at_the_extremes_is_total() {
        use strum::IntoEnumIterator;

        let mut patch = Patch::default();
        for id in ParameterId::iter() {
            patch.apply(id, 0.0);
            patch.apply(id, 1.0);
        }
        // Spot-check the mapped extremes across field kinds.
        assert_eq!(patch.algorithm, 8);
        assert!((patch.ratio_b - 32.0).abs() < 1e-2);
        assert!((patch.amp_release - 10.0).abs() < 1e-2);
        assert!((patch.tune - 24.0).abs() < 1e-3);
        assert_eq!(patch.root, 11);
        assert_eq!(patch.scale, ScaleKind::MinorPentatonic);
        assert!(patch.phase_reset);
    }

    #[test]
    fn velocity_sensitivity_zero_plays_full_level() {
        let mut patch = Patch::default();
        patch.velocity_sensitivity = 0.0;
        assert!((patch.velocity_to_scale(1) - 1.0).abs() < 1e-6);
        patch.velocity_sensitivity = 1.0;
        assert!(patch.velocity_to_scale(30) < patch.velocity_to_scale(120));
    }
}
