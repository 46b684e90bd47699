use std::f32::consts::TAU;

/// A single sine operator: phase accumulator plus frequency-ratio tuning.
///
/// The operator renders one sample per call. Modulation input is a phase
/// offset in radians, which is the FM convention used throughout the engine.
pub struct Operator {
    ratio: f32,
    fine_detune_cents: f32,
    pub output_level: f32,
    pub feedback_amount: f32,
    phase: f32,
    // Ratio/detune automation is deferred to the next phase-wrap boundary so
    // the running waveform never jumps mid-cycle.
    pending_ratio: Option<f32>,
    pending_detune: Option<f32>,
}

impl Operator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frequency multiplier relative to the voice's base frequency.
    pub fn ratio(&self) -> f32 {
        self.pending_ratio.unwrap_or(self.ratio)
    }

    pub fn fine_detune_cents(&self) -> f32 {
        self.pending_detune.unwrap_or(self.fine_detune_cents)
    }

    /// Schedule a new frequency ratio, effective at the next phase wrap.
    pub fn set_ratio(&mut self, ratio: f32) {
        self.pending_ratio = Some(ratio.clamp(0.05, 64.0));
    }

    pub fn set_fine_detune(&mut self, cents: f32) {
        self.pending_detune = Some(cents);
    }

    /// Apply any pending tuning immediately and zero the phase. Used on
    /// note-on when the patch requests a phase reset.
    pub fn reset(&mut self) {
        self.apply_pending();
        self.phase = 0.0;
    }

    /// Apply pending tuning without touching the phase. Used on note-on when
    /// the patch preserves phase across triggers.
    pub fn apply_pending(&mut self) {
        if let Some(ratio) = self.pending_ratio.take() {
            self.ratio = ratio;
        }
        if let Some(cents) = self.pending_detune.take() {
            self.fine_detune_cents = cents;
        }
    }

    /// Render one sample: advance the phase by the operator's frequency and
    /// evaluate `sin(phase + modulation) * output_level`.
    ///
    /// Deterministic given identical phase/modulation history; no allocation.
    /// A non-finite result (NaN fed in through modulation) is replaced by 0.0
    /// so instability can never leave this stage.
    pub fn render(&mut self, base_frequency: f32, modulation: f32, sample_rate: f32) -> f32 {
        let detune = 2.0_f32.powf(self.fine_detune_cents / 1200.0);
        let frequency = base_frequency * self.ratio * detune;
        let increment = TAU * frequency / sample_rate;

        let sample = (self.phase + modulation).sin() * self.output_level;

        self.phase += increment;
        if self.phase >= TAU {
            self.phase %= TAU;
            self.apply_pending();
        }

        if sample.is_finite() {
            sample
        } else {
            0.0
        }
    }
}

impl Default for Operator {
    fn default() -> Self {
        Self {
            ratio: 1.0,
            fine_detune_cents: 0.0,
            output_level: 1.0,
            feedback_amount: 0.0,
            phase: 0.0,
            pending_ratio: None,
            pending_detune: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_change_keeps_output_continuous() {
        let sample_rate = 48000.0;
        let base = 440.0;
        let mut op = Operator::new();
        op.reset();

        let mut previous = op.render(base, 0.0, sample_rate);
        let mut max_delta = 0.0_f32;
        for i in 1..4800 {
            if i == 1000 {
                op.set_ratio(4.0);
            }
            let sample = op.render(base, 0.0, sample_rate);
            max_delta = max_delta.max((sample - previous).abs());
            previous = sample;
        }

        // The largest legitimate sample-to-sample step of a sine at the final
        // (highest) frequency, with a little slack for the wrap sample.
        let bound = TAU * 4.0 * base / sample_rate * 1.1;
        assert!(
            max_delta <= bound,
            "discontinuity {max_delta} exceeds bound {bound}"
        );
    }

    #[test]
    fn nan_modulation_is_fused_to_zero() {
        let mut op = Operator::new();
        assert_eq!(op.render(440.0, f32::NAN, 48000.0), 0.0);
    }

    #[test]
    fn output_level_scales_amplitude() {
        let mut op = Operator::new();
        op.output_level = 0.25;
        let mut peak = 0.0_f32;
        for _ in 0..480 {
            peak = peak.max(op.render(440.0, 0.0, 48000.0).abs());
        }
        assert!(peak <= 0.25 + 1e-6);
        assert!(peak > 0.2);
    }
}
