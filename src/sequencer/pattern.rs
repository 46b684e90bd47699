use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::sequencer::bridge::{StepEvent, TriggerBridge};
use crate::synth::params::ParameterId;

/// One sequencer step, as stored in a pattern record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Note to trigger, or `None` for a trigless step.
    pub note: Option<u8>,
    pub velocity: Option<u8>,
    /// Micro-timing shift as a fraction of a step, -0.5..=0.5.
    pub micro_offset: f32,
    /// Gate length in steps; the matching note-off is scheduled this far
    /// after the trig.
    pub gate: f32,
    /// Per-step parameter locks, active only for the triggered note.
    pub plocks: Vec<(ParameterId, f32)>,
}

impl Default for Step {
    fn default() -> Self {
        Self {
            note: None,
            velocity: None,
            micro_offset: 0.0,
            gate: 0.5,
            plocks: Vec::new(),
        }
    }
}

impl Step {
    pub fn trig(note: u8) -> Self {
        Self {
            note: Some(note),
            ..Self::default()
        }
    }
}

/// A looping sequence of steps, supplied by the persistence collaborator as
/// a plain record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub steps: Vec<Step>,
    /// Sequencer resolution, e.g. 4.0 for sixteenth notes.
    pub steps_per_beat: f32,
}

impl Pattern {
    pub fn empty(length: usize) -> Self {
        Self {
            steps: vec![Step::default(); length.max(1)],
            steps_per_beat: 4.0,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Sample-accurate step scheduler.
///
/// Converts transport position (in samples) into trigger events, enqueued
/// through the bridge ahead of the render callback. This replaces any
/// wall-clock timer: micro-timing and gate lengths resolve to exact sample
/// positions, applied by the engine at the following buffer boundary.
pub struct StepScheduler {
    pattern: Pattern,
    track: usize,
    tempo_bpm: f64,
    sample_rate: f64,
    /// Transport position in samples.
    position: u64,
    /// Absolute (non-wrapping) index of the next step to examine.
    next_step: u64,
    /// Scheduled note-offs as (sample time, note).
    pending_offs: Vec<(u64, u8)>,
}

impl StepScheduler {
    pub fn new(pattern: Pattern, track: usize, tempo_bpm: f32, sample_rate: f32) -> Self {
        // Pattern records come from outside; an empty or non-positive
        // resolution would stall the transport, so normalize both here.
        let mut pattern = pattern;
        if pattern.is_empty() {
            pattern = Pattern::empty(1);
        }
        pattern.steps_per_beat = if pattern.steps_per_beat.is_finite() {
            pattern.steps_per_beat.clamp(0.25, 64.0)
        } else {
            4.0
        };
        Self {
            pattern,
            track,
            tempo_bpm: Self::clamp_tempo(tempo_bpm),
            sample_rate: sample_rate as f64,
            position: 0,
            next_step: 0,
            pending_offs: Vec::with_capacity(64),
        }
    }

    pub fn set_tempo(&mut self, tempo_bpm: f32) {
        self.tempo_bpm = Self::clamp_tempo(tempo_bpm);
    }

    fn clamp_tempo(tempo_bpm: f32) -> f64 {
        if tempo_bpm.is_finite() {
            tempo_bpm.clamp(20.0, 999.0) as f64
        } else {
            120.0
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    fn step_duration(&self) -> f64 {
        60.0 / self.tempo_bpm / self.pattern.steps_per_beat as f64 * self.sample_rate
    }

    /// Sample time of the given absolute step, including its micro-timing
    /// offset.
    fn step_time(&self, step: u64) -> u64 {
        let duration = self.step_duration();
        let index = (step as usize) % self.pattern.len();
        let micro = self.pattern.steps[index].micro_offset.clamp(-0.5, 0.5) as f64;
        let time = step as f64 * duration + micro * duration;
        time.max(0.0) as u64
    }

    /// Advance the transport by one buffer's worth of samples, emitting all
    /// step trigs and gate-expiry note-offs that fall inside the window, in
    /// time order.
    pub fn advance(&mut self, num_samples: usize, bridge: &TriggerBridge) -> Result<(), Error> {
        let window_end = self.position + num_samples as u64;

        loop {
            let next_trig = self.step_time(self.next_step);
            let next_off = self
                .pending_offs
                .iter()
                .enumerate()
                .min_by_key(|(_, &(time, _))| time)
                .map(|(index, &(time, _))| (index, time));

            match next_off {
                Some((index, off_time)) if off_time < window_end && off_time <= next_trig => {
                    let (_, note) = self.pending_offs.swap_remove(index);
                    bridge.on_step_release(self.track, note)?;
                }
                _ if next_trig < window_end => {
                    self.emit_step(next_trig, window_end, bridge)?;
                    self.next_step += 1;
                }
                _ => break,
            }
        }

        self.position = window_end;
        Ok(())
    }

    fn emit_step(
        &mut self,
        trig_time: u64,
        window_end: u64,
        bridge: &TriggerBridge,
    ) -> Result<(), Error> {
        let index = (self.next_step as usize) % self.pattern.len();
        let step = &self.pattern.steps[index];
        let Some(note) = step.note else {
            return Ok(());
        };

        let event = StepEvent {
            step: index,
            track: self.track,
            note: Some(note),
            velocity: step.velocity,
            plocks: step.plocks.clone(),
        };
        let gate_samples = (step.gate.max(0.01) as f64 * self.step_duration()) as u64;
        if let Err(err) = bridge.on_step_event(event) {
            // Malformed steps are dropped with a diagnostic; the transport
            // keeps running.
            log::warn!("step {index} dropped: {err}");
            return Ok(());
        }
        // The engine drains control messages in one batch per buffer, so an
        // off expiring inside the trig's own window would cancel the note
        // before it sounds; hold it back to the next window.
        let off_time = (trig_time + gate_samples).max(window_end);
        self.pending_offs.push((off_time, note));
        Ok(())
    }
}
