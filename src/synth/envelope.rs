use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, FromRepr};

/// Lifecycle stage of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Idle,
    Delay,
    Attack,
    Decay,
    SustainHold,
    Release,
}

/// How the envelope reacts to note lifetime.
///
/// `Gate` waits for an explicit note-off before releasing, `Trigger`
/// auto-releases once decay completes, `Loop` restarts from attack after
/// reaching idle (cyclic modulation).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter,
    EnumString, FromRepr,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum TrigMode {
    #[default]
    Gate,
    Trigger,
    Loop,
}

/// Per-sample envelope generator with linear ramps.
///
/// Shape: optional onset delay, attack 0→1 over `attack_time`, decay 1→
/// `end_level` over `decay_time`, then (gate mode) hold until note-off,
/// release current level→0 over `release_time`.
///
/// The output level is continuous across every stage transition except an
/// explicit retrigger, and monotonic within each stage.
#[derive(Debug, Clone)]
pub struct EnvelopeGenerator {
    pub attack_time: f32,
    pub decay_time: f32,
    pub end_level: f32,
    pub sustain_level: f32,
    pub release_time: f32,
    pub delay_time: f32,
    pub trig_mode: TrigMode,
    stage: Stage,
    stage_time: f32,
    current_level: f32,
    release_start_level: f32,
}

impl EnvelopeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn current_level(&self) -> f32 {
        self.current_level
    }

    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }

    /// Start the envelope from zero. A retrigger while sounding resets the
    /// level; this is the one permitted discontinuity.
    pub fn note_on(&mut self) {
        self.current_level = 0.0;
        self.stage_time = 0.0;
        self.stage = if self.delay_time > 0.0 {
            Stage::Delay
        } else {
            Stage::Attack
        };
    }

    /// Begin the release ramp (gate mode). Trigger and loop mode envelopes
    /// ignore note-off; their lifetime is time-bounded.
    pub fn note_off(&mut self) {
        if self.trig_mode == TrigMode::Gate
            && !matches!(self.stage, Stage::Idle | Stage::Release)
        {
            self.begin_release();
        }
    }

    fn begin_release(&mut self) {
        self.release_start_level = self.current_level;
        self.stage_time = 0.0;
        self.stage = Stage::Release;
    }

    /// Advance one sample step of `dt` seconds and return the output level.
    pub fn advance(&mut self, dt: f32) -> f32 {
        self.stage_time += dt;
        match self.stage {
            Stage::Idle => {
                self.current_level = 0.0;
            }
            Stage::Delay => {
                self.current_level = 0.0;
                if self.stage_time >= self.delay_time {
                    self.stage = Stage::Attack;
                    self.stage_time = 0.0;
                }
            }
            Stage::Attack => {
                if self.stage_time >= self.attack_time {
                    self.current_level = 1.0;
                    self.stage = Stage::Decay;
                    self.stage_time = 0.0;
                } else {
                    self.current_level = self.stage_time / self.attack_time;
                }
            }
            Stage::Decay => {
                if self.stage_time >= self.decay_time {
                    self.current_level = self.end_level;
                    self.end_decay();
                } else {
                    let progress = self.stage_time / self.decay_time;
                    self.current_level = 1.0 + (self.end_level - 1.0) * progress;
                }
            }
            Stage::SustainHold => {
                self.current_level = self.sustain_level;
            }
            Stage::Release => {
                if self.stage_time >= self.release_time {
                    self.current_level = 0.0;
                    self.stage = Stage::Idle;
                    if self.trig_mode == TrigMode::Loop {
                        self.note_on();
                    }
                } else {
                    let progress = self.stage_time / self.release_time;
                    self.current_level = self.release_start_level * (1.0 - progress);
                }
            }
        }
        self.current_level
    }

    fn end_decay(&mut self) {
        match self.trig_mode {
            TrigMode::Gate => {
                self.stage = Stage::SustainHold;
                self.stage_time = 0.0;
            }
            TrigMode::Trigger | TrigMode::Loop => self.begin_release(),
        }
    }
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        Self {
            attack_time: 0.01,
            decay_time: 0.1,
            end_level: 0.7,
            sustain_level: 0.7,
            release_time: 0.2,
            delay_time: 0.0,
            trig_mode: TrigMode::Gate,
            stage: Stage::Idle,
            stage_time: 0.0,
            current_level: 0.0,
            release_start_level: 0.0,
        }
    }
}
