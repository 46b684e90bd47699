use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Every parameter the engine understands. UI, automation and per-step
/// parameter locks all address fields through these ids; each id maps to
/// exactly one operator, envelope or voice-global field (see `Patch::apply`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumIter, EnumString,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ParameterId {
    Algorithm,
    RatioC,
    RatioA,
    RatioB,
    Harmony,
    Detune,
    Feedback,
    Mix,
    AttackA,
    DecayA,
    EndA,
    LevelA,
    AttackB,
    DecayB,
    EndB,
    LevelB,
    Delay,
    TrigMode,
    PhaseReset,
    KeyTracking,
    OffsetA,
    OffsetB,
    VelocitySensitivity,
    Scale,
    Root,
    Tune,
    Fine,
    AmpAttack,
    AmpDecay,
    AmpSustain,
    AmpRelease,
}

/// Normalized-to-DSP value curve for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    Linear { min: f32, max: f32 },
    /// `min * (max/min)^x`, so equal normalized steps are equal ratios.
    Exponential { min: f32, max: f32 },
    /// Quantized index 0..count.
    Discrete { count: u32 },
}

impl Curve {
    /// Map a normalized value into the parameter's DSP domain. Out-of-range
    /// input is clamped, never propagated as invalid state.
    pub fn map(&self, normalized: f32) -> f32 {
        let x = if normalized.is_finite() {
            normalized.clamp(0.0, 1.0)
        } else {
            0.0
        };
        match *self {
            Curve::Linear { min, max } => min + x * (max - min),
            Curve::Exponential { min, max } => min * (max / min).powf(x),
            Curve::Discrete { count } => (x * (count.saturating_sub(1)) as f32).round(),
        }
    }
}

impl ParameterId {
    /// The documented curve for this parameter.
    pub fn curve(&self) -> Curve {
        use ParameterId::*;
        match self {
            Algorithm => Curve::Discrete { count: 8 },
            // 0.5 * 64^x.
            RatioC | RatioA | RatioB => Curve::Exponential {
                min: 0.5,
                max: 32.0,
            },
            Harmony => Curve::Linear {
                min: -12.0,
                max: 12.0,
            },
            Detune => Curve::Linear {
                min: 0.0,
                max: 50.0,
            },
            Feedback | Mix | EndA | LevelA | EndB | LevelB | KeyTracking
            | VelocitySensitivity | AmpSustain => Curve::Linear { min: 0.0, max: 1.0 },
            // 0.001 * 10000^x seconds (1 ms - 10 s).
            AttackA | DecayA | AttackB | DecayB | Delay | AmpAttack | AmpDecay | AmpRelease => {
                Curve::Exponential {
                    min: 0.001,
                    max: 10.0,
                }
            }
            TrigMode => Curve::Discrete { count: 3 },
            PhaseReset => Curve::Discrete { count: 2 },
            OffsetA | OffsetB => Curve::Linear {
                min: -1.0,
                max: 1.0,
            },
            Scale => Curve::Discrete { count: 5 },
            Root => Curve::Discrete { count: 12 },
            Tune => Curve::Linear {
                min: -24.0,
                max: 24.0,
            },
            Fine => Curve::Linear {
                min: -50.0,
                max: 50.0,
            },
        }
    }
}

/// A flat parameter-id → normalized-value record, as supplied by the
/// persistence collaborator for a preset or track. Values are normalized
/// 0.0-1.0 doubles; mapping to DSP values happens in `Patch::apply_set`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<ParameterId, f32>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: ParameterId, normalized: f32) {
        self.values.insert(id, normalized);
    }

    pub fn get(&self, id: ParameterId) -> Option<f32> {
        self.values.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParameterId, f32)> + '_ {
        self.values.iter().map(|(&id, &value)| (id, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
