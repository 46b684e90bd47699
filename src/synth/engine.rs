use crossbeam_channel::Receiver;

use crate::control::ControlMsg;
use crate::synth::allocator::{PoolStatus, VoiceAllocator};
use crate::synth::note::NoteEvent;
use crate::synth::params::ParameterId;
use crate::synth::patch::Patch;

/// Output magnitude where the limiter starts compressing.
const LIMITER_KNEE: f32 = 0.9;

/// Construction-time settings for the engine. Everything the render path
/// needs is allocated up front from these.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub sample_rate: f32,
    pub polyphony: usize,
    pub track_count: usize,
    pub master_volume: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            polyphony: 8,
            track_count: 4,
            master_volume: 0.65,
        }
    }
}

struct Track {
    patch: Patch,
}

/// The engine: per-track patches, the voice pool, and the control-message
/// receiver.
///
/// `process` is the only entry point meant for the audio callback thread.
/// All other traffic arrives through the control channel and is applied at
/// buffer boundaries; the render path itself never locks, allocates or
/// performs I/O.
pub struct Engine {
    tracks: Vec<Track>,
    allocator: VoiceAllocator,
    receiver: Receiver<ControlMsg>,
    sample_rate: f32,
    master_volume: f32,
    current_gain: f32,
    // Reused patch copy for p-locked triggers; lives here so triggering
    // never touches the heap.
    scratch_patch: Patch,
}

impl Engine {
    pub fn new(config: EngineConfig, receiver: Receiver<ControlMsg>) -> Self {
        let tracks = (0..config.track_count.max(1))
            .map(|_| Track {
                patch: Patch::default(),
            })
            .collect();
        let master_volume = config.master_volume.clamp(0.0, 1.0);
        Self {
            tracks,
            allocator: VoiceAllocator::new(config.polyphony, config.sample_rate),
            receiver,
            sample_rate: config.sample_rate,
            master_volume,
            current_gain: master_volume,
            scratch_patch: Patch::default(),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Read-only voice pool status for monitoring/UI collaborators.
    pub fn status(&self) -> PoolStatus {
        self.allocator.status()
    }

    /// Render one mono buffer. Drains pending control messages first so
    /// every message queued before this call affects the whole buffer.
    pub fn process(&mut self, output: &mut [f32]) {
        self.drain_control_messages();

        output.fill(0.0);
        self.allocator.render(output);
        self.apply_gain(output);
        Self::apply_limiter(output);
    }

    fn drain_control_messages(&mut self) {
        while let Ok(msg) = self.receiver.try_recv() {
            match msg {
                ControlMsg::NoteOn { event, plocks } => self.handle_note_on(&event, &plocks),
                ControlMsg::NoteOff { event } => {
                    // Voices key on the raw incoming note, so a scale or
                    // root change while the note is held cannot strand it.
                    self.allocator.release(event.track, event.note, event.source);
                }
                ControlMsg::SetParameter {
                    track,
                    id,
                    normalized,
                } => {
                    if let Some(entry) = self.tracks.get_mut(track) {
                        entry.patch.apply(id, normalized);
                    } else {
                        log::warn!("parameter {id} addressed unknown track {track}");
                    }
                }
                ControlMsg::LoadParameterSet { track, set } => {
                    if let Some(entry) = self.tracks.get_mut(track) {
                        entry.patch.apply_set(&set);
                    } else {
                        log::warn!("parameter set addressed unknown track {track}");
                    }
                }
                ControlMsg::SetMasterVolume(volume) => {
                    self.master_volume = volume.clamp(0.0, 1.0);
                }
            }
        }
    }

    fn handle_note_on(&mut self, event: &NoteEvent, plocks: &[(ParameterId, f32)]) {
        let Some(patch) = self.track_patch(event.track) else {
            log::warn!("note-on dropped: unknown track {}", event.track);
            return;
        };
        // Parameter locks apply to a transient copy, never to the track's
        // base patch.
        self.scratch_patch = patch;
        for &(id, normalized) in plocks {
            self.scratch_patch.apply(id, normalized);
        }
        self.allocator.trigger(event, &self.scratch_patch);
    }

    fn track_patch(&self, track: usize) -> Option<Patch> {
        self.tracks.get(track).map(|t| t.patch)
    }

    /// Smooth the master gain toward its target over the buffer to avoid
    /// zipper noise on volume changes.
    fn apply_gain(&mut self, output: &mut [f32]) {
        let target = self.master_volume;
        let coefficient = 1.0 - (-1.0 / (0.005 * self.sample_rate)).exp();
        for sample in output.iter_mut() {
            self.current_gain += (target - self.current_gain) * coefficient;
            *sample *= self.current_gain;
        }
    }

    /// Monotonic soft limiter: identity below the knee, tanh-shaped
    /// compression above it, bounded by 1.0.
    fn apply_limiter(output: &mut [f32]) {
        for sample in output.iter_mut() {
            let magnitude = sample.abs();
            if magnitude > LIMITER_KNEE {
                let over = (magnitude - LIMITER_KNEE) / (1.0 - LIMITER_KNEE);
                *sample = sample.signum() * (LIMITER_KNEE + (1.0 - LIMITER_KNEE) * over.tanh());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_is_monotonic_and_bounded() {
        let mut previous = 0.0f32;
        for i in 0..400 {
            let mut buffer = [i as f32 * 0.01];
            Engine::apply_limiter(&mut buffer);
            assert!(buffer[0] <= 1.0);
            assert!(
                buffer[0] >= previous - 1e-6,
                "limiter output fell from {previous} to {} at input {}",
                buffer[0],
                i as f32 * 0.01
            );
            previous = buffer[0];
        }
    }

    #[test]
    fn hot_transients_stay_loud() {
        let mut buffer = [3.0f32, -3.0];
        Engine::apply_limiter(&mut buffer);
        assert!(buffer[0] > 0.95 && buffer[0] <= 1.0);
        assert!(buffer[1] < -0.95 && buffer[1] >= -1.0);
    }
}
