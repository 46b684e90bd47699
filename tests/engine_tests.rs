use crossbeam_channel::Sender;

use fourtone::sequencer::{Pattern, Step, StepEvent, StepScheduler, TriggerBridge};
use fourtone::synth::params::ParameterId;
use fourtone::{control_channel, ControlMsg, Engine, EngineConfig};

const SAMPLE_RATE: f32 = 48000.0;

fn engine() -> (Engine, TriggerBridge, Sender<ControlMsg>) {
    let (sender, receiver) = control_channel();
    let config = EngineConfig::default();
    let engine = Engine::new(config, receiver);
    let bridge = TriggerBridge::new(sender.clone(), config.track_count);
    (engine, bridge, sender)
}

fn peak(buffer: &[f32]) -> f32 {
    buffer.iter().fold(0.0f32, |p, s| p.max(s.abs()))
}

fn render(engine: &mut Engine, samples: usize) -> Vec<f32> {
    let mut buffer = vec![0.0f32; samples];
    engine.process(&mut buffer);
    buffer
}

#[test]
fn silent_until_triggered_then_audible_and_finite() {
    let (mut engine, bridge, _sender) = engine();

    let buffer = render(&mut engine, 512);
    assert!(buffer.iter().all(|&s| s == 0.0));

    bridge.on_external_note(true, 60, 100, 0).unwrap();
    let buffer = render(&mut engine, 2048);
    assert!(buffer.iter().all(|s| s.is_finite()));
    assert!(peak(&buffer) > 0.01);
}

#[test]
fn release_returns_every_voice_and_decays_to_silence() {
    let (mut engine, bridge, _sender) = engine();

    bridge.on_external_note(true, 60, 100, 0).unwrap();
    render(&mut engine, 2048);
    assert_eq!(engine.status().active, 1);

    bridge.on_external_note(false, 60, 0, 0).unwrap();
    // Default amp release is 0.25 s; a full second is ample.
    render(&mut engine, SAMPLE_RATE as usize);

    let status = engine.status();
    assert_eq!(status.free, 8);
    let tail = render(&mut engine, 512);
    assert!(peak(&tail) < 1e-3);
}

#[test]
fn note_flood_steals_without_exceeding_the_pool() {
    let (mut engine, bridge, _sender) = engine();

    for note in 0..32u8 {
        bridge.on_external_note(true, 36 + note, 100, 0).unwrap();
        let buffer = render(&mut engine, 256);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }

    let status = engine.status();
    assert_eq!(status.active + status.releasing, 8);
    assert_eq!(status.free, 0);
}

#[test]
fn parameter_locks_apply_to_one_trigger_only() {
    let (mut engine, bridge, _sender) = engine();

    // Algorithm 8 is fully additive and noticeably louder than the default
    // serial stack; lock it for a single step.
    bridge
        .on_step_event(StepEvent {
            step: 0,
            track: 0,
            note: Some(60),
            velocity: Some(127),
            plocks: vec![(ParameterId::Algorithm, 1.0)],
        })
        .unwrap();
    let locked_peak = peak(&render(&mut engine, 24_000));

    bridge.on_step_release(0, 60).unwrap();
    render(&mut engine, SAMPLE_RATE as usize);
    assert_eq!(engine.status().free, 8);

    // The next plain note must render from the untouched base patch.
    bridge.on_external_note(true, 60, 127, 0).unwrap();
    let plain_peak = peak(&render(&mut engine, 24_000));

    assert!(
        locked_peak > plain_peak + 0.1,
        "lock did not change the trigger: locked {locked_peak}, plain {plain_peak}"
    );
}

#[test]
fn scale_change_while_held_still_releases_the_note() {
    let (mut engine, bridge, _sender) = engine();

    // Trigger C# on the default chromatic patch, then switch the track to
    // major scale while the note is held. The note-off must still find the
    // voice.
    bridge.on_external_note(true, 61, 100, 0).unwrap();
    render(&mut engine, 2048);
    assert_eq!(engine.status().active, 1);

    bridge
        .set_parameter(0, ParameterId::Scale, 0.25)
        .unwrap();
    bridge.on_external_note(false, 61, 0, 0).unwrap();
    render(&mut engine, 2 * SAMPLE_RATE as usize);
    assert_eq!(engine.status().free, 8);
}

#[test]
fn master_volume_change_smooths_to_silence() {
    let (mut engine, bridge, sender) = engine();

    bridge.on_external_note(true, 60, 100, 0).unwrap();
    let buffer = render(&mut engine, 2048);
    assert!(peak(&buffer) > 0.01);

    sender.try_send(ControlMsg::SetMasterVolume(0.0)).unwrap();
    // 100 ms is far past the 5 ms smoothing constant.
    render(&mut engine, 4800);
    let tail = render(&mut engine, 512);
    assert!(peak(&tail) < 1e-3);
}

#[test]
fn sequenced_pattern_plays_through_the_engine() {
    let (mut engine, bridge, _sender) = engine();

    let mut pattern = Pattern::empty(4);
    pattern.steps[0] = Step::trig(48);
    pattern.steps[2] = Step {
        note: Some(60),
        plocks: vec![(ParameterId::RatioA, 0.45)],
        ..Step::default()
    };
    let mut scheduler = StepScheduler::new(pattern, 0, 120.0, SAMPLE_RATE);

    // 120 bpm at 4 steps/beat: one step every 6000 samples, one buffer per
    // step window; gate note-offs drain at the following boundary.
    let mut audible = 0;
    for _ in 0..4 {
        scheduler.advance(6000, &bridge).unwrap();
        let buffer = render(&mut engine, 6000);
        assert!(buffer.iter().all(|s| s.is_finite()));
        if peak(&buffer) > 0.01 {
            audible += 1;
        }
    }
    assert!(audible >= 2);
}
