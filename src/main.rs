use std::time::Duration;

use fourtone::audio::{BufferTick, CpalBackend};
use fourtone::input::MidiHandler;
use fourtone::sequencer::{Pattern, Step, StepScheduler, TriggerBridge};
use fourtone::synth::params::ParameterId;
use fourtone::{control_channel, Engine, EngineConfig};

fn main() {
    if let Err(err) = simple_logger::init_with_level(log::Level::Info) {
        eprintln!("logger init failed: {err}");
    }

    let sample_rate = match CpalBackend::default_sample_rate() {
        Ok(rate) => rate,
        Err(err) => {
            log::error!("no audio output: {err}");
            return;
        }
    };

    let (sender, receiver) = control_channel();
    let config = EngineConfig {
        sample_rate,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, receiver);
    let bridge = TriggerBridge::new(sender, config.track_count);

    // Dial in a simple bell-ish patch on track 0.
    for (id, value) in [
        (ParameterId::Algorithm, 0.0),
        (ParameterId::RatioA, 0.55),
        (ParameterId::LevelA, 0.6),
        (ParameterId::DecayA, 0.6),
        (ParameterId::EndA, 0.0),
        (ParameterId::Feedback, 0.25),
    ] {
        if let Err(err) = bridge.set_parameter(0, id, value) {
            log::warn!("parameter {id} not set: {err}");
        }
    }

    let mut pattern = Pattern::empty(16);
    pattern.steps[0] = Step::trig(48);
    pattern.steps[4] = Step::trig(60);
    pattern.steps[7] = Step {
        note: Some(63),
        micro_offset: 0.25,
        ..Step::default()
    };
    pattern.steps[10] = Step::trig(67);
    pattern.steps[12] = Step {
        note: Some(72),
        // Brighter ratio for this one step only.
        plocks: vec![(ParameterId::RatioA, 0.45)],
        ..Step::default()
    };

    let mut scheduler = StepScheduler::new(pattern, 0, 120.0, sample_rate);
    let tick_bridge = bridge.clone();
    let tick: BufferTick = Box::new(move |frames| {
        if let Err(err) = scheduler.advance(frames, &tick_bridge) {
            log::warn!("scheduler stalled: {err}");
        }
    });

    let _backend = match CpalBackend::start(engine, Some(tick)) {
        Ok(backend) => backend,
        Err(err) => {
            log::error!("audio backend failed: {err}");
            return;
        }
    };

    // MIDI is optional; the demo keeps playing without it.
    let _midi = match MidiHandler::connect(bridge) {
        Ok(handler) => Some(handler),
        Err(err) => {
            log::info!("MIDI input disabled: {err}");
            None
        }
    };

    log::info!("playing at {sample_rate} Hz; ctrl-c to quit");
    loop {
        std::thread::sleep(Duration::from_millis(250));
    }
}
