use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};

use crate::error::Error;
use crate::synth::Engine;

/// Called with the frame count at the top of every audio callback, before
/// the engine renders. Used to advance the step scheduler so its events land
/// in the same buffer.
pub type BufferTick = Box<dyn FnMut(usize) + Send>;

/// Drives an [`Engine`] from a cpal output stream.
///
/// The engine is moved into the audio callback: the only way to talk to it
/// afterwards is the control channel, so no lock is ever taken on the
/// render path.
pub struct CpalBackend {
    stream: Stream,
}

impl CpalBackend {
    /// Sample rate of the default output device, for building an engine
    /// before the stream exists.
    pub fn default_sample_rate() -> Result<f32, Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::OutputDeviceError("no output device available".into()))?;
        let config = device
            .default_output_config()
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        Ok(config.sample_rate().0 as f32)
    }

    pub fn start(mut engine: Engine, mut tick: Option<BufferTick>) -> Result<Self, Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::OutputDeviceError("no output device available".into()))?;
        log::info!(
            "output device: {}",
            device.name().unwrap_or_else(|_| "unknown".into())
        );

        let supported = device
            .default_output_config()
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(Error::OutputDeviceError(
                "unsupported sample format".into(),
            ));
        }
        // Size the scratch buffer for the largest callback the device
        // advertises, so rendering never allocates on the audio thread.
        let max_frames = match supported.buffer_size() {
            cpal::SupportedBufferSize::Range { max, .. } => (*max as usize).max(256),
            cpal::SupportedBufferSize::Unknown => 8192,
        };
        let config: cpal::StreamConfig = supported.into();
        let channels = config.channels as usize;

        let mut mono: Vec<f32> = vec![0.0; max_frames];
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    if frames > mono.len() {
                        // Only reachable if the device delivers more than it
                        // advertised.
                        mono.resize(frames, 0.0);
                    }
                    let mono = &mut mono[..frames];
                    if let Some(tick) = tick.as_mut() {
                        tick(frames);
                    }
                    engine.process(mono);
                    for (frame, &sample) in data.chunks_mut(channels).zip(mono.iter()) {
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| log::error!("stream error: {err}"),
                None,
            )
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;

        stream
            .play()
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))?;
        Ok(Self { stream })
    }

    pub fn stop(&self) -> Result<(), Error> {
        self.stream
            .pause()
            .map_err(|err| Error::OutputDeviceError(Box::new(err)))
    }
}
