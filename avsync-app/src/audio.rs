use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::*;
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::f32::consts::TAU;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TONE_HZ: f32 = 800.0;
pub const TONE_MS: u32 = 100;
pub const GAIN_START: f32 = 0.3;
pub const GAIN_END: f32 = 0.01;
/// Requested callback size in frames, about 5 ms at 48 kHz.
pub const BUFFER_FRAMES: u32 = 256;

/// A fixed small buffer when the device reports a range, else the backend's
/// default.
pub fn pick_buffer_size(supported: &cpal::SupportedBufferSize) -> cpal::BufferSize {
    match *supported {
        cpal::SupportedBufferSize::Range { min, max } => {
            cpal::BufferSize::Fixed(BUFFER_FRAMES.clamp(min, max.max(min)))
        }
        cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Default,
    }
}

/// One beep: an 800 Hz sine whose gain falls exponentially from 0.3 to 0.01
/// over 100 ms.
pub fn beep_samples(sample_rate: u32) -> Vec<f32> {
    let n = (sample_rate * TONE_MS / 1000) as usize;
    let ratio = GAIN_END / GAIN_START;
    (0..n)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let gain = GAIN_START * ratio.powf(i as f32 / n as f32);
            gain * (TAU * TONE_HZ * t).sin()
        })
        .collect()
}

/// Audio-thread side: plays the beep from the start whenever a trigger
/// arrives, silence otherwise.
pub struct BeepVoice {
    samples: Arc<[f32]>,
    pos: Option<usize>,
}

impl BeepVoice {
    pub fn new(samples: Arc<[f32]>) -> Self {
        Self { samples, pos: None }
    }

    pub fn trigger(&mut self) {
        self.pos = Some(0);
    }

    pub fn is_playing(&self) -> bool {
        self.pos.is_some()
    }

    /// Fills an interleaved buffer, writing each mono sample to every channel.
    pub fn fill(&mut self, data: &mut [f32], channels: usize) {
        for frame in data.chunks_mut(channels.max(1)) {
            let s = match self.pos {
                Some(i) if i < self.samples.len() => {
                    self.pos = Some(i + 1);
                    self.samples[i]
                }
                Some(_) => {
                    self.pos = None;
                    0.0
                }
                None => 0.0,
            };
            frame.fill(s);
        }
    }
}

/// Plays beeps on the default output device. Without a device it stays
/// silent and only logs.
pub struct ToneEmitter {
    stream: Option<cpal::Stream>,
    triggers: Option<HeapProd<u8>>,
}

impl ToneEmitter {
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no audio output device"))?;
        let supported = device
            .default_output_config()
            .context("querying default output config")?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: pick_buffer_size(supported.buffer_size()),
        };

        let rb = HeapRb::<u8>::new(16);
        let (prod, mut cons): (HeapProd<u8>, HeapCons<u8>) = rb.split();
        let mut voice = BeepVoice::new(beep_samples(sample_rate).into());

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while cons.try_pop().is_some() {
                        voice.trigger();
                    }
                    voice.fill(data, channels);
                },
                |err| warn!("Audio stream error: {err}"),
                None,
            )
            .context("building output stream")?;
        stream.play().context("starting output stream")?;

        info!(
            "Audio output: {} Hz, {} channel(s), buffer {:?}",
            sample_rate, channels, config.buffer_size
        );
        Ok(Self {
            stream: Some(stream),
            triggers: Some(prod),
        })
    }

    pub fn silent() -> Self {
        Self {
            stream: None,
            triggers: None,
        }
    }

    pub fn open_or_silent() -> Self {
        Self::open().unwrap_or_else(|e| {
            warn!("Audio unavailable ({e:#}); beeps will be silent");
            Self::silent()
        })
    }

    pub fn is_silent(&self) -> bool {
        self.stream.is_none()
    }

    /// Queues one beep. The audio thread picks it up at the start of its next
    /// callback, so the tone lags the call by up to one buffer period.
    pub fn beep(&mut self) {
        match &mut self.triggers {
            Some(prod) => {
                if prod.try_push(1).is_err() {
                    warn!("Tone trigger queue full; beep dropped");
                }
            }
            None => debug!("Beep (silent)"),
        }
    }
}

impl Drop for ToneEmitter {
    fn drop(&mut self) {
        if self.stream.take().is_some() {
            debug!("Audio stream stopped");
        }
    }
}
