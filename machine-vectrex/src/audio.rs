//! Audio output handling.
//!
//! Carries the PSG's mono 16-bit samples to the default output device. A
//! lock-free ring sits between the emulation thread and the stream
//! callback; when no device exists the machine simply runs silent.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapRb,
};

/// Audio output handler that manages the cpal stream and ring buffer.
pub struct AudioOutput {
    _stream: Stream,
    producer: ringbuf::HeapProd<i16>,
}

impl AudioOutput {
    /// Create a new audio output stream.
    ///
    /// Returns None if no audio device is available; the caller is expected
    /// to keep emulating and discard samples.
    pub fn new(sample_rate: u32, samples_per_frame: usize) -> Option<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;

        let config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // Ring buffer sized for ~8 frames of audio to absorb timing jitter,
        // pre-filled with silence against startup underrun.
        let ring = HeapRb::<i16>::new(samples_per_frame * 8);
        let (mut producer, mut consumer) = ring.split();
        for _ in 0..samples_per_frame * 4 {
            let _ = producer.try_push(0);
        }

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        // Rest level on underrun avoids clicks.
                        *sample = consumer.try_pop().unwrap_or(0);
                    }
                },
                |err| log::warn!("audio stream error: {err}"),
                None,
            )
            .ok()?;

        stream.play().ok()?;

        Some(Self {
            _stream: stream,
            producer,
        })
    }

    /// Push a frame's worth of samples to the ring buffer.
    ///
    /// Blocks if the buffer is full, which creates back-pressure that
    /// naturally paces the emulation to the audio consumption rate.
    pub fn push_samples(&mut self, samples: &[i16]) {
        for &sample in samples {
            while self.producer.try_push(sample).is_err() {
                std::thread::yield_now();
            }
        }
    }
}
