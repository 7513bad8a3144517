//! Audio Stream Management
//!
//! Handles the CPAL stream setup and the real-time callbacks.
//!
//! ```text
//! Input device ──capture cb──▶ rtrb ──output cb──▶ EqProcessor ──▶ Output device
//! ```
//!
//! The output callback pulls one block from the ring, lets the processor
//! pick up parameter changes, filters the block in place and records peak
//! levels for the meters.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig as CpalStreamConfig};
use crossbeam_channel::Sender;
use heron_dsp::{AudioProcessor, ProcessContext};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::message::Event;
use crate::processor::EqProcessor;

/// State shared between the audio callback and the control thread
pub struct SharedState {
    /// Whether processing is bypassed
    pub bypassed: AtomicBool,

    // f32 bits; there is no AtomicF32
    peak_left_bits: AtomicU32,
    peak_right_bits: AtomicU32,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            bypassed: AtomicBool::new(false),
            peak_left_bits: AtomicU32::new(0.0_f32.to_bits()),
            peak_right_bits: AtomicU32::new(0.0_f32.to_bits()),
        }
    }

    pub fn set_peaks(&self, left: f32, right: f32) {
        self.peak_left_bits.store(left.to_bits(), Ordering::Relaxed);
        self.peak_right_bits.store(right.to_bits(), Ordering::Relaxed);
    }

    pub fn peaks(&self) -> (f32, f32) {
        (
            f32::from_bits(self.peak_left_bits.load(Ordering::Relaxed)),
            f32::from_bits(self.peak_right_bits.load(Ordering::Relaxed)),
        )
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Relaxed)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// A running capture + output stream pair
///
/// Dropping it stops both CPAL streams.
pub struct AudioStream {
    // Held only to keep the callbacks alive
    _capture_stream: Stream,
    _output_stream: Stream,

    pub shared: Arc<SharedState>,
    pub config: EngineConfig,
}

impl AudioStream {
    /// Build and start both streams
    ///
    /// `processor` must already be prepared for `config.stream.sample_rate`;
    /// it is moved into the output callback.
    pub fn new(
        config: EngineConfig,
        input_device: &Device,
        output_device: &Device,
        processor: EqProcessor,
        shared: Arc<SharedState>,
        event_sender: Sender<Event>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let stream = config.stream;
        let ring_size = config.ring_buffer_frames * stream.channels as usize;
        let (producer, consumer) = RingBuffer::<f32>::new(ring_size);

        let cpal_config = CpalStreamConfig {
            channels: stream.channels,
            sample_rate: cpal::SampleRate(stream.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(stream.buffer_size),
        };

        let capture_stream = Self::build_capture_stream(input_device, &cpal_config, producer, event_sender.clone())?;
        let output_stream = Self::build_output_stream(
            output_device,
            &cpal_config,
            consumer,
            processor,
            Arc::clone(&shared),
            event_sender,
        )?;

        capture_stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;
        output_stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;

        info!(
            sample_rate = stream.sample_rate,
            buffer_size = stream.buffer_size,
            latency_ms = stream.latency_ms(),
            "Audio streams started"
        );

        Ok(Self {
            _capture_stream: capture_stream,
            _output_stream: output_stream,
            shared,
            config,
        })
    }

    fn build_capture_stream(
        device: &Device,
        config: &CpalStreamConfig,
        mut producer: Producer<f32>,
        event_sender: Sender<Event>,
    ) -> EngineResult<Stream> {
        let err_sender = event_sender.clone();

        device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if push_to_ring(&mut producer, data) < data.len() {
                        // Output side is not draining fast enough
                        let _ = event_sender.try_send(Event::BufferUnderrun);
                    }
                },
                move |err| {
                    let _ = err_sender.try_send(Event::error(err));
                },
                None,
            )
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))
    }

    fn build_output_stream(
        device: &Device,
        config: &CpalStreamConfig,
        mut consumer: Consumer<f32>,
        mut processor: EqProcessor,
        shared: Arc<SharedState>,
        event_sender: Sender<Event>,
    ) -> EngineResult<Stream> {
        let err_sender = event_sender.clone();
        let channels = config.channels as usize;
        let sample_rate = processor.sample_rate();

        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Real-time: no allocation, no locks
                    if !pull_from_ring(&mut consumer, data) {
                        let _ = event_sender.try_send(Event::BufferUnderrun);
                    }

                    if !shared.is_bypassed() {
                        let context = ProcessContext::new(sample_rate, channels, data.len() / channels);
                        processor.process(data, &context);
                    }

                    let (left, right) = interleaved_peaks(data);
                    shared.set_peaks(left, right);
                },
                move |err| {
                    let _ = err_sender.try_send(Event::error(err));
                },
                None,
            )
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))
    }

    /// Get current peak levels (for meters)
    pub fn peaks(&self) -> (f32, f32) {
        self.shared.peaks()
    }

    pub fn set_bypass(&self, bypassed: bool) {
        self.shared.bypassed.store(bypassed, Ordering::Relaxed);
    }
}

/// Copy as much of `data` into the ring as fits; returns samples written
fn push_to_ring(producer: &mut Producer<f32>, data: &[f32]) -> usize {
    let len = data.len().min(producer.slots());
    match producer.write_chunk_uninit(len) {
        Ok(chunk) => chunk.fill_from_iter(data.iter().copied()),
        Err(_) => 0,
    }
}

/// Fill `data` from the ring; on underrun the missing tail is silence.
/// Returns false on underrun.
fn pull_from_ring(consumer: &mut Consumer<f32>, data: &mut [f32]) -> bool {
    let to_read = data.len().min(consumer.slots());

    if let Ok(chunk) = consumer.read_chunk(to_read) {
        let (first, second) = chunk.as_slices();
        data[..first.len()].copy_from_slice(first);
        data[first.len()..to_read].copy_from_slice(second);
        chunk.commit_all();
    }

    if to_read < data.len() {
        data[to_read..].fill(0.0);
        return false;
    }
    true
}

/// Peak absolute level per channel of an interleaved stereo block
fn interleaved_peaks(data: &[f32]) -> (f32, f32) {
    data.chunks_exact(2).fold((0.0_f32, 0.0_f32), |(l, r), frame| {
        (l.max(frame[0].abs()), r.max(frame[1].abs()))
    })
}
