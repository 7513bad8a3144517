//! Engine and Stream Configuration

use heron_dsp::CutDesign;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Audio stream configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Sample rate in Hz (e.g., 44100, 48000, 96000)
    pub sample_rate: u32,

    /// Number of audio channels; the filter chain is stereo only
    pub channels: u16,

    /// Buffer size in frames (lower = less latency, higher = more stability)
    pub buffer_size: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_size: 512,
        }
    }
}

impl StreamConfig {
    /// Calculate latency in milliseconds for this configuration
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }

    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate as f32
    }

    /// Validate configuration
    pub fn validate(&self) -> EngineResult<()> {
        if self.sample_rate < 8000 || self.sample_rate > 192000 {
            return Err(EngineError::ConfigError(format!(
                "Invalid sample rate: {}",
                self.sample_rate
            )));
        }
        if self.channels != 2 {
            return Err(EngineError::ConfigError(format!(
                "Invalid channel count: {} (stereo only)",
                self.channels
            )));
        }
        if self.buffer_size < 32 || self.buffer_size > 8192 {
            return Err(EngineError::ConfigError(format!(
                "Invalid buffer size: {}",
                self.buffer_size
            )));
        }
        Ok(())
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Stream configuration
    pub stream: StreamConfig,

    /// Ring buffer capacity in frames (should be multiple of buffer_size)
    pub ring_buffer_frames: usize,

    /// How cut filter sections are designed
    #[serde(default)]
    pub cut_design: CutDesign,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            // 4 buffers worth of ring buffer capacity
            ring_buffer_frames: 512 * 4,
            cut_design: CutDesign::default(),
        }
    }
}

impl EngineConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: 128, // ~2.6ms latency
            },
            ring_buffer_frames: 128 * 8,
            cut_design: CutDesign::default(),
        }
    }

    /// Create config optimized for stability
    pub fn stable() -> Self {
        Self {
            stream: StreamConfig {
                sample_rate: 48000,
                channels: 2,
                buffer_size: 1024, // ~21ms latency
            },
            ring_buffer_frames: 1024 * 4,
            cut_design: CutDesign::default(),
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.stream.validate()?;
        if self.ring_buffer_frames < self.stream.buffer_size as usize {
            return Err(EngineError::ConfigError(format!(
                "Ring buffer ({} frames) smaller than one buffer ({} frames)",
                self.ring_buffer_frames, self.stream.buffer_size
            )));
        }
        Ok(())
    }
}
