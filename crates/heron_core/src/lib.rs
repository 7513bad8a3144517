//! Heron Core - Audio Engine
//!
//! This crate drives the Heron filter chain in real time:
//! - Lock-free parameter store shared by the control and audio threads
//! - Per-block coefficient refresh when parameters change
//! - Audio device enumeration and stream management (via CPAL)
//! - Persistent settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Control Thread                         │
//! │   set_parameter ──▶ EqParameters     Engine ◀──events──    │
//! └─────────────────────────────────────────────────────────────┘
//!                │ atomics              │ crossbeam-channel
//!                ▼                      ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │   Capture ──rtrb──▶ EqProcessor ──▶ Output                 │
//! │              (Zero allocation in this path)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod device;
mod engine;
mod error;
mod message;
mod parameters;
mod processor;
mod settings;
mod stream;

pub use config::{EngineConfig, StreamConfig};
pub use device::{find_device, AudioDevice, DeviceType};
pub use engine::AudioEngine;
pub use error::{EngineError, EngineResult};
pub use message::{Command, Event};
pub use parameters::{EqParameters, FloatRange, ParameterId, ParameterKind, ParameterSpec};
pub use processor::EqProcessor;
pub use settings::HeronSettings;
pub use stream::{AudioStream, SharedState};

// Re-export DSP types for convenience
pub use heron_dsp::{ChainCoefficients, ChainSettings, CutDesign, MagnitudeResponse, ResponsePoint, Slope};
