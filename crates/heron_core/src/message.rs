//! Message Types for Thread Communication
//!
//! Commands flow from control thread -> engine thread
//! Events flow from engine thread -> control thread
//!
//! Parameter edits do not travel here; they go straight into the shared
//! [`EqParameters`](crate::EqParameters) store.

use heron_dsp::ChainSettings;
use serde::{Deserialize, Serialize};

use crate::config::StreamConfig;

/// Commands sent from the control thread to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start audio processing; `None` picks the system default device
    Start {
        input_device: Option<String>,
        output_device: Option<String>,
    },

    /// Stop audio processing
    Stop,

    /// Bypass all processing
    SetBypass(bool),

    /// Update stream configuration (restarts a running stream)
    UpdateStreamConfig(StreamConfig),

    /// Request current state (triggers StateUpdate event)
    RequestState,

    /// Shutdown the engine
    Shutdown,
}

/// Events sent from the engine to the control thread
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Engine started successfully
    Started,

    /// Engine stopped
    Stopped,

    /// Error occurred
    Error { message: String },

    /// Audio level update (for meters)
    /// Contains peak levels: (left, right) in range 0.0 - 1.0
    LevelUpdate { left: f32, right: f32 },

    /// Current state snapshot
    StateUpdate {
        is_running: bool,
        is_bypassed: bool,
        sample_rate: u32,
        settings: ChainSettings,
    },

    /// Buffer underrun detected (audio glitch)
    BufferUnderrun,

    /// Stream configuration changed
    ConfigChanged(StreamConfig),
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}
