//! Audio Engine - Main Entry Point
//!
//! The AudioEngine owns the control thread that opens and closes audio
//! streams, and exposes the parameter store to whoever drives the UI.
//!
//! ```text
//! control thread ──set_parameter──▶ EqParameters ◀──snapshot── audio callback
//!        │                                                      ▲
//!        └──Command──▶ engine thread ──builds/drops──▶ AudioStream
//!                            │
//!                            └──Event──▶ control thread
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use heron_dsp::{
    response_curve, ChainCoefficients, ChainSettings, ResponsePoint, RESPONSE_MAX_HZ, RESPONSE_MIN_HZ,
};
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, StreamConfig};
use crate::device::{find_device, AudioDevice, DeviceType};
use crate::error::{EngineError, EngineResult};
use crate::message::{Command, Event};
use crate::parameters::{EqParameters, ParameterId};
use crate::processor::EqProcessor;
use crate::stream::{AudioStream, SharedState};

/// Meter refresh period (~60 fps)
const LEVEL_INTERVAL: Duration = Duration::from_millis(16);

/// The main audio engine controller
///
/// Lives on the control thread; talks to the engine thread over channels
/// and to the audio callback through [`EqParameters`].
pub struct AudioEngine {
    command_sender: Sender<Command>,
    event_receiver: Receiver<Event>,
    audio_thread: Option<JoinHandle<()>>,
    shutdown_flag: Arc<AtomicBool>,
    config: EngineConfig,
    is_running: Arc<AtomicBool>,
    parameters: Arc<EqParameters>,
    /// Current stream settings, rewritten by the engine thread on every update
    stream_config: Arc<RwLock<StreamConfig>>,
}

/// Everything the engine thread needs
struct EngineThread {
    command_receiver: Receiver<Command>,
    event_sender: Sender<Event>,
    shutdown_flag: Arc<AtomicBool>,
    is_running: Arc<AtomicBool>,
    parameters: Arc<EqParameters>,
    stream_config: Arc<RwLock<StreamConfig>>,
    shared: Arc<SharedState>,
    config: EngineConfig,
    stream: Option<AudioStream>,
    devices: (Option<String>, Option<String>),
}

impl AudioEngine {
    /// Create a new audio engine with default configuration and parameters
    pub fn new() -> EngineResult<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Create a new audio engine with custom configuration
    pub fn with_config(config: EngineConfig) -> EngineResult<Self> {
        Self::with_parameters(config, Arc::new(EqParameters::new()))
    }

    /// Create an engine around an existing parameter store
    pub fn with_parameters(config: EngineConfig, parameters: Arc<EqParameters>) -> EngineResult<Self> {
        config.validate()?;

        let (command_sender, command_receiver) = bounded::<Command>(32);
        let (event_sender, event_receiver) = unbounded::<Event>();

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let is_running = Arc::new(AtomicBool::new(false));
        let stream_config = Arc::new(RwLock::new(config.stream));

        let shutdown_clone = Arc::clone(&shutdown_flag);
        let running_clone = Arc::clone(&is_running);
        let parameters_clone = Arc::clone(&parameters);
        let stream_config_clone = Arc::clone(&stream_config);

        // cpal streams are !Send, so the worker is built on its own thread
        let audio_thread = thread::Builder::new()
            .name("heron-engine".into())
            .spawn(move || {
                EngineThread {
                    command_receiver,
                    event_sender,
                    shutdown_flag: shutdown_clone,
                    is_running: running_clone,
                    parameters: parameters_clone,
                    stream_config: stream_config_clone,
                    shared: Arc::new(SharedState::new()),
                    config,
                    stream: None,
                    devices: (None, None),
                }
                .run()
            })
            .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

        Ok(Self {
            command_sender,
            event_receiver,
            audio_thread: Some(audio_thread),
            shutdown_flag,
            config,
            is_running,
            parameters,
            stream_config,
        })
    }

    /// Start processing between two devices (`None` = system default)
    pub fn start(&self, input_device: Option<String>, output_device: Option<String>) -> EngineResult<()> {
        self.send_command(Command::Start {
            input_device,
            output_device,
        })
    }

    /// Stop audio processing
    pub fn stop(&self) -> EngineResult<()> {
        self.send_command(Command::Stop)
    }

    /// Set global bypass state
    pub fn set_bypass(&self, bypassed: bool) -> EngineResult<()> {
        self.send_command(Command::SetBypass(bypassed))
    }

    /// Change stream settings; a running stream is reopened
    pub fn update_stream_config(&self, config: StreamConfig) -> EngineResult<()> {
        config.validate()?;
        self.send_command(Command::UpdateStreamConfig(config))
    }

    /// Request state update
    pub fn request_state(&self) -> EngineResult<()> {
        self.send_command(Command::RequestState)
    }

    /// Edit one parameter; the audio thread picks it up on its next block
    pub fn set_parameter(&self, id: ParameterId, value: f32) -> f32 {
        let stored = self.parameters.set(id, value);
        debug!(parameter = %id, value = stored, "Parameter changed");
        stored
    }

    /// Replace all parameters at once
    pub fn apply_settings(&self, settings: &ChainSettings) {
        self.parameters.set_settings(settings);
        debug!(?settings, "Parameters replaced");
    }

    /// Current parameter values
    pub fn settings(&self) -> ChainSettings {
        self.parameters.snapshot()
    }

    pub fn parameters(&self) -> &Arc<EqParameters> {
        &self.parameters
    }

    pub fn sample_rate(&self) -> u32 {
        self.stream_config.read().sample_rate
    }

    /// Coefficients the audio thread would install for the current parameters
    pub fn coefficients(&self) -> ChainCoefficients {
        let sample_rate = self.sample_rate() as f32;
        let settings = self.settings().clamped_for(sample_rate);
        ChainCoefficients::from_settings(&settings, sample_rate, self.config.cut_design)
    }

    /// Log-spaced magnitude response across the audible range
    pub fn response_curve(&self, points: usize) -> Vec<ResponsePoint> {
        response_curve(&self.coefficients(), points, RESPONSE_MIN_HZ, RESPONSE_MAX_HZ)
    }

    /// Check if engine is currently running
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Get next event (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Get next event (blocking)
    pub fn wait_event(&self) -> Option<Event> {
        self.event_receiver.recv().ok()
    }

    /// Get next event, giving up after `timeout`
    pub fn wait_event_timeout(&self, timeout: Duration) -> Option<Event> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// Get all available devices
    pub fn list_devices(&self) -> EngineResult<Vec<AudioDevice>> {
        AudioDevice::enumerate_all()
    }

    /// Engine configuration including any stream update applied so far
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            stream: *self.stream_config.read(),
            ..self.config
        }
    }

    fn send_command(&self, command: Command) -> EngineResult<()> {
        self.command_sender
            .send(command)
            .map_err(|_| EngineError::ChannelSendError)
    }
}

impl EngineThread {
    fn run(mut self) {
        info!("Engine thread started");

        while !self.shutdown_flag.load(Ordering::SeqCst) {
            match self.command_receiver.recv_timeout(LEVEL_INTERVAL) {
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => self.publish_levels(),
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Command channel closed");
                    break;
                }
            }
        }

        self.close_stream();
        info!("Engine thread stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start {
                input_device,
                output_device,
            } => {
                if self.stream.is_some() {
                    warn!("Engine already running");
                    self.emit(Event::error(EngineError::AlreadyRunning));
                    return;
                }
                self.devices = (input_device, output_device);
                self.open_stream();
            }

            Command::Stop => {
                if self.stream.is_none() {
                    self.emit(Event::error(EngineError::NotRunning));
                    return;
                }
                self.close_stream();
                self.emit(Event::Stopped);
            }

            Command::SetBypass(bypassed) => {
                info!(bypassed, "Bypass changed");
                self.shared.bypassed.store(bypassed, Ordering::Relaxed);
            }

            Command::UpdateStreamConfig(stream) => {
                info!(?stream, "Stream config update");
                self.config.stream = stream;
                *self.stream_config.write() = stream;

                if self.stream.is_some() {
                    self.close_stream();
                    self.open_stream();
                }
                self.emit(Event::ConfigChanged(stream));
            }

            Command::RequestState => {
                let state = Event::StateUpdate {
                    is_running: self.stream.is_some(),
                    is_bypassed: self.shared.is_bypassed(),
                    sample_rate: self.config.stream.sample_rate,
                    settings: self.parameters.snapshot(),
                };
                self.emit(state);
            }

            Command::Shutdown => {
                info!("Shutdown command received");
                self.shutdown_flag.store(true, Ordering::SeqCst);
            }
        }
    }

    fn open_stream(&mut self) {
        info!(input = ?self.devices.0, output = ?self.devices.1, "Starting audio engine");

        match self.build_stream() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.is_running.store(true, Ordering::SeqCst);
                self.emit(Event::Started);
            }
            Err(e) => {
                error!("Failed to start stream: {}", e);
                self.emit(Event::error(e));
            }
        }
    }

    fn build_stream(&self) -> EngineResult<AudioStream> {
        let input = find_device(self.devices.0.as_deref(), DeviceType::Input)?;
        let output = find_device(self.devices.1.as_deref(), DeviceType::Output)?;

        let processor = EqProcessor::new(
            Arc::clone(&self.parameters),
            self.config.stream.sample_rate_hz(),
            self.config.cut_design,
        )?;

        AudioStream::new(
            self.config,
            &input,
            &output,
            processor,
            Arc::clone(&self.shared),
            self.event_sender.clone(),
        )
    }

    fn close_stream(&mut self) {
        if self.stream.take().is_some() {
            info!("Audio streams closed");
        }
        self.shared.set_peaks(0.0, 0.0);
        self.is_running.store(false, Ordering::SeqCst);
    }

    fn publish_levels(&self) {
        if self.stream.is_none() {
            return;
        }
        let (left, right) = self.shared.peaks();
        // Only send if there's actual audio
        if left > 0.001 || right > 0.001 {
            self.emit(Event::LevelUpdate { left, right });
        }
    }

    fn emit(&self, event: Event) {
        let _ = self.event_sender.send(event);
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        let _ = self.command_sender.send(Command::Shutdown);

        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
        }
    }
}
