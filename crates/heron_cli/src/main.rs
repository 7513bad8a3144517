//! Heron command line

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use heron_core::{
    AudioDevice, AudioEngine, ChainCoefficients, CutDesign, EngineConfig, EqParameters, Event, HeronSettings,
    ParameterId,
};
use heron_dsp::{response_curve, Slope, RESPONSE_MAX_HZ, RESPONSE_MIN_HZ};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "heron")]
#[command(about = "Three-band parametric EQ: low cut, peak, high cut", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List audio devices
    Devices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the magnitude response for a set of parameters
    Response(ResponseArgs),
    /// Filter live audio from an input device to an output device
    Run(RunArgs),
}

/// Parameter overrides shared by `response` and `run`
#[derive(Args, Debug, Default)]
struct ChainArgs {
    /// Low cut frequency in Hz
    #[arg(long)]
    low_cut: Option<f32>,
    /// Low cut slope in dB/octave (12, 24, 36, 48)
    #[arg(long)]
    low_cut_slope: Option<u32>,
    /// High cut frequency in Hz
    #[arg(long)]
    high_cut: Option<f32>,
    /// High cut slope in dB/octave (12, 24, 36, 48)
    #[arg(long)]
    high_cut_slope: Option<u32>,
    /// Peak centre frequency in Hz
    #[arg(long)]
    peak_freq: Option<f32>,
    /// Peak gain in dB
    #[arg(long, allow_hyphen_values = true)]
    peak_gain: Option<f32>,
    /// Peak quality
    #[arg(long)]
    peak_q: Option<f32>,
    /// Use identical cut sections at this Q instead of a Butterworth design
    #[arg(long, value_name = "Q", num_args = 0..=1, default_missing_value = "0.7071")]
    cascaded: Option<f32>,
}

impl ChainArgs {
    fn apply(&self, params: &EqParameters) -> anyhow::Result<()> {
        let continuous = [
            (ParameterId::LowCutFreq, self.low_cut),
            (ParameterId::HighCutFreq, self.high_cut),
            (ParameterId::PeakFreq, self.peak_freq),
            (ParameterId::PeakGain, self.peak_gain),
            (ParameterId::PeakQuality, self.peak_q),
        ];
        for (id, value) in continuous {
            if let Some(value) = value {
                params.set(id, value);
            }
        }

        let slopes = [
            (ParameterId::LowCutSlope, self.low_cut_slope),
            (ParameterId::HighCutSlope, self.high_cut_slope),
        ];
        for (id, db) in slopes {
            if let Some(db) = db {
                let slope = Slope::from_db_per_octave(db).with_context(|| format!("Invalid --{}", flag_name(id)))?;
                params.set(id, slope.index() as f32);
            }
        }
        Ok(())
    }

    fn design(&self) -> CutDesign {
        match self.cascaded {
            Some(q) => CutDesign::Cascaded { q },
            None => CutDesign::default(),
        }
    }
}

#[derive(Args)]
struct ResponseArgs {
    #[command(flatten)]
    chain: ChainArgs,
    /// Number of log-spaced points between 20 Hz and 20 kHz
    #[arg(long, default_value_t = 31)]
    points: usize,
    #[arg(long, default_value_t = 48000)]
    sample_rate: u32,
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    chain: ChainArgs,
    /// Input device name (default device if omitted)
    #[arg(long)]
    input: Option<String>,
    /// Output device name (default device if omitted)
    #[arg(long)]
    output: Option<String>,
    #[arg(long)]
    sample_rate: Option<u32>,
    #[arg(long)]
    buffer_size: Option<u32>,
    /// Stop after this many seconds instead of waiting for stdin
    #[arg(long)]
    duration: Option<u64>,
    /// Start with processing bypassed
    #[arg(long)]
    bypass: bool,
    /// Write the final parameters and devices back to the settings file
    #[arg(long)]
    save: bool,
}

impl RunArgs {
    /// Bypass for this session: the flag only ever turns it on
    fn bypassed(&self, saved: &HeronSettings) -> bool {
        self.bypass || saved.bypassed
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "heron=debug" } else { "heron=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Devices { json } => devices(json),
        Commands::Response(args) => response(args),
        Commands::Run(args) => run(args),
    }
}

fn devices(json: bool) -> anyhow::Result<()> {
    let devices = AudioDevice::enumerate_all().context("Failed to enumerate audio devices")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        println!(
            "{} {:?}\t{}\t{} ch\t{:?}",
            marker, device.device_type, device.name, device.max_channels, device.sample_rates
        );
    }
    Ok(())
}

fn response(args: ResponseArgs) -> anyhow::Result<()> {
    if args.points < 2 {
        bail!("--points must be at least 2");
    }

    let params = EqParameters::new();
    args.chain.apply(&params)?;

    let sample_rate = args.sample_rate as f32;
    let settings = params.snapshot().clamped_for(sample_rate);
    let coefficients = ChainCoefficients::from_settings(&settings, sample_rate, args.chain.design());
    let curve = response_curve(&coefficients, args.points, RESPONSE_MIN_HZ, RESPONSE_MAX_HZ);

    if args.json {
        let points: Vec<_> = curve
            .iter()
            .map(|p| serde_json::json!({ "frequency": p.frequency, "magnitude_db": p.magnitude_db }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "settings": settings, "response": points }))?
        );
        return Ok(());
    }

    for id in ParameterId::ALL {
        println!("{:>14}: {}", id.name(), params.display_string(id));
    }
    println!();
    for point in curve {
        println!("{:>10.1} Hz  {:>8.2} dB", point.frequency, point.magnitude_db);
    }
    Ok(())
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut saved = HeronSettings::load();
    if let Some(sample_rate) = args.sample_rate {
        saved.stream.sample_rate = sample_rate;
    }
    if let Some(buffer_size) = args.buffer_size {
        saved.stream.buffer_size = buffer_size;
    }
    let input = args.input.clone().or_else(|| saved.input_device.clone());
    let output = args.output.clone().or_else(|| saved.output_device.clone());

    let config = EngineConfig {
        stream: saved.stream,
        ring_buffer_frames: saved.stream.buffer_size as usize * 4,
        cut_design: args.chain.design(),
    };

    let params = Arc::new(saved.to_parameters());
    args.chain.apply(&params)?;

    let bypassed = args.bypassed(&saved);
    let engine = AudioEngine::with_parameters(config, Arc::clone(&params)).context("Failed to create audio engine")?;
    engine.set_bypass(bypassed)?;
    engine.start(input.clone(), output.clone())?;

    match engine.wait_event_timeout(Duration::from_secs(5)) {
        Some(Event::Started) => info!(latency_ms = config.stream.latency_ms(), "Running"),
        Some(Event::Error { message }) => bail!("Failed to start: {}", message),
        other => bail!("Engine did not start: {:?}", other),
    }

    let stop = Arc::new(AtomicBool::new(false));
    if args.duration.is_none() {
        eprintln!("Type `<parameter>=<value>` to adjust (e.g. `peak gain=6`), empty line to stop");
        spawn_stdin_control(Arc::clone(&params), Arc::clone(&stop));
    }
    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));

    let mut underruns = 0usize;
    while !stop.load(Ordering::Relaxed) && deadline.map_or(true, |d| Instant::now() < d) {
        match engine.wait_event_timeout(Duration::from_millis(100)) {
            Some(Event::LevelUpdate { left, right }) => debug!(left, right, "Levels"),
            Some(Event::BufferUnderrun) => underruns += 1,
            Some(Event::Error { message }) => warn!("{}", message),
            Some(event) => debug!(?event, "Engine event"),
            None => {}
        }
    }

    engine.stop()?;
    if underruns > 0 {
        warn!(underruns, "Buffer underruns during session");
    }

    if args.save {
        remember_session(&mut saved, &params, input, output, bypassed);
        saved.save().context("Failed to save settings")?;
    }
    Ok(())
}

fn remember_session(
    saved: &mut HeronSettings,
    params: &EqParameters,
    input: Option<String>,
    output: Option<String>,
    bypassed: bool,
) {
    saved.capture(params);
    saved.input_device = input;
    saved.output_device = output;
    saved.bypassed = bypassed;
}

/// Read `name=value` lines from stdin until an empty line or EOF
fn spawn_stdin_control(params: Arc<EqParameters>, stop: Arc<AtomicBool>) {
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                break;
            }

            let Some((name, value)) = parse_assignment(line) else {
                eprintln!("Expected `<parameter>=<value>`");
                continue;
            };
            match name.parse::<ParameterId>() {
                Ok(id) => {
                    params.set(id, value);
                    eprintln!("{} = {}", id, params.display_string(id));
                }
                Err(e) => eprintln!("{}", e),
            }
        }
        stop.store(true, Ordering::Relaxed);
    });
}

fn parse_assignment(line: &str) -> Option<(&str, f32)> {
    let (name, value) = line.split_once('=')?;
    Some((name.trim(), value.trim().parse().ok()?))
}

fn flag_name(id: ParameterId) -> &'static str {
    match id {
        ParameterId::LowCutSlope => "low-cut-slope",
        ParameterId::HighCutSlope => "high-cut-slope",
        ParameterId::LowCutFreq => "low-cut",
        ParameterId::HighCutFreq => "high-cut",
        ParameterId::PeakFreq => "peak-freq",
        ParameterId::PeakGain => "peak-gain",
        ParameterId::PeakQuality => "peak-q",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "heron",
            "response",
            "--peak-gain",
            "-6",
            "--low-cut-slope",
            "48",
            "--points",
            "8",
        ])
        .unwrap();

        match cli.command {
            Commands::Response(args) => {
                assert_eq!(args.chain.peak_gain, Some(-6.0));
                assert_eq!(args.chain.low_cut_slope, Some(48));
                assert_eq!(args.points, 8);
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn test_chain_args_apply() {
        let args = ChainArgs {
            high_cut: Some(8000.0),
            high_cut_slope: Some(24),
            peak_q: Some(100.0),
            ..Default::default()
        };
        let params = EqParameters::new();
        args.apply(&params).unwrap();

        let settings = params.snapshot();
        assert_eq!(settings.high_cut_freq, 8000.0);
        assert_eq!(settings.high_cut_slope, Slope::Db24);
        assert_eq!(settings.peak_quality, 10.0);
    }

    #[test]
    fn test_chain_args_reject_bad_slope() {
        let args = ChainArgs {
            low_cut_slope: Some(18),
            ..Default::default()
        };
        let err = args.apply(&EqParameters::new()).unwrap_err();
        assert!(err.to_string().contains("--low-cut-slope"));
    }

    #[test]
    fn test_cut_design_flag() {
        assert_eq!(ChainArgs::default().design(), CutDesign::Butterworth);

        let cli = Cli::try_parse_from(["heron", "response", "--cascaded"]).unwrap();
        let Commands::Response(args) = cli.command else {
            panic!("expected response");
        };
        assert_eq!(args.chain.design(), CutDesign::Cascaded { q: 0.7071 });

        let cli = Cli::try_parse_from(["heron", "response", "--cascaded", "1.2"]).unwrap();
        let Commands::Response(args) = cli.command else {
            panic!("expected response");
        };
        assert_eq!(args.chain.design(), CutDesign::Cascaded { q: 1.2 });
    }

    #[test]
    fn test_saved_bypass_survives_session() {
        let cli = Cli::try_parse_from(["heron", "run", "--save"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut saved = HeronSettings {
            bypassed: true,
            ..Default::default()
        };

        let bypassed = args.bypassed(&saved);
        assert!(bypassed);

        let params = EqParameters::new();
        params.set(ParameterId::PeakGain, 3.0);
        remember_session(&mut saved, &params, None, Some("Speakers".to_string()), bypassed);

        assert!(saved.bypassed);
        assert_eq!(saved.chain.peak_gain_db, 3.0);
        assert_eq!(saved.output_device.as_deref(), Some("Speakers"));
    }

    #[test]
    fn test_bypass_flag_overrides_saved_state() {
        let cli = Cli::try_parse_from(["heron", "run", "--bypass"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.bypassed(&HeronSettings::default()));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("peak gain = 6"), Some(("peak gain", 6.0)));
        assert_eq!(parse_assignment("Peak Freq=1500"), Some(("Peak Freq", 1500.0)));
        assert_eq!(parse_assignment("peak gain"), None);
        assert_eq!(parse_assignment("peak gain=loud"), None);
    }
}
