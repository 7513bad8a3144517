//! Audio Device Lookup
//!
//! Lists what the default host offers and resolves a device by name for the
//! stream builder. CPAL has no stable device IDs, so names are the key.

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Sample rates probed against each device's supported ranges
const PROBED_RATES: [u32; 6] = [44100, 48000, 88200, 96000, 176400, 192000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Input,
    Output,
}

/// A device as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub name: String,
    pub device_type: DeviceType,
    pub is_default: bool,
    /// Probed rates the device accepts (empty if querying failed)
    pub sample_rates: Vec<u32>,
    pub max_channels: u16,
}

impl AudioDevice {
    /// Every input and output device of the default host
    pub fn enumerate_all() -> EngineResult<Vec<AudioDevice>> {
        let host = cpal::default_host();
        let mut devices = Vec::new();

        for device_type in [DeviceType::Input, DeviceType::Output] {
            let default_name = default_device(&host, device_type).and_then(|d| d.name().ok());
            let Ok(found) = list_devices(&host, device_type) else {
                continue;
            };
            devices.extend(
                found
                    .iter()
                    .filter_map(|d| Self::describe(d, device_type, default_name.as_deref())),
            );
        }

        if devices.is_empty() {
            return Err(EngineError::NoDevicesFound);
        }
        Ok(devices)
    }

    /// Whether this device can run the stereo chain at `sample_rate`
    pub fn supports(&self, sample_rate: u32) -> bool {
        self.max_channels >= 2 && (self.sample_rates.is_empty() || self.sample_rates.contains(&sample_rate))
    }

    fn describe(device: &cpal::Device, device_type: DeviceType, default_name: Option<&str>) -> Option<Self> {
        let name = device.name().ok()?;
        let ranges: Vec<cpal::SupportedStreamConfigRange> = match device_type {
            DeviceType::Input => device.supported_input_configs().map(|c| c.collect()),
            DeviceType::Output => device.supported_output_configs().map(|c| c.collect()),
        }
        .unwrap_or_default();

        let (sample_rates, max_channels) = summarize_ranges(&ranges);
        Some(AudioDevice {
            is_default: default_name == Some(name.as_str()),
            name,
            device_type,
            sample_rates,
            max_channels,
        })
    }
}

/// Resolve a device by exact name, or the host default when `name` is None
pub fn find_device(name: Option<&str>, device_type: DeviceType) -> EngineResult<cpal::Device> {
    let host = cpal::default_host();

    let Some(wanted) = name else {
        return default_device(&host, device_type).ok_or(EngineError::NoDevicesFound);
    };

    let devices = list_devices(&host, device_type)?;
    for device in devices {
        if device.name().map(|n| n == wanted).unwrap_or(false) {
            debug!(device = wanted, ?device_type, "Resolved audio device");
            return Ok(device);
        }
    }
    Err(EngineError::DeviceNotFound(wanted.to_string()))
}

fn default_device(host: &cpal::Host, device_type: DeviceType) -> Option<cpal::Device> {
    match device_type {
        DeviceType::Input => host.default_input_device(),
        DeviceType::Output => host.default_output_device(),
    }
}

fn list_devices(host: &cpal::Host, device_type: DeviceType) -> EngineResult<Vec<cpal::Device>> {
    let devices: Result<Vec<cpal::Device>, cpal::DevicesError> = match device_type {
        DeviceType::Input => host.input_devices().map(|d| d.collect()),
        DeviceType::Output => host.output_devices().map(|d| d.collect()),
    };
    devices.map_err(|e| EngineError::DeviceNotFound(e.to_string()))
}

/// Probed rates covered by any range, and the widest channel count
fn summarize_ranges(ranges: &[cpal::SupportedStreamConfigRange]) -> (Vec<u32>, u16) {
    let max_channels = ranges.iter().map(|r| r.channels()).max().unwrap_or(0);
    let sample_rates = PROBED_RATES
        .into_iter()
        .filter(|rate| {
            ranges
                .iter()
                .any(|r| (r.min_sample_rate().0..=r.max_sample_rate().0).contains(rate))
        })
        .collect();
    (sample_rates, max_channels)
}
