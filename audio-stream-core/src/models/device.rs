use std::fmt;

use serde::Serialize;

/// Device slot value meaning "no device". Records carry device ids as single
/// unsigned bytes, so 255 is never a usable id.
pub const NO_DEVICE: u8 = u8::MAX;

/// An audio endpoint exposed by a host API.
///
/// A point-in-time snapshot decoded from a native record. Nothing refreshes
/// it when the hardware registry changes; fetch it again instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub(crate) id: u8,
    pub(crate) host_api: u8,
    pub(crate) name: String,
    pub(crate) max_input_channels: u8,
    pub(crate) max_output_channels: u8,
    pub(crate) default_low_input_latency: f64,
    pub(crate) default_low_output_latency: f64,
    pub(crate) default_high_input_latency: f64,
    pub(crate) default_high_output_latency: f64,
    pub(crate) default_sample_rate: f64,
}

impl Device {
    /// Global device index, as understood by the native engine.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Index of the host API that owns this device.
    pub fn host_api_id(&self) -> u8 {
        self.host_api
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_input_channels(&self) -> u8 {
        self.max_input_channels
    }

    pub fn max_output_channels(&self) -> u8 {
        self.max_output_channels
    }

    /// Default latency in seconds for interactive input.
    pub fn default_low_input_latency(&self) -> f64 {
        self.default_low_input_latency
    }

    pub fn default_low_output_latency(&self) -> f64 {
        self.default_low_output_latency
    }

    /// Default latency in seconds for robust, non-interactive input.
    pub fn default_high_input_latency(&self) -> f64 {
        self.default_high_input_latency
    }

    pub fn default_high_output_latency(&self) -> f64 {
        self.default_high_output_latency
    }

    pub fn default_sample_rate(&self) -> f64 {
        self.default_sample_rate
    }

    pub fn is_input(&self) -> bool {
        self.max_input_channels > 0
    }

    pub fn is_output(&self) -> bool {
        self.max_output_channels > 0
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Audio Device {{")?;
        writeln!(f, "\tID: {}", self.id)?;
        writeln!(f, "\tName: {}", self.name)?;
        writeln!(f, "\tHost API ID: {}", self.host_api)?;
        writeln!(f, "\tMax Input Channels: {}", self.max_input_channels)?;
        writeln!(f, "\tMax Output Channels: {}", self.max_output_channels)?;
        writeln!(f, "\tDefault Low Input Latency: {}", self.default_low_input_latency)?;
        writeln!(f, "\tDefault Low Output Latency: {}", self.default_low_output_latency)?;
        writeln!(f, "\tDefault High Input Latency: {}", self.default_high_input_latency)?;
        writeln!(f, "\tDefault High Output Latency: {}", self.default_high_output_latency)?;
        writeln!(f, "\tDefault Sample Rate: {}", self.default_sample_rate)?;
        write!(f, "}}")
    }
}
