use std::fmt;

use serde::Serialize;

use super::device::{Device, NO_DEVICE};
use super::error::StreamError;
use super::sample_format::SampleFormat;

/// Direction(s) a stream carries audio in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    InputOnly,
    OutputOnly,
    Bidirectional,
}

impl StreamMode {
    /// Zero-based position, as serialized (plus one) into the configuration record.
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::InputOnly => 0,
            Self::OutputOnly => 1,
            Self::Bidirectional => 2,
        }
    }

    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::InputOnly),
            1 => Some(Self::OutputOnly),
            2 => Some(Self::Bidirectional),
            _ => None,
        }
    }

    pub fn has_input(self) -> bool {
        !matches!(self, Self::OutputOnly)
    }

    pub fn has_output(self) -> bool {
        !matches!(self, Self::InputOnly)
    }
}

/// Parameters for opening a stream.
///
/// A mutable value object: set the fields (or chain the `with_*` builders),
/// then hand it to [`AudioHost::open_stream`](crate::session::host::AudioHost::open_stream).
/// The stream keeps its own snapshot; later edits do not affect it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamConfiguration {
    /// Required. Decides which of the per-direction fields must be set.
    pub mode: Option<StreamMode>,

    pub input_channels: u8,
    pub input_device: Option<Device>,
    pub input_format: Option<SampleFormat>,
    /// Suggested input latency in seconds.
    pub input_latency: f64,

    pub output_channels: u8,
    pub output_device: Option<Device>,
    pub output_format: Option<SampleFormat>,
    /// Suggested output latency in seconds.
    pub output_latency: f64,

    /// Shared by both directions, in Hz.
    pub sample_rate: f64,

    /// Passed to the native engine uninterpreted.
    pub flags: u32,
}

impl StreamConfiguration {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn with_input(mut self, device: Device, channels: u8, format: SampleFormat, latency: f64) -> Self {
        self.input_device = Some(device);
        self.input_channels = channels;
        self.input_format = Some(format);
        self.input_latency = latency;
        self
    }

    pub fn with_output(mut self, device: Device, channels: u8, format: SampleFormat, latency: f64) -> Self {
        self.output_device = Some(device);
        self.output_channels = channels;
        self.output_format = Some(format);
        self.output_latency = latency;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn set_mode(&mut self, mode: StreamMode) {
        self.mode = Some(mode);
    }

    pub fn set_input_device(&mut self, device: Device) {
        self.input_device = Some(device);
    }

    pub fn set_output_device(&mut self, device: Device) {
        self.output_device = Some(device);
    }

    pub fn set_input_format(&mut self, format: SampleFormat) {
        self.input_format = Some(format);
    }

    pub fn set_output_format(&mut self, format: SampleFormat) {
        self.output_format = Some(format);
    }

    /// Checks that every field the mode requires is present.
    pub fn validate(&self) -> Result<StreamMode, StreamError> {
        let mode = self
            .mode
            .ok_or_else(|| StreamError::Configuration("stream mode is not set".into()))?;
        if mode.has_output() {
            match &self.output_device {
                None => return Err(StreamError::Configuration("output device is not set".into())),
                Some(d) if d.id() == NO_DEVICE => {
                    return Err(StreamError::Configuration(format!("output device id {} is reserved", NO_DEVICE)));
                }
                Some(_) => {}
            }
            if self.output_format.is_none() {
                return Err(StreamError::Configuration("output format is not set".into()));
            }
        }
        if mode.has_input() {
            match &self.input_device {
                None => return Err(StreamError::Configuration("input device is not set".into())),
                Some(d) if d.id() == NO_DEVICE => {
                    return Err(StreamError::Configuration(format!("input device id {} is reserved", NO_DEVICE)));
                }
                Some(_) => {}
            }
            if self.input_format.is_none() {
                return Err(StreamError::Configuration("input format is not set".into()));
            }
        }
        Ok(mode)
    }

    /// Bytes per input frame, if the input format has a known sample size.
    pub fn input_frame_size(&self) -> Option<usize> {
        let format = self.input_format.as_ref()?;
        Some(format.sample_size()? * usize::from(self.input_channels))
    }

    pub fn output_frame_size(&self) -> Option<usize> {
        let format = self.output_format.as_ref()?;
        Some(format.sample_size()? * usize::from(self.output_channels))
    }
}

impl fmt::Display for StreamConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let device = |d: &Option<Device>| d.as_ref().map_or_else(|| "none".to_string(), |d| d.id().to_string());
        let format = |s: &Option<SampleFormat>| s.as_ref().map_or_else(|| "none".to_string(), |s| s.to_string());
        writeln!(f, "Stream Configuration {{")?;
        match self.mode {
            Some(mode) => writeln!(f, "\tMode: {:?}", mode)?,
            None => writeln!(f, "\tMode: unset")?,
        }
        writeln!(f, "\tInput Device: {}", device(&self.input_device))?;
        writeln!(f, "\tInput Channels: {}", self.input_channels)?;
        writeln!(f, "\tInput Format: {}", format(&self.input_format))?;
        writeln!(f, "\tInput Latency: {}", self.input_latency)?;
        writeln!(f, "\tOutput Device: {}", device(&self.output_device))?;
        writeln!(f, "\tOutput Channels: {}", self.output_channels)?;
        writeln!(f, "\tOutput Format: {}", format(&self.output_format))?;
        writeln!(f, "\tOutput Latency: {}", self.output_latency)?;
        writeln!(f, "\tSample Rate: {}", self.sample_rate)?;
        writeln!(f, "\tFlags: {:#x}", self.flags)?;
        write!(f, "}}")
    }
}
