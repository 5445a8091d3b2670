//! Fixed-layout records exchanged with the native engine.
//!
//! All multi-byte fields use the platform's native byte order. Nothing in
//! a record says which order that is; both sides must be built for the same
//! target.

use crate::models::config::{StreamConfiguration, StreamMode};
use crate::models::device::{Device, NO_DEVICE};
use crate::models::error::StreamError;
use crate::models::host_api::{HostApi, HostApiType};
use crate::models::sample_format::NO_FORMAT;

use super::cursor::{put_f64, put_i32, put_name, put_u32, RecordReader};

/// Size of a device record before its name bytes.
pub const DEVICE_FIXED_LEN: usize = 5 * 8 + 4 + 1;
/// Size of a host API record before its name bytes.
pub const HOST_API_FIXED_LEN: usize = 5 + 1;
/// Size of a serialized stream configuration.
pub const CONFIG_RECORD_LEN: usize = 45;
const CONFIG_PAYLOAD_LEN: usize = 3 * 8 + 3 * 4 + 5;

/// Raw device record as written by the native side.
///
/// Layout:
/// ```text
/// [0-7]    default high input latency   f64
/// [8-15]   default high output latency  f64
/// [16-23]  default low input latency    f64
/// [24-31]  default low output latency   f64
/// [32-39]  default sample rate          f64
/// [40]     device index                 u8
/// [41]     host API index               u8
/// [42]     max input channels           u8
/// [43]     max output channels          u8
/// [44]     name length N                u8
/// [45..]   name                         N bytes
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub default_high_input_latency: f64,
    pub default_high_output_latency: f64,
    pub default_low_input_latency: f64,
    pub default_low_output_latency: f64,
    pub default_sample_rate: f64,
    pub id: u8,
    pub host_api: u8,
    pub max_input_channels: u8,
    pub max_output_channels: u8,
    pub name: String,
}

impl DeviceRecord {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        put_f64(out, self.default_high_input_latency);
        put_f64(out, self.default_high_output_latency);
        put_f64(out, self.default_low_input_latency);
        put_f64(out, self.default_low_output_latency);
        put_f64(out, self.default_sample_rate);
        out.push(self.id);
        out.push(self.host_api);
        out.push(self.max_input_channels);
        out.push(self.max_output_channels);
        put_name(out, &self.name);
    }

    pub fn read_from(reader: &mut RecordReader<'_>) -> Result<Self, StreamError> {
        Ok(Self {
            default_high_input_latency: reader.read_f64()?,
            default_high_output_latency: reader.read_f64()?,
            default_low_input_latency: reader.read_f64()?,
            default_low_output_latency: reader.read_f64()?,
            default_sample_rate: reader.read_f64()?,
            id: reader.read_u8()?,
            host_api: reader.read_u8()?,
            max_input_channels: reader.read_u8()?,
            max_output_channels: reader.read_u8()?,
            name: reader.read_name()?,
        })
    }
}

impl From<DeviceRecord> for Device {
    fn from(record: DeviceRecord) -> Self {
        Device {
            id: record.id,
            host_api: record.host_api,
            name: record.name,
            max_input_channels: record.max_input_channels,
            max_output_channels: record.max_output_channels,
            default_low_input_latency: record.default_low_input_latency,
            default_low_output_latency: record.default_low_output_latency,
            default_high_input_latency: record.default_high_input_latency,
            default_high_output_latency: record.default_high_output_latency,
            default_sample_rate: record.default_sample_rate,
        }
    }
}

/// Raw host API record as written by the native side.
///
/// Layout:
/// ```text
/// [0]     default input device    u8 (255 = none)
/// [1]     default output device   u8 (255 = none)
/// [2]     device count            u8
/// [3]     host API index          u8
/// [4]     type code               u8
/// [5]     name length N           u8
/// [6..]   name                    N bytes
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostApiRecord {
    pub default_input_device: u8,
    pub default_output_device: u8,
    pub device_count: u8,
    pub id: u8,
    pub type_code: u8,
    pub name: String,
}

impl HostApiRecord {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.default_input_device);
        out.push(self.default_output_device);
        out.push(self.device_count);
        out.push(self.id);
        out.push(self.type_code);
        put_name(out, &self.name);
    }

    pub fn read_from(reader: &mut RecordReader<'_>) -> Result<Self, StreamError> {
        Ok(Self {
            default_input_device: reader.read_u8()?,
            default_output_device: reader.read_u8()?,
            device_count: reader.read_u8()?,
            id: reader.read_u8()?,
            type_code: reader.read_u8()?,
            name: reader.read_name()?,
        })
    }
}

impl From<HostApiRecord> for HostApi {
    fn from(record: HostApiRecord) -> Self {
        HostApi {
            id: record.id,
            type_code: record.type_code,
            host_api_type: HostApiType::resolve(record.type_code),
            device_count: record.device_count,
            default_input_device: device_ref(record.default_input_device),
            default_output_device: device_ref(record.default_output_device),
            name: record.name,
        }
    }
}

fn device_ref(raw: u8) -> Option<u8> {
    (raw != NO_DEVICE).then_some(raw)
}

/// Decodes exactly one device record; leftover bytes are an integrity error.
pub fn decode_device(bytes: &[u8]) -> Result<Device, StreamError> {
    let mut reader = RecordReader::new("device", bytes);
    let record = DeviceRecord::read_from(&mut reader)?;
    reader.expect_exhausted()?;
    Ok(record.into())
}

/// Decodes exactly one host API record; leftover bytes are an integrity error.
pub fn decode_host_api(bytes: &[u8]) -> Result<HostApi, StreamError> {
    let mut reader = RecordReader::new("host API", bytes);
    let record = HostApiRecord::read_from(&mut reader)?;
    reader.expect_exhausted()?;
    Ok(record.into())
}

/// Decodes back-to-back device records until the buffer is used up.
pub fn decode_devices(bytes: &[u8]) -> Result<Vec<Device>, StreamError> {
    let mut reader = RecordReader::new("device list", bytes);
    let mut devices = Vec::new();
    while !reader.is_exhausted() {
        devices.push(DeviceRecord::read_from(&mut reader)?.into());
    }
    Ok(devices)
}

/// Decodes back-to-back host API records until the buffer is used up.
pub fn decode_host_apis(bytes: &[u8]) -> Result<Vec<HostApi>, StreamError> {
    let mut reader = RecordReader::new("host API list", bytes);
    let mut apis = Vec::new();
    while !reader.is_exhausted() {
        apis.push(HostApiRecord::read_from(&mut reader)?.into());
    }
    Ok(apis)
}

/// A serialized stream configuration, field for field.
///
/// Layout (41 bytes of payload, zero-padded to 45):
/// ```text
/// [0-7]    input latency       f64
/// [8-15]   output latency      f64
/// [16-23]  sample rate         f64
/// [24-27]  input format code   i32 (-1 = none)
/// [28-31]  output format code  i32 (-1 = none)
/// [32-35]  flags               u32
/// [36]     mode                i8  (ordinal + 1)
/// [37]     input channels      u8
/// [38]     input device        u8  (255 = none)
/// [39]     output channels     u8
/// [40]     output device       u8  (255 = none)
/// [41-44]  padding
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigRecord {
    pub input_latency: f64,
    pub output_latency: f64,
    pub sample_rate: f64,
    pub input_format: i32,
    pub output_format: i32,
    pub flags: u32,
    pub mode: i8,
    pub input_channels: u8,
    pub input_device: u8,
    pub output_channels: u8,
    pub output_device: u8,
}

impl ConfigRecord {
    /// Validates `config` and lays it out for the native engine.
    pub fn from_configuration(config: &StreamConfiguration) -> Result<Self, StreamError> {
        let mode = config.validate()?;
        Ok(Self {
            input_latency: config.input_latency,
            output_latency: config.output_latency,
            sample_rate: config.sample_rate,
            input_format: format_slot(config.input_format.as_ref().map(|f| f.code())),
            output_format: format_slot(config.output_format.as_ref().map(|f| f.code())),
            flags: config.flags,
            mode: mode.ordinal() as i8 + 1,
            input_channels: config.input_channels,
            input_device: config.input_device.as_ref().map_or(NO_DEVICE, |d| d.id()),
            output_channels: config.output_channels,
            output_device: config.output_device.as_ref().map_or(NO_DEVICE, |d| d.id()),
        })
    }

    pub fn to_bytes(&self) -> [u8; CONFIG_RECORD_LEN] {
        let mut out = Vec::with_capacity(CONFIG_RECORD_LEN);
        put_f64(&mut out, self.input_latency);
        put_f64(&mut out, self.output_latency);
        put_f64(&mut out, self.sample_rate);
        put_i32(&mut out, self.input_format);
        put_i32(&mut out, self.output_format);
        put_u32(&mut out, self.flags);
        out.push(self.mode as u8);
        out.push(self.input_channels);
        out.push(self.input_device);
        out.push(self.output_channels);
        out.push(self.output_device);
        debug_assert_eq!(out.len(), CONFIG_PAYLOAD_LEN);

        let mut record = [0u8; CONFIG_RECORD_LEN];
        record[..CONFIG_PAYLOAD_LEN].copy_from_slice(&out);
        record
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StreamError> {
        if bytes.len() != CONFIG_RECORD_LEN {
            return Err(StreamError::Integrity {
                record: "stream configuration",
                detail: format!("expected {} bytes, got {}", CONFIG_RECORD_LEN, bytes.len()),
            });
        }
        let mut reader = RecordReader::new("stream configuration", &bytes[..CONFIG_PAYLOAD_LEN]);
        let record = Self {
            input_latency: reader.read_f64()?,
            output_latency: reader.read_f64()?,
            sample_rate: reader.read_f64()?,
            input_format: reader.read_i32()?,
            output_format: reader.read_i32()?,
            flags: reader.read_u32()?,
            mode: reader.read_i8()?,
            input_channels: reader.read_u8()?,
            input_device: reader.read_u8()?,
            output_channels: reader.read_u8()?,
            output_device: reader.read_u8()?,
        };
        reader.expect_exhausted()?;
        Ok(record)
    }

    pub fn mode(&self) -> Option<StreamMode> {
        if self.mode < 1 {
            return None;
        }
        StreamMode::from_ordinal(self.mode as u8 - 1)
    }

    pub fn input_format_code(&self) -> Option<u32> {
        format_code(self.input_format)
    }

    pub fn output_format_code(&self) -> Option<u32> {
        format_code(self.output_format)
    }

    pub fn input_device_id(&self) -> Option<u8> {
        device_ref(self.input_device)
    }

    pub fn output_device_id(&self) -> Option<u8> {
        device_ref(self.output_device)
    }
}

fn format_slot(code: Option<u32>) -> i32 {
    code.unwrap_or(NO_FORMAT) as i32
}

fn format_code(raw: i32) -> Option<u32> {
    let code = raw as u32;
    (code != NO_FORMAT).then_some(code)
}

/// Validates `config` and serializes it into the fixed 45-byte record.
pub fn encode_configuration(config: &StreamConfiguration) -> Result<[u8; CONFIG_RECORD_LEN], StreamError> {
    Ok(ConfigRecord::from_configuration(config)?.to_bytes())
}
