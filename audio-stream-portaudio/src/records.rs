//! The native half of the descriptor protocol.
//!
//! Packs PortAudio's device and host API info into the records
//! `audio-stream-core` decodes, and unpacks the configuration record into
//! per-direction stream parameters.

use audio_stream_core::models::device::NO_DEVICE;
use audio_stream_core::models::error::NativeStatus;
use audio_stream_core::{ConfigRecord, DeviceRecord, HostApiRecord, NativeBuffer, SampleFormat, StreamMode};

/// paInvalidDevice
pub const INVALID_DEVICE: i32 = -9996;
/// paSampleFormatNotSupported
pub const SAMPLE_FORMAT_NOT_SUPPORTED: i32 = -9994;
/// paInternalError
pub const INTERNAL_ERROR: i32 = -9986;

/// A device or host API index as a record byte. Indices past 254 cannot be
/// represented; 255 is the "no device" sentinel.
pub fn index_byte(index: i32) -> Option<u8> {
    u8::try_from(index).ok().filter(|i| *i != NO_DEVICE)
}

/// A default-device index as a record byte; anything negative or out of
/// range becomes [`NO_DEVICE`].
pub fn default_device_byte(index: i32) -> u8 {
    index_byte(index).unwrap_or(NO_DEVICE)
}

/// Channel and device counts saturate at 255.
pub fn count_byte(count: i32) -> u8 {
    count.clamp(0, i32::from(u8::MAX)) as u8
}

/// Concatenate device records into one buffer.
pub fn pack_devices<I>(records: I) -> NativeBuffer
where
    I: IntoIterator<Item = DeviceRecord>,
{
    let mut bytes = Vec::new();
    for record in records {
        record.write_to(&mut bytes);
    }
    NativeBuffer::from_vec(bytes)
}

/// Concatenate host API records into one buffer.
pub fn pack_host_apis<I>(records: I) -> NativeBuffer
where
    I: IntoIterator<Item = HostApiRecord>,
{
    let mut bytes = Vec::new();
    for record in records {
        record.write_to(&mut bytes);
    }
    NativeBuffer::from_vec(bytes)
}

/// One direction of a stream, ready for `PaStreamParameters`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionParams {
    pub device: i32,
    pub channels: i32,
    pub sample_format: u32,
    pub suggested_latency: f64,
    /// Bytes per interleaved frame.
    pub frame_bytes: usize,
}

/// Everything `Pa_OpenStream` / `Pa_IsFormatSupported` need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenParams {
    pub input: Option<DirectionParams>,
    pub output: Option<DirectionParams>,
    pub sample_rate: f64,
    pub flags: u32,
}

fn direction(
    device: Option<u8>,
    channels: u8,
    format: Option<u32>,
    latency: f64,
) -> Result<DirectionParams, NativeStatus> {
    let device = device.ok_or_else(|| NativeStatus::new(INVALID_DEVICE))?;
    let format = format.ok_or_else(|| NativeStatus::new(SAMPLE_FORMAT_NOT_SUPPORTED))?;
    let sample_size = SampleFormat::resolve(format)
        .and_then(|f| f.sample_size())
        .ok_or_else(|| NativeStatus::new(SAMPLE_FORMAT_NOT_SUPPORTED))?;
    Ok(DirectionParams {
        device: i32::from(device),
        channels: i32::from(channels),
        sample_format: format,
        suggested_latency: latency,
        frame_bytes: sample_size * usize::from(channels),
    })
}

/// Unpack a configuration record. Only the directions the mode names are
/// filled in.
pub fn open_params(record: &ConfigRecord) -> Result<OpenParams, NativeStatus> {
    let mode: StreamMode = record
        .mode()
        .ok_or_else(|| NativeStatus::with_message(INTERNAL_ERROR, format!("bad stream mode byte {}", record.mode)))?;
    let input = if mode.has_input() {
        Some(direction(
            record.input_device_id(),
            record.input_channels,
            record.input_format_code(),
            record.input_latency,
        )?)
    } else {
        None
    };
    let output = if mode.has_output() {
        Some(direction(
            record.output_device_id(),
            record.output_channels,
            record.output_format_code(),
            record.output_latency,
        )?)
    } else {
        None
    };
    Ok(OpenParams {
        input,
        output,
        sample_rate: record.sample_rate,
        flags: record.flags,
    })
}
