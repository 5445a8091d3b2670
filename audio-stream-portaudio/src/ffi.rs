//! Raw bindings to the parts of the PortAudio C API the engine uses.

#![allow(non_snake_case)]

use std::os::raw::{c_char, c_int, c_ulong, c_void};

pub type PaError = c_int;
pub type PaDeviceIndex = c_int;
pub type PaHostApiIndex = c_int;
pub type PaHostApiTypeId = c_int;
pub type PaSampleFormat = c_ulong;
pub type PaStreamFlags = c_ulong;
pub type PaStreamCallbackFlags = c_ulong;
pub type PaTime = f64;
pub type PaStream = c_void;

pub const PA_NO_ERROR: PaError = 0;
pub const PA_FRAMES_PER_BUFFER_UNSPECIFIED: c_ulong = 0;

#[repr(C)]
pub struct PaHostApiInfo {
    pub struct_version: c_int,
    pub type_id: PaHostApiTypeId,
    pub name: *const c_char,
    pub device_count: c_int,
    pub default_input_device: PaDeviceIndex,
    pub default_output_device: PaDeviceIndex,
}

#[repr(C)]
pub struct PaDeviceInfo {
    pub struct_version: c_int,
    pub name: *const c_char,
    pub host_api: PaHostApiIndex,
    pub max_input_channels: c_int,
    pub max_output_channels: c_int,
    pub default_low_input_latency: PaTime,
    pub default_low_output_latency: PaTime,
    pub default_high_input_latency: PaTime,
    pub default_high_output_latency: PaTime,
    pub default_sample_rate: f64,
}

#[repr(C)]
pub struct PaStreamParameters {
    pub device: PaDeviceIndex,
    pub channel_count: c_int,
    pub sample_format: PaSampleFormat,
    pub suggested_latency: PaTime,
    pub host_api_specific_stream_info: *mut c_void,
}

#[repr(C)]
pub struct PaStreamCallbackTimeInfo {
    pub input_buffer_adc_time: PaTime,
    pub current_time: PaTime,
    pub output_buffer_dac_time: PaTime,
}

pub type PaStreamCallback = unsafe extern "C" fn(
    input: *const c_void,
    output: *mut c_void,
    frame_count: c_ulong,
    time_info: *const PaStreamCallbackTimeInfo,
    status_flags: PaStreamCallbackFlags,
    user_data: *mut c_void,
) -> c_int;

pub type PaStreamFinishedCallback = unsafe extern "C" fn(user_data: *mut c_void);

#[link(name = "portaudio")]
unsafe extern "C" {
    pub fn Pa_GetVersion() -> c_int;
    pub fn Pa_GetVersionText() -> *const c_char;
    pub fn Pa_GetErrorText(error_code: PaError) -> *const c_char;

    pub fn Pa_Initialize() -> PaError;
    pub fn Pa_Terminate() -> PaError;

    pub fn Pa_GetHostApiCount() -> PaHostApiIndex;
    pub fn Pa_GetDefaultHostApi() -> PaHostApiIndex;
    pub fn Pa_GetHostApiInfo(host_api: PaHostApiIndex) -> *const PaHostApiInfo;
    pub fn Pa_HostApiDeviceIndexToDeviceIndex(host_api: PaHostApiIndex, host_api_device_index: c_int) -> PaDeviceIndex;

    pub fn Pa_GetDeviceCount() -> PaDeviceIndex;
    pub fn Pa_GetDeviceInfo(device: PaDeviceIndex) -> *const PaDeviceInfo;

    pub fn Pa_IsFormatSupported(
        input_parameters: *const PaStreamParameters,
        output_parameters: *const PaStreamParameters,
        sample_rate: f64,
    ) -> PaError;

    pub fn Pa_OpenStream(
        stream: *mut *mut PaStream,
        input_parameters: *const PaStreamParameters,
        output_parameters: *const PaStreamParameters,
        sample_rate: f64,
        frames_per_buffer: c_ulong,
        stream_flags: PaStreamFlags,
        stream_callback: Option<PaStreamCallback>,
        user_data: *mut c_void,
    ) -> PaError;
    pub fn Pa_SetStreamFinishedCallback(stream: *mut PaStream, callback: Option<PaStreamFinishedCallback>) -> PaError;

    pub fn Pa_StartStream(stream: *mut PaStream) -> PaError;
    pub fn Pa_StopStream(stream: *mut PaStream) -> PaError;
    pub fn Pa_AbortStream(stream: *mut PaStream) -> PaError;
    pub fn Pa_CloseStream(stream: *mut PaStream) -> PaError;

    pub fn Pa_IsStreamStopped(stream: *mut PaStream) -> PaError;
    pub fn Pa_IsStreamActive(stream: *mut PaStream) -> PaError;
    pub fn Pa_GetStreamTime(stream: *mut PaStream) -> PaTime;
    pub fn Pa_GetStreamCpuLoad(stream: *mut PaStream) -> f64;
}
