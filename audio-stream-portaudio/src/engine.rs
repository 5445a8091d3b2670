//! `NativeEngine` over the PortAudio C library.
//!
//! Streams are opened in callback mode. Each open stream owns a boxed
//! `UserData` whose address PortAudio hands back to the two C trampolines,
//! which forward into the core's `CallbackBridge`.

use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_ulong, c_void};
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;

use audio_stream_core::models::error::{NativeStatus, BAD_STREAM_PTR};
use audio_stream_core::{CallbackBridge, ConfigRecord, DeviceRecord, HostApiRecord, NativeBuffer, NativeEngine, StreamId};

use crate::ffi::*;
use crate::records::{
    count_byte, default_device_byte, index_byte, open_params, pack_devices, pack_host_apis, DirectionParams,
    OpenParams, INTERNAL_ERROR, INVALID_DEVICE,
};

/// paInvalidHostApi
const INVALID_HOST_API: i32 = -9978;

/// Read by the audio thread for every period of one stream.
struct UserData {
    bridge: CallbackBridge,
    id: StreamId,
    input_frame_bytes: usize,
    output_frame_bytes: usize,
}

struct OpenStream {
    handle: *mut PaStream,
    /// Must outlive the native stream; dropped only after `Pa_CloseStream`.
    _user_data: Box<UserData>,
}

// SAFETY: the PaStream handle is only passed back to PortAudio, which
// allows stream calls from any thread. UserData is Send + Sync.
unsafe impl Send for OpenStream {}

/// PortAudio-backed engine.
///
/// Stream identifiers are allocated here and never reused within one
/// process.
pub struct PortAudioEngine {
    streams: Mutex<HashMap<StreamId, OpenStream>>,
    next_id: AtomicI32,
}

impl PortAudioEngine {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            next_id: AtomicI32::new(1),
        }
    }

    fn handle(&self, id: StreamId) -> Result<*mut PaStream, NativeStatus> {
        self.streams
            .lock()
            .get(&id)
            .map(|stream| stream.handle)
            .ok_or_else(|| NativeStatus::new(BAD_STREAM_PTR))
    }
}

impl Default for PortAudioEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn error_text(code: PaError) -> String {
    // SAFETY: PortAudio returns a static string for every code.
    unsafe { c_string(Pa_GetErrorText(code)) }
}

/// Map a PortAudio return value to a result, keeping the library's message.
fn check(code: PaError) -> Result<PaError, NativeStatus> {
    if code < PA_NO_ERROR {
        Err(NativeStatus::with_message(code, error_text(code)))
    } else {
        Ok(code)
    }
}

/// # Safety
/// `text` must be null or a valid NUL-terminated string.
unsafe fn c_string(text: *const c_char) -> String {
    if text.is_null() {
        return String::new();
    }
    CStr::from_ptr(text).to_string_lossy().into_owned()
}

fn host_api_record(index: PaHostApiIndex) -> Result<HostApiRecord, NativeStatus> {
    let id = index_byte(index).ok_or_else(|| NativeStatus::new(INVALID_HOST_API))?;
    // SAFETY: PortAudio owns the info struct until terminate; we copy out of it.
    let info = unsafe { Pa_GetHostApiInfo(index).as_ref() }.ok_or_else(|| NativeStatus::new(INVALID_HOST_API))?;
    Ok(HostApiRecord {
        default_input_device: default_device_byte(info.default_input_device),
        default_output_device: default_device_byte(info.default_output_device),
        device_count: count_byte(info.device_count),
        id,
        type_code: count_byte(info.type_id),
        name: unsafe { c_string(info.name) },
    })
}

fn device_record(index: PaDeviceIndex) -> Result<DeviceRecord, NativeStatus> {
    let id = index_byte(index).ok_or_else(|| NativeStatus::new(INVALID_DEVICE))?;
    // SAFETY: as above.
    let info = unsafe { Pa_GetDeviceInfo(index).as_ref() }.ok_or_else(|| NativeStatus::new(INVALID_DEVICE))?;
    Ok(DeviceRecord {
        default_high_input_latency: info.default_high_input_latency,
        default_high_output_latency: info.default_high_output_latency,
        default_low_input_latency: info.default_low_input_latency,
        default_low_output_latency: info.default_low_output_latency,
        default_sample_rate: info.default_sample_rate,
        id,
        host_api: count_byte(info.host_api),
        max_input_channels: count_byte(info.max_input_channels),
        max_output_channels: count_byte(info.max_output_channels),
        name: unsafe { c_string(info.name) },
    })
}

/// Enumeration skips indices that do not fit in a record byte.
fn representable(index: c_int) -> bool {
    if index_byte(index).is_some() {
        true
    } else {
        log::warn!("Skipping PortAudio index {}: not representable in a descriptor record", index);
        false
    }
}

fn stream_parameters(params: &Option<DirectionParams>) -> Option<PaStreamParameters> {
    params.as_ref().map(|p| PaStreamParameters {
        device: p.device,
        channel_count: p.channels,
        sample_format: PaSampleFormat::from(p.sample_format),
        suggested_latency: p.suggested_latency,
        host_api_specific_stream_info: ptr::null_mut(),
    })
}

fn as_ptr(params: &Option<PaStreamParameters>) -> *const PaStreamParameters {
    params.as_ref().map_or(ptr::null(), |p| p as *const PaStreamParameters)
}

fn decode_config(configuration: &[u8]) -> Result<OpenParams, NativeStatus> {
    let record =
        ConfigRecord::decode(configuration).map_err(|e| NativeStatus::with_message(INTERNAL_ERROR, e.to_string()))?;
    open_params(&record)
}

unsafe extern "C" fn stream_callback(
    input: *const c_void,
    output: *mut c_void,
    frame_count: c_ulong,
    _time_info: *const PaStreamCallbackTimeInfo,
    _status_flags: PaStreamCallbackFlags,
    user_data: *mut c_void,
) -> c_int {
    // SAFETY: user_data is the boxed UserData registered at open, alive
    // until after Pa_CloseStream returns.
    let data = &*(user_data as *const UserData);
    let frames = frame_count as usize;
    let input = if input.is_null() || data.input_frame_bytes == 0 {
        None
    } else {
        Some(slice::from_raw_parts(input as *const u8, frames * data.input_frame_bytes))
    };
    let output = if output.is_null() || data.output_frame_bytes == 0 {
        None
    } else {
        Some(slice::from_raw_parts_mut(output as *mut u8, frames * data.output_frame_bytes))
    };
    data.bridge.process(data.id, input, output)
}

unsafe extern "C" fn stream_finished(user_data: *mut c_void) {
    // SAFETY: see stream_callback.
    let data = &*(user_data as *const UserData);
    data.bridge.finished(data.id);
}

impl NativeEngine for PortAudioEngine {
    fn initialize(&self) -> Result<(), NativeStatus> {
        check(unsafe { Pa_Initialize() })?;
        Ok(())
    }

    fn terminate(&self) -> Result<(), NativeStatus> {
        let result = check(unsafe { Pa_Terminate() });
        // Pa_Terminate closes every stream; only now is the user data unused.
        let dropped = std::mem::take(&mut *self.streams.lock());
        if !dropped.is_empty() {
            log::debug!("Released {} stream(s) closed by Pa_Terminate", dropped.len());
        }
        result.map(|_| ())
    }

    fn version(&self) -> i32 {
        unsafe { Pa_GetVersion() }
    }

    fn version_text(&self) -> String {
        unsafe { c_string(Pa_GetVersionText()) }
    }

    fn host_apis(&self) -> Result<NativeBuffer, NativeStatus> {
        let count = check(unsafe { Pa_GetHostApiCount() })?;
        let records = (0..count)
            .filter(|&i| representable(i))
            .map(host_api_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pack_host_apis(records))
    }

    fn devices(&self) -> Result<NativeBuffer, NativeStatus> {
        let count = check(unsafe { Pa_GetDeviceCount() })?;
        let records = (0..count)
            .filter(|&i| representable(i))
            .map(device_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pack_devices(records))
    }

    fn host_api_devices(&self, host_api: u8) -> Result<NativeBuffer, NativeStatus> {
        let host_api = PaHostApiIndex::from(host_api);
        let api = host_api_record(host_api)?;
        let mut records = Vec::with_capacity(usize::from(api.device_count));
        for local in 0..c_int::from(api.device_count) {
            let index = check(unsafe { Pa_HostApiDeviceIndexToDeviceIndex(host_api, local) })?;
            if representable(index) {
                records.push(device_record(index)?);
            }
        }
        Ok(pack_devices(records))
    }

    fn device(&self, index: u8) -> Result<NativeBuffer, NativeStatus> {
        let count = check(unsafe { Pa_GetDeviceCount() })?;
        let index = PaDeviceIndex::from(index);
        if index >= count {
            return Err(NativeStatus::with_message(INVALID_DEVICE, error_text(INVALID_DEVICE)));
        }
        Ok(pack_devices([device_record(index)?]))
    }

    fn host_api(&self, index: u8) -> Result<NativeBuffer, NativeStatus> {
        let count = check(unsafe { Pa_GetHostApiCount() })?;
        let index = PaHostApiIndex::from(index);
        if index >= count {
            return Err(NativeStatus::with_message(INVALID_HOST_API, error_text(INVALID_HOST_API)));
        }
        Ok(pack_host_apis([host_api_record(index)?]))
    }

    fn default_host_api(&self) -> Result<NativeBuffer, NativeStatus> {
        let index = check(unsafe { Pa_GetDefaultHostApi() })?;
        Ok(pack_host_apis([host_api_record(index)?]))
    }

    fn release(&self, buffer: NativeBuffer) {
        // Records are packed on the Rust heap.
        drop(buffer);
    }

    fn open_stream(&self, configuration: &[u8], bridge: CallbackBridge) -> Result<StreamId, NativeStatus> {
        let params = decode_config(configuration)?;
        let input = stream_parameters(&params.input);
        let output = stream_parameters(&params.output);

        let id = StreamId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut user_data = Box::new(UserData {
            bridge,
            id,
            input_frame_bytes: params.input.map_or(0, |p| p.frame_bytes),
            output_frame_bytes: params.output.map_or(0, |p| p.frame_bytes),
        });
        let user_data_ptr = &mut *user_data as *mut UserData as *mut c_void;

        let mut handle: *mut PaStream = ptr::null_mut();
        check(unsafe {
            Pa_OpenStream(
                &mut handle,
                as_ptr(&input),
                as_ptr(&output),
                params.sample_rate,
                PA_FRAMES_PER_BUFFER_UNSPECIFIED,
                PaStreamFlags::from(params.flags),
                Some(stream_callback),
                user_data_ptr,
            )
        })?;
        if let Err(status) = check(unsafe { Pa_SetStreamFinishedCallback(handle, Some(stream_finished)) }) {
            unsafe { Pa_CloseStream(handle) };
            return Err(status);
        }

        self.streams.lock().insert(
            id,
            OpenStream {
                handle,
                _user_data: user_data,
            },
        );
        log::debug!("Pa_OpenStream -> {}", id);
        Ok(id)
    }

    fn start_stream(&self, id: StreamId) -> Result<(), NativeStatus> {
        let handle = self.handle(id)?;
        check(unsafe { Pa_StartStream(handle) })?;
        Ok(())
    }

    fn stop_stream(&self, id: StreamId) -> Result<(), NativeStatus> {
        let handle = self.handle(id)?;
        check(unsafe { Pa_StopStream(handle) })?;
        Ok(())
    }

    fn abort_stream(&self, id: StreamId) -> Result<(), NativeStatus> {
        let handle = self.handle(id)?;
        check(unsafe { Pa_AbortStream(handle) })?;
        Ok(())
    }

    fn close_stream(&self, id: StreamId) -> Result<(), NativeStatus> {
        let handle = self.handle(id)?;
        check(unsafe { Pa_CloseStream(handle) })?;
        self.streams.lock().remove(&id);
        Ok(())
    }

    fn is_stream_active(&self, id: StreamId) -> Result<bool, NativeStatus> {
        let handle = self.handle(id)?;
        Ok(check(unsafe { Pa_IsStreamActive(handle) })? == 1)
    }

    fn is_stream_stopped(&self, id: StreamId) -> Result<bool, NativeStatus> {
        let handle = self.handle(id)?;
        Ok(check(unsafe { Pa_IsStreamStopped(handle) })? == 1)
    }

    fn stream_cpu_load(&self, id: StreamId) -> Result<f64, NativeStatus> {
        let handle = self.handle(id)?;
        Ok(unsafe { Pa_GetStreamCpuLoad(handle) })
    }

    fn stream_time(&self, id: StreamId) -> Result<f64, NativeStatus> {
        let handle = self.handle(id)?;
        Ok(unsafe { Pa_GetStreamTime(handle) })
    }

    fn is_format_supported(&self, configuration: &[u8]) -> Result<(), NativeStatus> {
        let params = decode_config(configuration)?;
        let input = stream_parameters(&params.input);
        let output = stream_parameters(&params.output);
        check(unsafe { Pa_IsFormatSupported(as_ptr(&input), as_ptr(&output), params.sample_rate) })?;
        Ok(())
    }
}
