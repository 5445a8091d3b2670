//! Scripted stand-in for the native engine.
//!
//! Serves canned descriptor records, tracks buffer releases, and plays
//! audio periods through the callback bridge the way PortAudio does:
//! periods stop at the first non-continue code, and every transition to
//! inactive is followed by one finished notification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::codec::records::{ConfigRecord, DeviceRecord, HostApiRecord};
use crate::models::device::NO_DEVICE;
use crate::models::error::{NativeStatus, BAD_STREAM_PTR, NOT_INITIALIZED, STREAM_IS_NOT_STOPPED, STREAM_IS_STOPPED};
use crate::models::sample_format::SampleFormat;
use crate::models::state::{StreamId, CONTINUE};
use crate::session::bridge::CallbackBridge;
use crate::traits::native_engine::{NativeBuffer, NativeEngine};

const INVALID_DEVICE: i32 = -9996;
const INVALID_HOST_API: i32 = -9978;

struct MockStream {
    bridge: CallbackBridge,
    config: ConfigRecord,
    active: bool,
    stopped: bool,
}

impl MockStream {
    fn frame_size(format: Option<u32>, channels: u8) -> Option<usize> {
        let format = SampleFormat::resolve(format?)?;
        Some(format.sample_size()? * usize::from(channels))
    }
}

struct MockState {
    initialized: bool,
    host_apis: Vec<HostApiRecord>,
    devices: Vec<DeviceRecord>,
    default_host_api: u8,
    device_list_override: Option<Vec<u8>>,
    open_failure: Option<i32>,
    format_failure: Option<i32>,
    abort_failure: Option<i32>,
    next_id: i32,
    streams: HashMap<StreamId, MockStream>,
    opened_configs: Vec<ConfigRecord>,
}

pub(crate) struct MockEngine {
    state: Mutex<MockState>,
    native_calls: AtomicUsize,
    handed_out: AtomicUsize,
    released: AtomicUsize,
}

fn device_record(id: u8, host_api: u8, name: &str, inputs: u8, outputs: u8, rate: f64) -> DeviceRecord {
    DeviceRecord {
        default_high_input_latency: 0.1,
        default_high_output_latency: 0.2,
        default_low_input_latency: 0.01,
        default_low_output_latency: 0.02,
        default_sample_rate: rate,
        id,
        host_api,
        max_input_channels: inputs,
        max_output_channels: outputs,
        name: name.into(),
    }
}

impl MockEngine {
    /// ALSA with a microphone (48 kHz) and a speaker (44.1 kHz), plus JACK
    /// with one duplex device and no default input.
    pub(crate) fn new() -> Self {
        let host_apis = vec![
            HostApiRecord {
                default_input_device: 0,
                default_output_device: 1,
                device_count: 2,
                id: 0,
                type_code: 8,
                name: "ALSA".into(),
            },
            HostApiRecord {
                default_input_device: NO_DEVICE,
                default_output_device: 2,
                device_count: 1,
                id: 1,
                type_code: 12,
                name: "JACK Audio Connection Kit".into(),
            },
        ];
        let devices = vec![
            device_record(0, 0, "Built-in Microphone", 2, 0, 48000.0),
            device_record(1, 0, "Built-in Output", 0, 2, 44100.0),
            device_record(2, 1, "system", 2, 2, 48000.0),
        ];
        Self {
            state: Mutex::new(MockState {
                initialized: false,
                host_apis,
                devices,
                default_host_api: 0,
                device_list_override: None,
                open_failure: None,
                format_failure: None,
                abort_failure: None,
                next_id: 1,
                streams: HashMap::new(),
                opened_configs: Vec::new(),
            }),
            native_calls: AtomicUsize::new(0),
            handed_out: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub(crate) fn native_calls(&self) -> usize {
        self.native_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn handed_out(&self) -> usize {
        self.handed_out.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Serve these bytes instead of the encoded device list.
    pub(crate) fn set_device_list_bytes(&self, bytes: Vec<u8>) {
        self.state.lock().device_list_override = Some(bytes);
    }

    pub(crate) fn fail_open_with(&self, code: i32) {
        self.state.lock().open_failure = Some(code);
    }

    pub(crate) fn fail_format_check_with(&self, code: i32) {
        self.state.lock().format_failure = Some(code);
    }

    pub(crate) fn fail_abort_with(&self, code: i32) {
        self.state.lock().abort_failure = Some(code);
    }

    pub(crate) fn set_default_host_api(&self, id: u8) {
        self.state.lock().default_host_api = id;
    }

    pub(crate) fn last_opened_config(&self) -> Option<ConfigRecord> {
        self.state.lock().opened_configs.last().copied()
    }

    pub(crate) fn is_open(&self, id: StreamId) -> bool {
        self.state.lock().streams.contains_key(&id)
    }

    /// Deliver up to `periods` periods of `frames` frames each.
    ///
    /// Returns the number of periods delivered. Stops early when the bridge
    /// returns anything but the continue code, in which case the stream goes
    /// inactive and a finished notification follows.
    pub(crate) fn run_periods(&self, id: StreamId, periods: usize, frames: usize) -> usize {
        let (bridge, input_size, output_size) = {
            let state = self.state.lock();
            let Some(stream) = state.streams.get(&id) else {
                return 0;
            };
            if !stream.active {
                return 0;
            }
            let config = &stream.config;
            (
                stream.bridge.clone(),
                MockStream::frame_size(config.input_format_code(), config.input_channels),
                MockStream::frame_size(config.output_format_code(), config.output_channels),
            )
        };

        let input = input_size.map(|size| vec![0x11u8; size * frames]);
        let mut output = output_size.map(|size| vec![0u8; size * frames]);
        for delivered in 1..=periods {
            let code = bridge.process(id, input.as_deref(), output.as_deref_mut());
            if code != CONTINUE {
                if let Some(stream) = self.state.lock().streams.get_mut(&id) {
                    stream.active = false;
                }
                bridge.finished(id);
                return delivered;
            }
        }
        periods
    }

    fn call(&self) -> Result<(), NativeStatus> {
        self.native_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.lock().initialized {
            Ok(())
        } else {
            Err(NativeStatus::new(NOT_INITIALIZED))
        }
    }

    fn hand_out(&self, bytes: Vec<u8>) -> NativeBuffer {
        self.handed_out.fetch_add(1, Ordering::SeqCst);
        NativeBuffer::from_vec(bytes)
    }

    /// Mark a stream inactive and stopped, then notify if it had been running.
    fn halt_stream(&self, id: StreamId, require_running: bool) -> Result<(), NativeStatus> {
        let bridge = {
            let mut state = self.state.lock();
            let stream = state
                .streams
                .get_mut(&id)
                .ok_or_else(|| NativeStatus::new(BAD_STREAM_PTR))?;
            if require_running && stream.stopped {
                return Err(NativeStatus::new(STREAM_IS_STOPPED));
            }
            let was_active = stream.active;
            stream.active = false;
            stream.stopped = true;
            was_active.then(|| stream.bridge.clone())
        };
        if let Some(bridge) = bridge {
            bridge.finished(id);
        }
        Ok(())
    }
}

impl NativeEngine for MockEngine {
    fn initialize(&self) -> Result<(), NativeStatus> {
        self.native_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().initialized = true;
        Ok(())
    }

    /// Aborts whatever is still running, notifying each, then drops every stream.
    fn terminate(&self) -> Result<(), NativeStatus> {
        self.call()?;
        let running: Vec<_> = {
            let mut state = self.state.lock();
            state.initialized = false;
            state
                .streams
                .drain()
                .filter(|(_, stream)| stream.active)
                .map(|(id, stream)| (id, stream.bridge))
                .collect()
        };
        for (id, bridge) in running {
            bridge.finished(id);
        }
        Ok(())
    }

    fn version(&self) -> i32 {
        1900
    }

    fn version_text(&self) -> String {
        "PortAudio V19-devel (mock)".into()
    }

    fn host_apis(&self) -> Result<NativeBuffer, NativeStatus> {
        self.call()?;
        let mut bytes = Vec::new();
        for api in &self.state.lock().host_apis {
            api.write_to(&mut bytes);
        }
        Ok(self.hand_out(bytes))
    }

    fn devices(&self) -> Result<NativeBuffer, NativeStatus> {
        self.call()?;
        let state = self.state.lock();
        let bytes = match &state.device_list_override {
            Some(bytes) => bytes.clone(),
            None => {
                let mut bytes = Vec::new();
                for device in &state.devices {
                    device.write_to(&mut bytes);
                }
                bytes
            }
        };
        drop(state);
        Ok(self.hand_out(bytes))
    }

    fn host_api_devices(&self, host_api: u8) -> Result<NativeBuffer, NativeStatus> {
        self.call()?;
        let state = self.state.lock();
        if usize::from(host_api) >= state.host_apis.len() {
            return Err(NativeStatus::new(INVALID_HOST_API));
        }
        let mut bytes = Vec::new();
        for device in state.devices.iter().filter(|d| d.host_api == host_api) {
            device.write_to(&mut bytes);
        }
        drop(state);
        Ok(self.hand_out(bytes))
    }

    fn device(&self, index: u8) -> Result<NativeBuffer, NativeStatus> {
        self.call()?;
        let mut bytes = Vec::new();
        self.state
            .lock()
            .devices
            .get(usize::from(index))
            .ok_or_else(|| NativeStatus::new(INVALID_DEVICE))?
            .write_to(&mut bytes);
        Ok(self.hand_out(bytes))
    }

    fn host_api(&self, index: u8) -> Result<NativeBuffer, NativeStatus> {
        self.call()?;
        let mut bytes = Vec::new();
        self.state
            .lock()
            .host_apis
            .get(usize::from(index))
            .ok_or_else(|| NativeStatus::new(INVALID_HOST_API))?
            .write_to(&mut bytes);
        Ok(self.hand_out(bytes))
    }

    fn default_host_api(&self) -> Result<NativeBuffer, NativeStatus> {
        let index = self.state.lock().default_host_api;
        self.host_api(index)
    }

    fn release(&self, buffer: NativeBuffer) {
        self.released.fetch_add(1, Ordering::SeqCst);
        drop(buffer);
    }

    fn open_stream(&self, configuration: &[u8], bridge: CallbackBridge) -> Result<StreamId, NativeStatus> {
        self.call()?;
        let config = ConfigRecord::decode(configuration)
            .map_err(|e| NativeStatus::with_message(-9986, e.to_string()))?;
        let mut state = self.state.lock();
        if let Some(code) = state.open_failure {
            return Err(NativeStatus::new(code));
        }
        let id = StreamId::new(state.next_id);
        state.next_id += 1;
        state.opened_configs.push(config);
        state.streams.insert(
            id,
            MockStream {
                bridge,
                config,
                active: false,
                stopped: true,
            },
        );
        Ok(id)
    }

    fn start_stream(&self, id: StreamId) -> Result<(), NativeStatus> {
        self.call()?;
        let mut state = self.state.lock();
        let stream = state
            .streams
            .get_mut(&id)
            .ok_or_else(|| NativeStatus::new(BAD_STREAM_PTR))?;
        if !stream.stopped {
            return Err(NativeStatus::new(STREAM_IS_NOT_STOPPED));
        }
        stream.stopped = false;
        stream.active = true;
        Ok(())
    }

    fn stop_stream(&self, id: StreamId) -> Result<(), NativeStatus> {
        self.call()?;
        self.halt_stream(id, true)
    }

    fn abort_stream(&self, id: StreamId) -> Result<(), NativeStatus> {
        self.call()?;
        if let Some(code) = self.state.lock().abort_failure {
            return Err(NativeStatus::new(code));
        }
        self.halt_stream(id, true)
    }

    fn close_stream(&self, id: StreamId) -> Result<(), NativeStatus> {
        self.call()?;
        self.halt_stream(id, false)?;
        self.state.lock().streams.remove(&id);
        Ok(())
    }

    fn is_stream_active(&self, id: StreamId) -> Result<bool, NativeStatus> {
        self.call()?;
        let state = self.state.lock();
        let stream = state.streams.get(&id).ok_or_else(|| NativeStatus::new(BAD_STREAM_PTR))?;
        Ok(stream.active)
    }

    fn is_stream_stopped(&self, id: StreamId) -> Result<bool, NativeStatus> {
        self.call()?;
        let state = self.state.lock();
        let stream = state.streams.get(&id).ok_or_else(|| NativeStatus::new(BAD_STREAM_PTR))?;
        Ok(stream.stopped)
    }

    fn stream_cpu_load(&self, id: StreamId) -> Result<f64, NativeStatus> {
        self.call()?;
        if self.state.lock().streams.contains_key(&id) {
            Ok(0.125)
        } else {
            Err(NativeStatus::new(BAD_STREAM_PTR))
        }
    }

    fn stream_time(&self, id: StreamId) -> Result<f64, NativeStatus> {
        self.call()?;
        if self.state.lock().streams.contains_key(&id) {
            Ok(12.5)
        } else {
            Err(NativeStatus::new(BAD_STREAM_PTR))
        }
    }

    fn is_format_supported(&self, configuration: &[u8]) -> Result<(), NativeStatus> {
        self.call()?;
        ConfigRecord::decode(configuration).map_err(|e| NativeStatus::with_message(-9986, e.to_string()))?;
        match self.state.lock().format_failure {
            Some(code) => Err(NativeStatus::new(code)),
            None => Ok(()),
        }
    }
}
