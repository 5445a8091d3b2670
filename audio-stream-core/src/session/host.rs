use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::codec::records::{decode_device, decode_devices, decode_host_api, decode_host_apis, encode_configuration};
use crate::models::config::{StreamConfiguration, StreamMode};
use crate::models::device::Device;
use crate::models::error::{NativeStatus, StreamError};
use crate::models::host_api::HostApi;
use crate::models::sample_format::SampleFormat;
use crate::traits::native_engine::{NativeBuffer, NativeEngine, ReleaseGuard};
use crate::traits::stream_callback::{FinishedHook, StreamCallback};

use super::bridge::CallbackBridge;
use super::registry::{StreamRegistry, StreamShared};
use super::stream::Stream;

/// Channels used by [`AudioHost::default_configuration`].
const DEFAULT_INPUT_CHANNELS: u8 = 1;
const DEFAULT_OUTPUT_CHANNELS: u8 = 2;

/// State shared between the host and every stream it opened.
pub(crate) struct HostInner {
    pub(crate) engine: Arc<dyn NativeEngine>,
    pub(crate) registry: Arc<StreamRegistry>,
    initialized: AtomicBool,
    /// Bumped on every terminate so streams from an earlier engine session
    /// can tell their native handle is gone.
    session: AtomicU64,
    lifecycle: Mutex<()>,
    failures: Receiver<StreamError>,
}

impl HostInner {
    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_initialized(&self) -> Result<(), StreamError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(StreamError::NotInitialized)
        }
    }

    pub(crate) fn session(&self) -> u64 {
        self.session.load(Ordering::Acquire)
    }
}

/// Entry point: engine lifecycle, enumeration and stream creation.
///
/// Wraps one [`NativeEngine`]. Everything except the version queries
/// requires [`initialize`](Self::initialize) first and fails with
/// [`StreamError::NotInitialized`] otherwise.
///
/// ```text
/// AudioHost::new(engine)
///   → initialize()
///   → host_apis() / devices() / default_configuration(mode)
///   → open_stream(config, callback, hook) → Stream
///   → terminate()
/// ```
pub struct AudioHost {
    inner: Arc<HostInner>,
}

impl AudioHost {
    pub fn new(engine: Arc<dyn NativeEngine>) -> Self {
        let (registry, failures) = StreamRegistry::new();
        Self {
            inner: Arc::new(HostInner {
                engine,
                registry: Arc::new(registry),
                initialized: AtomicBool::new(false),
                session: AtomicU64::new(0),
                lifecycle: Mutex::new(()),
                failures,
            }),
        }
    }

    /// Bring the native engine up. Calling it again while initialized is a no-op.
    pub fn initialize(&self) -> Result<(), StreamError> {
        let _lifecycle = self.inner.lifecycle.lock();
        if self.inner.is_initialized() {
            log::debug!("Audio engine already initialized");
            return Ok(());
        }
        self.inner.engine.initialize()?;
        self.inner.initialized.store(true, Ordering::Release);
        log::info!("Audio engine initialized: {}", self.inner.engine.version_text());
        Ok(())
    }

    /// Shut the native engine down. Streams still open are torn down with
    /// it; their handles become unusable.
    pub fn terminate(&self) -> Result<(), StreamError> {
        let _lifecycle = self.inner.lifecycle.lock();
        self.inner.ensure_initialized()?;

        // Native shutdown aborts running streams and reports them finished,
        // so their entries must still be registered while it runs.
        self.inner.engine.terminate()?;
        let bridge = CallbackBridge::new(Arc::clone(&self.inner.registry));
        for id in self.inner.registry.ids() {
            bridge.finished(id);
        }

        let open = self.inner.registry.clear();
        if open > 0 {
            log::warn!("Terminating audio engine with {} stream(s) still open", open);
        }
        self.inner.session.fetch_add(1, Ordering::AcqRel);
        self.inner.initialized.store(false, Ordering::Release);
        log::info!("Audio engine terminated");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    /// Native engine version number.
    pub fn version(&self) -> i32 {
        self.inner.engine.version()
    }

    pub fn version_text(&self) -> String {
        self.inner.engine.version_text()
    }

    // -- Enumeration --

    pub fn host_apis(&self) -> Result<Vec<HostApi>, StreamError> {
        self.decode_with(|engine| engine.host_apis(), decode_host_apis)
    }

    pub fn default_host_api(&self) -> Result<HostApi, StreamError> {
        self.decode_with(|engine| engine.default_host_api(), decode_host_api)
    }

    pub fn host_api(&self, index: u8) -> Result<HostApi, StreamError> {
        self.decode_with(|engine| engine.host_api(index), decode_host_api)
    }

    /// Every device across all host APIs.
    pub fn devices(&self) -> Result<Vec<Device>, StreamError> {
        self.decode_with(|engine| engine.devices(), decode_devices)
    }

    pub fn device(&self, index: u8) -> Result<Device, StreamError> {
        self.decode_with(|engine| engine.device(index), decode_device)
    }

    /// Devices owned by `host_api`, fetched fresh from the engine.
    pub fn host_api_devices(&self, host_api: &HostApi) -> Result<Vec<Device>, StreamError> {
        self.decode_with(|engine| engine.host_api_devices(host_api.id()), decode_devices)
    }

    /// The host API that owns `device`.
    pub fn device_host_api(&self, device: &Device) -> Result<HostApi, StreamError> {
        self.host_api(device.host_api_id())
    }

    /// `Ok(None)` when the host API has no default input device.
    pub fn default_input_device(&self, host_api: &HostApi) -> Result<Option<Device>, StreamError> {
        host_api
            .default_input_device_id()
            .map(|id| self.device(id))
            .transpose()
    }

    pub fn default_output_device(&self, host_api: &HostApi) -> Result<Option<Device>, StreamError> {
        host_api
            .default_output_device_id()
            .map(|id| self.device(id))
            .transpose()
    }

    /// Fetch a native buffer and decode it, releasing it either way.
    fn decode_with<T, F, D>(&self, fetch: F, decode: D) -> Result<T, StreamError>
    where
        F: FnOnce(&dyn NativeEngine) -> Result<NativeBuffer, NativeStatus>,
        D: FnOnce(&[u8]) -> Result<T, StreamError>,
    {
        self.inner.ensure_initialized()?;
        let engine = self.inner.engine.as_ref();
        let buffer = ReleaseGuard::new(engine, fetch(engine)?);
        decode(&*buffer)
    }

    // -- Streams --

    /// A configuration on the default host API's default devices.
    ///
    /// One input channel and two output channels, 16-bit signed samples,
    /// each device's default high latency, and the lower of the devices'
    /// default sample rates.
    pub fn default_configuration(&self, mode: StreamMode) -> Result<StreamConfiguration, StreamError> {
        let host_api = self.default_host_api()?;
        let mut config = StreamConfiguration::new(mode);
        let mut sample_rate = f64::INFINITY;

        if mode.has_input() {
            let device = self.default_input_device(&host_api)?.ok_or_else(|| {
                StreamError::Configuration(format!("{} has no default input device", host_api.name()))
            })?;
            sample_rate = sample_rate.min(device.default_sample_rate());
            let latency = device.default_high_input_latency();
            config = config.with_input(device, DEFAULT_INPUT_CHANNELS, SampleFormat::SIGNED_INTEGER_16, latency);
        }
        if mode.has_output() {
            let device = self.default_output_device(&host_api)?.ok_or_else(|| {
                StreamError::Configuration(format!("{} has no default output device", host_api.name()))
            })?;
            sample_rate = sample_rate.min(device.default_sample_rate());
            let latency = device.default_high_output_latency();
            config = config.with_output(device, DEFAULT_OUTPUT_CHANNELS, SampleFormat::SIGNED_INTEGER_16, latency);
        }
        Ok(config.with_sample_rate(sample_rate))
    }

    /// `Ok(())` when the engine could open a stream with `configuration`.
    pub fn is_format_supported(&self, configuration: &StreamConfiguration) -> Result<(), StreamError> {
        let record = encode_configuration(configuration)?;
        self.inner.ensure_initialized()?;
        self.inner.engine.is_format_supported(&record)?;
        Ok(())
    }

    /// Open a stream and register it with the callback bridge.
    ///
    /// The configuration is validated before anything reaches the engine.
    /// The returned stream is opened but not started.
    pub fn open_stream<C>(
        &self,
        configuration: &StreamConfiguration,
        callback: C,
        finished_hook: Option<FinishedHook>,
    ) -> Result<Stream, StreamError>
    where
        C: StreamCallback + 'static,
    {
        let record = encode_configuration(configuration)?;
        self.inner.ensure_initialized()?;

        let bridge = CallbackBridge::new(Arc::clone(&self.inner.registry));
        let id = self.inner.engine.open_stream(&record, bridge)?;
        let shared = Arc::new(StreamShared::new(id, Box::new(callback), finished_hook));
        self.inner.registry.insert(Arc::clone(&shared));

        log::info!(
            "Opened {} ({:?}, {} Hz)",
            id,
            configuration.mode,
            configuration.sample_rate
        );
        Ok(Stream::new(id, configuration.clone(), shared, Arc::clone(&self.inner)))
    }

    /// Number of streams currently registered.
    pub fn open_streams(&self) -> usize {
        self.inner.registry.len()
    }

    /// Drain callback failures queued by the audio thread, logging each.
    pub fn callback_failures(&self) -> Vec<StreamError> {
        let failures: Vec<StreamError> = self.inner.failures.try_iter().collect();
        for failure in &failures {
            log::error!("Audio callback failed: {}", failure);
        }
        failures
    }
}

impl std::fmt::Debug for AudioHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioHost")
            .field("initialized", &self.is_initialized())
            .field("open_streams", &self.open_streams())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::models::error::NOT_INITIALIZED;
    use crate::models::host_api::HostApiType;
    use crate::models::state::CallbackState;
    use crate::session::mock_engine::MockEngine;
    use crate::traits::stream_callback::callback_fn;

    fn host() -> (AudioHost, Arc<MockEngine>) {
        let engine = Arc::new(MockEngine::new());
        let host = AudioHost::new(engine.clone());
        host.initialize().unwrap();
        (host, engine)
    }

    #[test]
    fn operations_require_initialize() {
        let engine = Arc::new(MockEngine::new());
        let host = AudioHost::new(engine.clone());
        assert_eq!(host.devices(), Err(StreamError::NotInitialized));
        assert_eq!(host.terminate(), Err(StreamError::NotInitialized));
        assert_eq!(host.version(), 1900);
        assert_eq!(engine.native_calls(), 0);

        host.initialize().unwrap();
        host.initialize().unwrap();
        assert_eq!(engine.native_calls(), 1);
        assert!(host.devices().is_ok());

        host.terminate().unwrap();
        assert_eq!(host.devices(), Err(StreamError::NotInitialized));
        assert_eq!(StreamError::NotInitialized.native_code(), Some(NOT_INITIALIZED));
    }

    #[test]
    fn enumerates_host_apis_and_devices() {
        let (host, engine) = host();

        let apis = host.host_apis().unwrap();
        assert_eq!(apis.len(), 2);
        assert_eq!(apis[0].host_api_type(), Some(&HostApiType::ALSA));
        assert_eq!(apis[1].name(), "JACK Audio Connection Kit");

        let devices = host.devices().unwrap();
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[1].name(), "Built-in Output");

        let jack_devices = host.host_api_devices(&apis[1]).unwrap();
        assert_eq!(jack_devices.len(), 1);
        assert_eq!(jack_devices[0].name(), "system");

        assert_eq!(host.device_host_api(&jack_devices[0]).unwrap(), apis[1]);
        assert_eq!(engine.handed_out(), 4);
        assert_eq!(engine.released(), 4);
    }

    #[test]
    fn default_devices_follow_the_host_api() {
        let (host, _engine) = host();
        let alsa = host.default_host_api().unwrap();
        assert_eq!(host.default_input_device(&alsa).unwrap().unwrap().name(), "Built-in Microphone");
        assert_eq!(host.default_output_device(&alsa).unwrap().unwrap().name(), "Built-in Output");

        let jack = host.host_api(1).unwrap();
        assert_eq!(host.default_input_device(&jack).unwrap(), None);
    }

    #[test]
    fn buffer_is_released_when_decoding_fails() {
        let (host, engine) = host();
        engine.set_device_list_bytes(vec![0u8; 50]);

        assert!(matches!(host.devices(), Err(StreamError::Integrity { .. })));
        assert_eq!(engine.handed_out(), 1);
        assert_eq!(engine.released(), 1);
    }

    #[test]
    fn native_failure_is_mapped() {
        let (host, engine) = host();
        assert_eq!(
            host.device(42),
            Err(StreamError::Native {
                code: -9996,
                message: "Invalid device".into(),
            })
        );
        // Nothing was handed out, so nothing to release.
        assert_eq!(engine.released(), 0);
    }

    #[test]
    fn default_configuration_uses_default_devices() {
        let (host, _engine) = host();
        let config = host.default_configuration(StreamMode::Bidirectional).unwrap();

        assert_eq!(config.mode, Some(StreamMode::Bidirectional));
        assert_eq!(config.input_channels, 1);
        assert_eq!(config.output_channels, 2);
        assert_eq!(config.input_format, Some(SampleFormat::SIGNED_INTEGER_16));
        assert_eq!(config.output_format, Some(SampleFormat::SIGNED_INTEGER_16));
        assert_eq!(config.input_device.as_ref().map(|d| d.id()), Some(0));
        assert_eq!(config.output_device.as_ref().map(|d| d.id()), Some(1));
        assert_relative_eq!(config.input_latency, 0.1);
        assert_relative_eq!(config.output_latency, 0.2);
        assert_relative_eq!(config.sample_rate, 44100.0);
        assert!(config.validate().is_ok());

        let output_only = host.default_configuration(StreamMode::OutputOnly).unwrap();
        assert!(output_only.input_device.is_none());
        assert_relative_eq!(output_only.sample_rate, 44100.0);

        let input_only = host.default_configuration(StreamMode::InputOnly).unwrap();
        assert_relative_eq!(input_only.sample_rate, 48000.0);
    }

    #[test]
    fn default_configuration_without_default_input_fails() {
        let (host, engine) = host();
        engine.set_default_host_api(1);
        assert!(matches!(
            host.default_configuration(StreamMode::InputOnly),
            Err(StreamError::Configuration(_))
        ));
        assert!(host.default_configuration(StreamMode::OutputOnly).is_ok());
    }

    #[test]
    fn format_support_is_checked_natively() {
        let (host, engine) = host();
        let config = host.default_configuration(StreamMode::OutputOnly).unwrap();
        assert_eq!(host.is_format_supported(&config), Ok(()));

        engine.fail_format_check_with(-9994);
        assert_eq!(
            host.is_format_supported(&config).unwrap_err().native_code(),
            Some(-9994)
        );
    }

    #[test]
    fn open_registers_stream_with_serialized_config() {
        let (host, engine) = host();
        let config = host.default_configuration(StreamMode::Bidirectional).unwrap();
        let stream = host
            .open_stream(&config, callback_fn(|_, _| CallbackState::Running), None)
            .unwrap();

        assert_eq!(host.open_streams(), 1);
        assert!(engine.is_open(stream.id()));
        let record = engine.last_opened_config().unwrap();
        assert_eq!(record.mode(), Some(StreamMode::Bidirectional));
        assert_eq!(record.input_channels, 1);
        assert_eq!(record.output_channels, 2);
        assert_eq!(record.input_format_code(), Some(0x08));
        assert_eq!(record.output_device_id(), Some(1));
    }

    #[test]
    fn native_open_failure_registers_nothing() {
        let (host, engine) = host();
        engine.fail_open_with(-9985);
        let config = host.default_configuration(StreamMode::OutputOnly).unwrap();
        let result = host.open_stream(&config, callback_fn(|_, _| CallbackState::Running), None);

        assert_eq!(result.unwrap_err().native_code(), Some(-9985));
        assert_eq!(host.open_streams(), 0);
    }

    #[test]
    fn terminate_drops_registered_streams() {
        let (host, engine) = host();
        let config = host.default_configuration(StreamMode::OutputOnly).unwrap();
        let stream = host
            .open_stream(&config, callback_fn(|_, _| CallbackState::Running), None)
            .unwrap();
        let id = stream.id();

        host.terminate().unwrap();
        assert_eq!(host.open_streams(), 0);
        assert!(!engine.is_open(id));
        assert_eq!(stream.start(), Err(StreamError::NotInitialized));

        host.initialize().unwrap();
        assert_eq!(stream.start().unwrap_err().native_code(), Some(-9988));
        drop(stream);
        assert_eq!(host.open_streams(), 0);
    }
}
