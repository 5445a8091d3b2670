use std::ops::Deref;

use crate::models::error::NativeStatus;
use crate::models::state::StreamId;
use crate::session::bridge::CallbackBridge;

/// A record buffer handed out by the native engine.
///
/// Owning: it must go back to the engine through [`NativeEngine::release`]
/// once decoded. Decoders only ever see it as a borrowed `&[u8]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeBuffer {
    bytes: Box<[u8]>,
}

impl NativeBuffer {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Deref for NativeBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

/// The native audio engine the host drives.
///
/// Implemented by:
/// - `PortAudioEngine` (audio-stream-portaudio, `portaudio` feature)
/// - a scripted engine used by this crate's tests
///
/// Enumeration calls return back-to-back descriptor records in native byte
/// order (see [`codec::records`](crate::codec::records)). Stream calls take
/// the 45-byte configuration record.
pub trait NativeEngine: Send + Sync {
    /// Global engine setup. Called once before anything else.
    fn initialize(&self) -> Result<(), NativeStatus>;

    /// Global engine teardown. Closes any streams still open natively.
    fn terminate(&self) -> Result<(), NativeStatus>;

    fn version(&self) -> i32;

    fn version_text(&self) -> String;

    fn host_apis(&self) -> Result<NativeBuffer, NativeStatus>;

    fn devices(&self) -> Result<NativeBuffer, NativeStatus>;

    /// Devices belonging to one host API, in that API's own order.
    fn host_api_devices(&self, host_api: u8) -> Result<NativeBuffer, NativeStatus>;

    fn device(&self, index: u8) -> Result<NativeBuffer, NativeStatus>;

    fn host_api(&self, index: u8) -> Result<NativeBuffer, NativeStatus>;

    fn default_host_api(&self) -> Result<NativeBuffer, NativeStatus>;

    /// Give a buffer from one of the enumeration calls back to the engine.
    fn release(&self, buffer: NativeBuffer);

    /// Open a stream for `configuration`.
    ///
    /// Every audio period must be routed through `bridge.process(id, ..)`
    /// and the end of processing reported through `bridge.finished(id)`,
    /// using the identifier returned here.
    fn open_stream(&self, configuration: &[u8], bridge: CallbackBridge) -> Result<StreamId, NativeStatus>;

    fn start_stream(&self, id: StreamId) -> Result<(), NativeStatus>;

    fn stop_stream(&self, id: StreamId) -> Result<(), NativeStatus>;

    fn abort_stream(&self, id: StreamId) -> Result<(), NativeStatus>;

    fn close_stream(&self, id: StreamId) -> Result<(), NativeStatus>;

    fn is_stream_active(&self, id: StreamId) -> Result<bool, NativeStatus>;

    fn is_stream_stopped(&self, id: StreamId) -> Result<bool, NativeStatus>;

    fn stream_cpu_load(&self, id: StreamId) -> Result<f64, NativeStatus>;

    /// Stream clock in seconds.
    fn stream_time(&self, id: StreamId) -> Result<f64, NativeStatus>;

    /// `Ok` when a stream could be opened with `configuration`.
    fn is_format_supported(&self, configuration: &[u8]) -> Result<(), NativeStatus>;
}

/// Hands a buffer back to its engine when dropped, decoded or not.
pub(crate) struct ReleaseGuard<'a> {
    engine: &'a dyn NativeEngine,
    buffer: Option<NativeBuffer>,
}

impl<'a> ReleaseGuard<'a> {
    pub(crate) fn new(engine: &'a dyn NativeEngine, buffer: NativeBuffer) -> Self {
        Self {
            engine,
            buffer: Some(buffer),
        }
    }
}

impl Deref for ReleaseGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or(&[])
    }
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.engine.release(buffer);
        }
    }
}
