//! # audio-stream-core
//!
//! Platform-agnostic control layer for a native real-time audio engine.
//!
//! Decodes the engine's device and host API records, serializes stream
//! configurations for it, and routes its real-time callbacks to Rust code.
//! Native backends (PortAudio) implement the `NativeEngine` trait and plug
//! into the generic `AudioHost`.
//!
//! ## Architecture
//!
//! ```text
//! audio-stream-core (this crate)
//! ├── traits/   ← NativeEngine, StreamCallback
//! ├── models/   ← StreamError, StreamState, StreamConfiguration, Device, HostApi, SampleFormat, etc.
//! ├── codec/    ← native-byte-order record layouts (device, host API, stream configuration)
//! └── session/  ← AudioHost (controller), Stream, StreamRegistry, CallbackBridge
//! ```

pub mod codec;
pub mod models;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use codec::records::{ConfigRecord, DeviceRecord, HostApiRecord, CONFIG_RECORD_LEN};
pub use models::config::{StreamConfiguration, StreamMode};
pub use models::device::Device;
pub use models::error::{NativeStatus, StreamError};
pub use models::host_api::{HostApi, HostApiType};
pub use models::sample_format::SampleFormat;
pub use models::state::{CallbackState, StreamId, StreamState};
pub use session::bridge::CallbackBridge;
pub use session::host::AudioHost;
pub use session::stream::Stream;
pub use traits::native_engine::{NativeBuffer, NativeEngine};
pub use traits::stream_callback::{callback_fn, FinishedHook, StreamCallback};
