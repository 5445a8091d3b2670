//! # audio-stream-portaudio
//!
//! PortAudio backend for audio-stream-core.
//!
//! Provides:
//! - `records`: packing of PortAudio device / host API info into descriptor
//!   records, and unpacking of the stream configuration record
//! - `PortAudioEngine`: `NativeEngine` over the PortAudio C API, with C
//!   trampolines feeding the core's `CallbackBridge` (`portaudio` feature)
//!
//! ## Platform Requirements
//! - PortAudio v19 shared library and headers (`libportaudio2` /
//!   `portaudio-devel` / `brew install portaudio`) when the `portaudio`
//!   feature is enabled
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_stream_core::{AudioHost, CallbackState, StreamMode};
//! use audio_stream_portaudio::PortAudioEngine;
//!
//! let host = AudioHost::new(Arc::new(PortAudioEngine::new()));
//! host.initialize()?;
//! let config = host.default_configuration(StreamMode::OutputOnly)?;
//! let stream = host.open_stream(&config, audio_stream_core::callback_fn(|_, output| {
//!     if let Some(output) = output {
//!         output.fill(0);
//!     }
//!     CallbackState::Running
//! }), None)?;
//! stream.start()?;
//! ```

pub mod records;

#[cfg(feature = "portaudio")]
pub mod engine;
#[cfg(feature = "portaudio")]
pub mod ffi;

#[cfg(feature = "portaudio")]
pub use engine::PortAudioEngine;
