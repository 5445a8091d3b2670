use crate::models::state::CallbackState;

/// Per-period audio callback.
///
/// Runs on the native real-time thread, once per period, never
/// concurrently with itself. Implementations must not block, allocate or
/// do I/O.
///
/// - `input`: captured samples, read-only. `None` for output-only streams.
/// - `output`: buffer to fill. `None` for input-only streams.
///
/// Buffers hold interleaved frames in the configured sample format. A
/// panic is caught at the boundary and treated as [`CallbackState::Aborted`].
pub trait StreamCallback: Send {
    fn process(&mut self, input: Option<&[u8]>, output: Option<&mut [u8]>) -> CallbackState;
}

impl<F> StreamCallback for F
where
    F: FnMut(Option<&[u8]>, Option<&mut [u8]>) -> CallbackState + Send,
{
    fn process(&mut self, input: Option<&[u8]>, output: Option<&mut [u8]>) -> CallbackState {
        self(input, output)
    }
}

/// Pins a closure to the callback signature so its buffer lifetimes are
/// inferred per call.
pub fn callback_fn<F>(f: F) -> F
where
    F: FnMut(Option<&[u8]>, Option<&mut [u8]>) -> CallbackState + Send,
{
    f
}

/// Notified once each time the engine finishes processing a stream.
///
/// May run on the audio thread; the same real-time rules apply.
pub type FinishedHook = Box<dyn FnMut() + Send + 'static>;
