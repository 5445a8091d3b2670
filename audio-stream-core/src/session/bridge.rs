use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::models::error::StreamError;
use crate::models::state::{CallbackState, StreamId, ABORT};

use super::registry::StreamRegistry;

/// Entry point for the native audio thread.
///
/// A cheap handle on the stream registry. The engine receives one at open
/// time and calls [`process`](Self::process) once per audio period and
/// [`finished`](Self::finished) once processing has stopped.
///
/// Nothing here blocks, logs or allocates on the success path.
#[derive(Clone)]
pub struct CallbackBridge {
    registry: Arc<StreamRegistry>,
}

impl CallbackBridge {
    pub(crate) fn new(registry: Arc<StreamRegistry>) -> Self {
        Self { registry }
    }

    /// Run one period of stream `id` and return its continuation code.
    ///
    /// Unknown, halted or busy streams get the abort code without their
    /// callback running. A panicking callback also yields the abort code;
    /// the panic is queued as [`StreamError::CallbackFailure`].
    pub fn process(&self, id: StreamId, input: Option<&[u8]>, output: Option<&mut [u8]>) -> i32 {
        let streams = self.registry.snapshot();
        let Some(stream) = streams.get(&id) else {
            return ABORT;
        };
        if stream.is_halted() {
            return ABORT;
        }
        let Some(mut callback) = stream.callback.try_lock() else {
            return ABORT;
        };

        stream.count_period();
        let state = match catch_unwind(AssertUnwindSafe(|| callback.process(input, output))) {
            Ok(state) => state,
            Err(payload) => {
                stream.count_failure();
                self.registry.report_failure(StreamError::CallbackFailure {
                    stream: id,
                    message: panic_message(payload),
                });
                CallbackState::Aborted
            }
        };
        if state.is_terminal() {
            stream.halt();
        }
        state.continuation_code()
    }

    /// The engine has stopped calling [`process`](Self::process) for `id`.
    ///
    /// Runs the stream's finished hook once per run, however the run ended.
    pub fn finished(&self, id: StreamId) {
        let Some(stream) = self.registry.get(id) else {
            return;
        };
        stream.finish(|hook| {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook())) {
                stream.count_failure();
                self.registry.report_failure(StreamError::CallbackFailure {
                    stream: id,
                    message: panic_message(payload),
                });
            }
        });
    }
}

impl std::fmt::Debug for CallbackBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackBridge")
            .field("streams", &self.registry.len())
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast_ref::<&'static str>() {
            Some(message) => (*message).to_string(),
            None => "callback panicked".to_string(),
        },
    }
}
