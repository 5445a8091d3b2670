use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::StreamConfiguration;
use crate::models::error::{NativeStatus, StreamError, BAD_STREAM_PTR, STREAM_IS_NOT_STOPPED, STREAM_IS_STOPPED};
use crate::models::state::{StreamId, StreamState};
use crate::traits::native_engine::NativeEngine;

use super::host::HostInner;
use super::registry::StreamShared;

/// One open native audio stream.
///
/// Created by [`AudioHost::open_stream`](super::host::AudioHost::open_stream).
/// Every method takes `&self`, so a stream can be shared between threads
/// behind an `Arc`. None of them may be called from inside the stream's
/// own callback.
///
/// Dropping a stream that is still open aborts and closes it.
pub struct Stream {
    id: StreamId,
    configuration: StreamConfiguration,
    shared: Arc<StreamShared>,
    host: Arc<HostInner>,
    /// Engine session the stream was opened in; see [`HostInner::session`].
    session: u64,
    state: Mutex<StreamState>,
}

impl Stream {
    pub(crate) fn new(
        id: StreamId,
        configuration: StreamConfiguration,
        shared: Arc<StreamShared>,
        host: Arc<HostInner>,
    ) -> Self {
        let session = host.session();
        Self {
            id,
            configuration,
            shared,
            host,
            session,
            state: Mutex::new(StreamState::Opened),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// The configuration this stream was opened with.
    pub fn configuration(&self) -> &StreamConfiguration {
        &self.configuration
    }

    pub fn state(&self) -> StreamState {
        *self.state.lock()
    }

    /// Audio periods delivered to the callback so far.
    pub fn periods(&self) -> u64 {
        self.shared.periods()
    }

    /// Callback or finished-hook panics caught so far.
    pub fn callback_failures(&self) -> u64 {
        self.shared.failures()
    }

    /// Begin processing. Valid when opened or stopped.
    pub fn start(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        self.ensure_engine()?;
        match *state {
            StreamState::Closed => return Err(StreamError::native(BAD_STREAM_PTR)),
            StreamState::Started => return Err(StreamError::native(STREAM_IS_NOT_STOPPED)),
            StreamState::Aborted => return Err(StreamError::native(STREAM_IS_STOPPED)),
            StreamState::Opened | StreamState::Stopped => {}
        }

        self.shared.arm();
        if let Err(status) = self.host.engine.start_stream(self.id) {
            self.shared.disarm();
            return Err(status.into());
        }
        *state = StreamState::Started;
        log::debug!("{} started", self.id);
        Ok(())
    }

    /// Stop after pending buffers have played. Valid only when started.
    pub fn stop(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        self.ensure_engine()?;
        match *state {
            StreamState::Closed => return Err(StreamError::native(BAD_STREAM_PTR)),
            StreamState::Started => {}
            _ => return Err(StreamError::native(STREAM_IS_STOPPED)),
        }

        self.host.engine.stop_stream(self.id)?;
        *state = StreamState::Stopped;
        log::debug!("{} stopped", self.id);
        Ok(())
    }

    /// Stop immediately, discarding pending buffers. Valid when started or
    /// stopped; afterwards the stream can only be closed.
    pub fn abort(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        self.ensure_engine()?;
        match *state {
            StreamState::Closed => return Err(StreamError::native(BAD_STREAM_PTR)),
            StreamState::Started => {
                self.shared.halt();
                if let Err(status) = self.host.engine.abort_stream(self.id) {
                    self.shared.resume();
                    return Err(status.into());
                }
            }
            // Already quiet natively; only the managed state changes.
            StreamState::Stopped => self.shared.halt(),
            StreamState::Opened | StreamState::Aborted => {
                return Err(StreamError::native(STREAM_IS_STOPPED));
            }
        }
        *state = StreamState::Aborted;
        log::debug!("{} aborted", self.id);
        Ok(())
    }

    /// Release native resources and unregister. The stream must not be
    /// started; stop or abort it first.
    pub fn close(&self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        self.ensure_engine()?;
        match *state {
            StreamState::Closed => return Err(StreamError::native(BAD_STREAM_PTR)),
            StreamState::Started => return Err(StreamError::native(STREAM_IS_NOT_STOPPED)),
            StreamState::Opened | StreamState::Stopped | StreamState::Aborted => {}
        }

        self.host.engine.close_stream(self.id)?;
        self.host.registry.remove(self.id);
        *state = StreamState::Closed;
        log::info!("{} closed after {} periods", self.id, self.shared.periods());
        Ok(())
    }

    /// Whether the engine is currently calling the callback.
    ///
    /// Turns false on its own once the callback returns a terminal state.
    pub fn is_active(&self) -> Result<bool, StreamError> {
        self.query(|engine, id| engine.is_stream_active(id))
    }

    pub fn is_stopped(&self) -> Result<bool, StreamError> {
        self.query(|engine, id| engine.is_stream_stopped(id))
    }

    /// Fraction of the available period time spent in the callback.
    pub fn cpu_load(&self) -> Result<f64, StreamError> {
        self.query(|engine, id| engine.stream_cpu_load(id))
    }

    /// The stream's clock, in seconds.
    pub fn time(&self) -> Result<f64, StreamError> {
        self.query(|engine, id| engine.stream_time(id))
    }

    /// The engine must be up and must not have been terminated since open.
    fn ensure_engine(&self) -> Result<(), StreamError> {
        self.host.ensure_initialized()?;
        if self.host.session() != self.session {
            return Err(StreamError::native(BAD_STREAM_PTR));
        }
        Ok(())
    }

    fn query<T, F>(&self, call: F) -> Result<T, StreamError>
    where
        F: FnOnce(&dyn NativeEngine, StreamId) -> Result<T, NativeStatus>,
    {
        let state = self.state.lock();
        self.ensure_engine()?;
        if state.is_closed() {
            return Err(StreamError::native(BAD_STREAM_PTR));
        }
        Ok(call(self.host.engine.as_ref(), self.id)?)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("mode", &self.configuration.mode)
            .finish()
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        let state = *self.state.get_mut();
        if state.is_closed() {
            return;
        }
        if !self.host.is_initialized() || self.host.session() != self.session {
            // Torn down with the engine on terminate.
            return;
        }

        log::warn!("{} dropped while {:?}; closing it", self.id, state);
        if state.is_started() {
            if let Err(e) = self.abort() {
                log::error!("Failed to abort {} on drop: {}", self.id, e);
            }
        }
        if let Err(e) = self.close() {
            log::error!("Failed to close {} on drop: {}", self.id, e);
            self.host.registry.remove(self.id);
        }
    }
}
