use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::models::error::StreamError;
use crate::models::state::StreamId;
use crate::traits::stream_callback::{FinishedHook, StreamCallback};

/// Callback failures held for the application; newer ones are dropped when full.
const FAILURE_QUEUE_CAPACITY: usize = 64;

/// Per-stream state shared by the application-side [`Stream`](super::stream::Stream)
/// and the audio thread.
pub(crate) struct StreamShared {
    id: StreamId,
    /// Only ever locked by the audio thread, and then with `try_lock`.
    pub(crate) callback: Mutex<Box<dyn StreamCallback>>,
    finished_hook: Mutex<Option<FinishedHook>>,
    /// Set once the callback asked to stop, failed, or the stream was aborted.
    /// Further periods return the abort code without running the callback.
    halted: AtomicBool,
    /// True between a successful start and the finished notification.
    running: AtomicBool,
    periods: AtomicU64,
    failures: AtomicU64,
}

impl StreamShared {
    pub(crate) fn new(id: StreamId, callback: Box<dyn StreamCallback>, finished_hook: Option<FinishedHook>) -> Self {
        Self {
            id,
            callback: Mutex::new(callback),
            finished_hook: Mutex::new(finished_hook),
            halted: AtomicBool::new(false),
            running: AtomicBool::new(false),
            periods: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> StreamId {
        self.id
    }

    /// Prepare for a new run: callbacks flow again and the next finished
    /// notification fires the hook.
    pub(crate) fn arm(&self) {
        self.halted.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
    }

    /// Undo [`arm`](Self::arm) after the native start failed.
    pub(crate) fn disarm(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub(crate) fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    /// Undo [`halt`](Self::halt) after the native abort failed.
    pub(crate) fn resume(&self) {
        self.halted.store(false, Ordering::Release);
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub(crate) fn count_period(&self) {
        self.periods.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn periods(&self) -> u64 {
        self.periods.load(Ordering::Relaxed)
    }

    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Takes the hook for one invocation if this run has not finished yet.
    ///
    /// Returns `false` when the run was already reported.
    pub(crate) fn finish<F>(&self, run_hook: F) -> bool
    where
        F: FnOnce(&mut FinishedHook),
    {
        if !self.running.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.halt();
        if let Some(hook) = self.finished_hook.lock().as_mut() {
            run_hook(hook);
        }
        true
    }
}

type StreamTable = HashMap<StreamId, Arc<StreamShared>>;

/// Process-wide table from stream identifier to its shared state.
///
/// Writers (open, close, terminate) serialize on a short mutex and publish
/// a fresh copy of the table. The audio thread reads the current copy
/// through [`ArcSwap::load`] and never waits on a writer.
pub struct StreamRegistry {
    streams: ArcSwap<StreamTable>,
    writer: Mutex<()>,
    failure_tx: Sender<StreamError>,
}

impl StreamRegistry {
    pub(crate) fn new() -> (Self, Receiver<StreamError>) {
        let (failure_tx, failure_rx) = crossbeam_channel::bounded(FAILURE_QUEUE_CAPACITY);
        let registry = Self {
            streams: ArcSwap::from_pointee(HashMap::new()),
            writer: Mutex::new(()),
            failure_tx,
        };
        (registry, failure_rx)
    }

    /// Wait-free snapshot of the table. Safe on the audio thread.
    pub(crate) fn snapshot(&self) -> Guard<Arc<StreamTable>> {
        self.streams.load()
    }

    pub(crate) fn get(&self, id: StreamId) -> Option<Arc<StreamShared>> {
        self.snapshot().get(&id).cloned()
    }

    pub fn contains(&self, id: StreamId) -> bool {
        self.snapshot().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub(crate) fn insert(&self, stream: Arc<StreamShared>) {
        let _writer = self.writer.lock();
        let mut table = StreamTable::clone(&self.streams.load());
        if let Some(previous) = table.insert(stream.id(), stream) {
            log::warn!("{} was still registered; replacing stale entry", previous.id());
        }
        self.streams.store(Arc::new(table));
    }

    pub(crate) fn remove(&self, id: StreamId) -> Option<Arc<StreamShared>> {
        let _writer = self.writer.lock();
        let current = self.streams.load();
        if !current.contains_key(&id) {
            return None;
        }
        let mut table = StreamTable::clone(&current);
        let removed = table.remove(&id);
        self.streams.store(Arc::new(table));
        removed
    }

    /// Ids of every registered stream.
    pub(crate) fn ids(&self) -> Vec<StreamId> {
        self.streams.load().keys().copied().collect()
    }

    /// Drops every entry, returning how many there were.
    pub(crate) fn clear(&self) -> usize {
        let _writer = self.writer.lock();
        let previous = self.streams.swap(Arc::new(HashMap::new()));
        previous.len()
    }

    /// Queue a callback failure for the application. Never blocks; if the
    /// queue is full the failure is only counted.
    pub(crate) fn report_failure(&self, error: StreamError) {
        let _ = self.failure_tx.try_send(error);
    }
}
