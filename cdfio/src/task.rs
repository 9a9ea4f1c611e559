//! Concurrent extraction
//!
//! An [`ExtractionPool`] runs prepared extractions on a rayon thread pool.
//! Each submission gets an [`ExtractionSlot`] that moves through
//! `NotStarted -> InProgress -> Done` exactly once; callers poll it or
//! block on it through an [`ExtractionHandle`]. Running extractions cannot
//! be cancelled, only forgotten with [`ExtractionPool::discard`].

use crate::extract::{PreparedExtraction, RecordBuffer};
use crate::{Error, Result};
use hashbrown::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Shared outcome of one extraction
pub type ExtractionResult = std::result::Result<Arc<RecordBuffer>, Arc<Error>>;

/// Lifecycle of a slot
#[derive(Debug, Clone)]
pub enum SlotState {
    NotStarted,
    InProgress,
    Done(ExtractionResult),
}

/// Result cell for one extraction
#[derive(Debug)]
pub struct ExtractionSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Default for ExtractionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::NotStarted),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move from `NotStarted` to `InProgress`; false if already begun
    pub fn begin(&self) -> bool {
        let mut state = self.lock();
        if matches!(*state, SlotState::NotStarted) {
            *state = SlotState::InProgress;
            true
        } else {
            false
        }
    }

    /// Store the outcome. Only the first publication takes effect.
    pub fn publish(&self, result: Result<RecordBuffer>) -> bool {
        let mut state = self.lock();
        if matches!(*state, SlotState::Done(_)) {
            return false;
        }
        *state = SlotState::Done(result.map(Arc::new).map_err(Arc::new));
        self.ready.notify_all();
        true
    }

    /// Non-blocking completion check
    pub fn is_done(&self) -> bool {
        matches!(*self.lock(), SlotState::Done(_))
    }

    pub fn state(&self) -> SlotState {
        self.lock().clone()
    }

    /// Outcome if already published
    pub fn try_get(&self) -> Option<ExtractionResult> {
        match &*self.lock() {
            SlotState::Done(result) => Some(result.clone()),
            _ => None,
        }
    }

    /// Block until the outcome is published
    pub fn wait(&self) -> ExtractionResult {
        let mut state = self.lock();
        loop {
            if let SlotState::Done(result) = &*state {
                return result.clone();
            }
            state = self.ready.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Caller-side reference to a submitted extraction
#[derive(Debug, Clone)]
pub struct ExtractionHandle {
    id: u64,
    slot: Arc<ExtractionSlot>,
}

impl ExtractionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_done(&self) -> bool {
        self.slot.is_done()
    }

    /// Block for the buffer; failures are wrapped in [`Error::Extraction`]
    pub fn wait(&self) -> Result<Arc<RecordBuffer>> {
        self.slot.wait().map_err(Error::Extraction)
    }

    pub fn slot(&self) -> &Arc<ExtractionSlot> {
        &self.slot
    }
}

/// Thread pool plus a registry of in-flight and finished extractions
pub struct ExtractionPool {
    pool: rayon::ThreadPool,
    registry: Mutex<HashMap<u64, Arc<ExtractionSlot>>>,
    next_id: AtomicU64,
}

impl ExtractionPool {
    /// Pool with `threads` workers; zero means one per CPU
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("cdfio-extract-{i}"))
            .build()
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        Ok(Self {
            pool,
            registry: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<u64, Arc<ExtractionSlot>>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an extraction and return its handle immediately
    pub fn submit(&self, prepared: PreparedExtraction) -> ExtractionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(ExtractionSlot::new());
        self.registry().insert(id, slot.clone());

        let worker = slot.clone();
        self.pool.spawn(move || {
            if worker.begin() {
                let result = prepared.materialize();
                if let Err(err) = &result {
                    tracing::debug!(id, error = %err, "extraction failed");
                }
                worker.publish(result);
            }
        });
        ExtractionHandle { id, slot }
    }

    pub fn slot(&self, id: u64) -> Option<Arc<ExtractionSlot>> {
        self.registry().get(&id).cloned()
    }

    /// `None` when the id is unknown or was discarded
    pub fn is_done(&self, id: u64) -> Option<bool> {
        self.slot(id).map(|slot| slot.is_done())
    }

    /// Block for a registered extraction
    pub fn wait(&self, id: u64) -> Option<Result<Arc<RecordBuffer>>> {
        let slot = self.slot(id)?;
        Some(slot.wait().map_err(Error::Extraction))
    }

    /// Forget a registered extraction. A running one still finishes, and
    /// outstanding handles keep its result.
    pub fn discard(&self, id: u64) -> bool {
        self.registry().remove(&id).is_some()
    }

    /// Registered extractions
    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ExtractionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionPool")
            .field("threads", &self.pool.current_num_threads())
            .field("registered", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_lifecycle() {
        let slot = ExtractionSlot::new();
        assert!(matches!(slot.state(), SlotState::NotStarted));
        assert!(slot.try_get().is_none());
        assert!(slot.begin());
        assert!(!slot.begin());
        assert!(!slot.is_done());

        assert!(slot.publish(Err(Error::InvalidArgument("first"))));
        assert!(!slot.publish(Err(Error::InvalidArgument("second"))));
        assert!(slot.is_done());
        let err = slot.wait().unwrap_err();
        assert!(matches!(*err, Error::InvalidArgument("first")));
    }

    #[test]
    fn test_wait_across_threads() {
        let slot = Arc::new(ExtractionSlot::new());
        let waiter = {
            let slot = slot.clone();
            std::thread::spawn(move || slot.wait().is_err())
        };
        std::thread::sleep(std::time::Duration::from_millis(10));
        slot.publish(Err(Error::UnknownVariable("x".into())));
        assert!(waiter.join().unwrap());
    }
}
