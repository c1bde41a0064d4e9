use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use log::{debug, error};

use super::error::ClassifierError;
use super::ports::ClassificationPort;

/// A fixed set of classifier instances, each usable by one request at a time.
///
/// A request checks out one instance for its whole classify + explain pair,
/// so importance scores always belong to that request's own classification.
/// With a single instance this is a plain mutual-exclusion region.
pub struct ClassifierPool {
    slots: Vec<Mutex<Box<dyn ClassificationPort>>>,
    next: AtomicUsize,
    output_size: usize,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<ClassifierPool>();
    }
};

impl std::fmt::Debug for ClassifierPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierPool")
            .field("size", &self.slots.len())
            .field("output_size", &self.output_size)
            .finish()
    }
}

impl ClassifierPool {
    /// Creates a pool from one or more instances sharing the same output size.
    pub fn new(instances: Vec<Box<dyn ClassificationPort>>) -> Result<Self, ClassifierError> {
        let output_size = instances
            .first()
            .map(|instance| instance.output_size())
            .ok_or_else(|| {
                ClassifierError::Build("Classifier pool needs at least one instance".into())
            })?;

        if let Some(pos) = instances.iter().position(|i| i.output_size() != output_size) {
            return Err(ClassifierError::Build(format!(
                "Classifier instance {} outputs {} scores, instance 0 outputs {}",
                pos,
                instances[pos].output_size(),
                output_size
            )));
        }

        Ok(Self {
            slots: instances.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
            output_size,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Runs `f` with exclusive access to one instance.
    ///
    /// Prefers an idle instance; when all are busy, waits on the next one in
    /// round-robin order.
    pub fn with_instance<R>(
        &self,
        f: impl FnOnce(&mut dyn ClassificationPort) -> Result<R, ClassifierError>,
    ) -> Result<R, ClassifierError> {
        let mut guard = self.acquire();
        f(&mut **guard)
    }

    fn acquire(&self) -> MutexGuard<'_, Box<dyn ClassificationPort>> {
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        let size = self.slots.len();

        for offset in 0..size {
            let index = (start + offset) % size;
            match self.slots[index].try_lock() {
                Ok(guard) => return guard,
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(poisoned)) => return self.recover(index, poisoned),
            }
        }

        let index = start % size;
        debug!("All {} classifier instances busy, waiting on instance {}", size, index);
        match self.slots[index].lock() {
            Ok(guard) => guard,
            Err(poisoned) => self.recover(index, poisoned),
        }
    }

    /// Takes over an instance whose previous user panicked.
    ///
    /// Instances reset their per-call state at the start of `classify`, so the
    /// next request sees nothing left over from the failed one.
    fn recover<'a>(
        &'a self,
        index: usize,
        poisoned: PoisonError<MutexGuard<'a, Box<dyn ClassificationPort>>>,
    ) -> MutexGuard<'a, Box<dyn ClassificationPort>> {
        error!("Classifier instance {} panicked during inference, reusing it", index);
        self.slots[index].clear_poison();
        poisoned.into_inner()
    }
}
