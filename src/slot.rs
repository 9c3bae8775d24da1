//! Global registry: reservation slots, era counter, thread-id allocation.

use crate::retired::Retired;
use crate::ttas::TTas;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering, fence};
use once_cell::race::OnceBox;

/// Maximum number of threads that may hold a reservation concurrently.
/// Ids are recycled on thread exit, so thread churn does not consume slots.
pub(crate) const MAX_THREADS: usize = 128;

/// Local batch size that triggers a reclamation pass.
pub(crate) const RETIRE_FREQ: usize = 64;

/// Number of retirements between global era advances.
pub(crate) const EPOCH_FREQ: usize = 128;

/// Reservation value meaning "no active critical section".
///
/// The era counter starts at 1 so this can never collide with a real era.
pub(crate) const INACTIVE: u64 = 0;

/// One thread's published era, padded to a cache line of its own.
#[repr(align(128))]
pub(crate) struct Reservation {
    era: AtomicU64,
}

impl Reservation {
    const fn new() -> Self {
        Self {
            era: AtomicU64::new(INACTIVE),
        }
    }

    pub(crate) fn publish(&self, era: u64) {
        self.era.store(era, Ordering::SeqCst);
    }

    pub(crate) fn clear(&self) {
        self.era.store(INACTIVE, Ordering::SeqCst);
    }

    pub(crate) fn get(&self) -> u64 {
        self.era.load(Ordering::SeqCst)
    }
}

pub(crate) struct Registry {
    slots: &'static [Reservation],
    era: AtomicU64,
    next_tid: AtomicUsize,
    free_tids: TTas<Vec<usize>>,
    /// Retirements left behind by exited threads, adopted by whichever
    /// thread reclaims next.
    orphans: TTas<Vec<Retired>>,
}

impl Registry {
    fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_THREADS);
        for _ in 0..MAX_THREADS {
            slots.push(Reservation::new());
        }
        Self {
            slots: Box::leak(slots.into_boxed_slice()),
            era: AtomicU64::new(1),
            next_tid: AtomicUsize::new(0),
            free_tids: TTas::new(Vec::new()),
            orphans: TTas::new(Vec::new()),
        }
    }

    pub(crate) fn reservation(&self, tid: usize) -> &Reservation {
        &self.slots[tid]
    }

    pub(crate) fn era(&self) -> u64 {
        self.era.load(Ordering::SeqCst)
    }

    pub(crate) fn advance_era(&self) {
        self.era.fetch_add(1, Ordering::SeqCst);
    }

    /// Hand out a thread id, preferring a recycled one.
    ///
    /// Panics once more than `MAX_THREADS` threads hold ids at the same
    /// time.
    pub(crate) fn alloc_tid(&self) -> usize {
        if let Some(tid) = self.free_tids.lock().pop() {
            return tid;
        }
        let tid = self.next_tid.fetch_add(1, Ordering::Relaxed);
        assert!(
            tid < MAX_THREADS,
            "petek: more than {MAX_THREADS} threads active at once"
        );
        tid
    }

    pub(crate) fn free_tid(&self, tid: usize) {
        self.slots[tid].clear();
        self.free_tids.lock().push(tid);
    }

    /// Park retirements an exiting thread could not free.
    pub(crate) fn park_orphans(&self, mut batch: Vec<Retired>) {
        self.orphans.lock().append(&mut batch);
    }

    /// Take the whole orphan bin for a reclamation attempt. Survivors go
    /// back via the caller's local batch.
    pub(crate) fn adopt_orphans(&self) -> Vec<Retired> {
        core::mem::take(&mut *self.orphans.lock())
    }

    /// Snapshot every active reservation era into `out`.
    pub(crate) fn scan_reservations(&self, out: &mut Vec<u64>) {
        out.clear();
        // Order the scan after the unlink that made the candidates
        // unreachable; see the reclamation pass in guard.rs.
        fence(Ordering::SeqCst);
        for slot in self.slots {
            let era = slot.get();
            if era != INACTIVE {
                out.push(era);
            }
        }
    }
}

static REGISTRY: OnceBox<Registry> = OnceBox::new();

pub(crate) fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Box::new(Registry::new()))
}
