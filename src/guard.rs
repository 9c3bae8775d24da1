//! Critical sections, retirement batching, and reclamation passes.

use crate::retired::Retired;
use crate::slot::{EPOCH_FREQ, RETIRE_FREQ, Registry, registry};
use core::cell::{Cell, RefCell};
use core::marker::PhantomData;
use core::sync::atomic::{Ordering, fence};

/// RAII token for an active critical section.
///
/// While a `Guard` exists on a thread, every node read from a cell on that
/// thread stays allocated, even if concurrently replaced and retired.
/// Guards nest; only the outermost one publishes and clears the thread's
/// reservation.
pub struct Guard {
    // Guards belong to the pinning thread.
    _not_send: PhantomData<*mut ()>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        HANDLE.with(|handle| handle.unpin());
    }
}

/// Per-thread reclamation state.
struct Handle {
    tid: Cell<Option<usize>>,
    pin_count: Cell<usize>,
    batch: RefCell<Vec<Retired>>,
    retire_count: Cell<usize>,
}

impl Handle {
    const fn new() -> Self {
        Self {
            tid: Cell::new(None),
            pin_count: Cell::new(0),
            batch: RefCell::new(Vec::new()),
            retire_count: Cell::new(0),
        }
    }

    /// The thread's slot index, allocated on first use.
    fn tid(&self, global: &'static Registry) -> usize {
        match self.tid.get() {
            Some(tid) => tid,
            None => {
                let tid = global.alloc_tid();
                self.tid.set(Some(tid));
                tid
            }
        }
    }

    fn pin(&self) -> Guard {
        let count = self.pin_count.get();
        self.pin_count.set(count + 1);
        if count > 0 {
            return Guard {
                _not_send: PhantomData,
            };
        }

        let global = registry();
        let reservation = global.reservation(self.tid(global));
        let mut era = global.era();
        loop {
            reservation.publish(era);
            fence(Ordering::SeqCst);
            // A stale reservation is safe (lower eras protect more) but
            // pins down garbage retired long after; chase the era until
            // the published value is current.
            let current = global.era();
            if current == era {
                break;
            }
            era = current;
        }
        Guard {
            _not_send: PhantomData,
        }
    }

    fn unpin(&self) {
        let count = self.pin_count.get();
        debug_assert!(count > 0, "guard dropped without matching pin");
        self.pin_count.set(count - 1);
        if count == 1 {
            let global = registry();
            if let Some(tid) = self.tid.get() {
                global.reservation(tid).clear();
            }
            // Outside the critical section our own reservation no longer
            // keeps the batch alive, so a full batch is worth a pass now.
            if self.batch.borrow().len() >= RETIRE_FREQ {
                self.collect(global);
            }
        }
    }

    /// Hand `ptr` to the reclamation system.
    ///
    /// # Safety
    ///
    /// `ptr` comes from `Box::into_raw`, has just been unlinked from its
    /// cell, and is never dereferenced by the caller again.
    unsafe fn retire<T: Send + 'static>(&self, ptr: *mut T) {
        let global = registry();
        // The retire era must be read after the unlinking exchange: any
        // reader that loaded `ptr` published its reservation no later
        // than this stamp.
        fence(Ordering::SeqCst);
        let retire_era = global.era();
        self.batch
            .borrow_mut()
            .push(unsafe { Retired::new(ptr, retire_era) });

        let count = self.retire_count.get().wrapping_add(1);
        self.retire_count.set(count);
        if count % EPOCH_FREQ == 0 {
            global.advance_era();
        }
        // Retiring always happens under a guard whose own reservation
        // covers fresh records; the batch is examined on outermost unpin.
    }

    /// One reclamation pass: free every batched or orphaned record whose
    /// retire stamp lies below all active reservations, keep the rest.
    fn collect(&self, global: &'static Registry) {
        let mut pending = core::mem::take(&mut *self.batch.borrow_mut());
        pending.append(&mut global.adopt_orphans());
        if pending.is_empty() {
            return;
        }

        let mut reservations = Vec::new();
        global.scan_reservations(&mut reservations);

        let mut kept = Vec::new();
        for record in pending {
            if reservations.iter().any(|&era| record.covers(era)) {
                kept.push(record);
            } else {
                // SAFETY: every active reservation era is above the
                // record's retire stamp, so no pinned reader can still
                // hold the pointer.
                unsafe { record.reclaim() };
            }
        }
        // Destructors above may have retired more; merge rather than
        // overwrite.
        self.batch.borrow_mut().append(&mut kept);
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(tid) = self.tid.get() {
            let global = registry();
            global.reservation(tid).clear();
            self.collect(global);
            let leftovers = core::mem::take(&mut *self.batch.borrow_mut());
            if !leftovers.is_empty() {
                global.park_orphans(leftovers);
            }
            self.tid.set(None);
            global.free_tid(tid);
        }
    }
}

thread_local! {
    static HANDLE: Handle = const { Handle::new() };
}

/// Enter a critical section.
///
/// Cell reads performed while the returned [`Guard`] is alive observe
/// values that stay valid until the guard drops. Pinning is cheap and
/// reentrant; cell operations pin internally, so calling this directly is
/// only needed to extend a critical section over several operations.
#[inline]
pub fn pin() -> Guard {
    HANDLE.with(|handle| handle.pin())
}

/// Retire an unlinked node.
///
/// # Safety
///
/// See [`Handle::retire`].
#[inline]
pub(crate) unsafe fn retire<T: Send + 'static>(ptr: *mut T) {
    HANDLE.with(|handle| unsafe { handle.retire(ptr) });
}

/// Attempt to free all pending retirements of this thread plus any left
/// behind by exited threads.
///
/// Advances the global era first, so with no live guards anywhere this
/// frees everything outstanding. With concurrent pinned readers it frees
/// what it can; the rest stays batched for a later pass.
pub fn flush() {
    // try_with: cells may be dropped during thread teardown, after the
    // handle itself is gone. Orphan parking already happened then.
    let _ = HANDLE.try_with(|handle| {
        let global = registry();
        global.advance_era();
        handle.collect(global);
    });
}
