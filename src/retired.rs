//! Deferred-destruction records.

/// Monomorphized, type-erased destructor.
type DropFn = unsafe fn(*mut u8);

/// An allocation whose destruction has been deferred until no reader can
/// still reach it.
///
/// The record owns the pointee. `retire` is the global era observed right
/// after the allocation was unlinked; any reader that obtained the pointer
/// was pinned at that era or earlier.
pub(crate) struct Retired {
    ptr: *mut u8,
    drop_fn: DropFn,
    retire: u64,
}

// A record is only built from a `Box<T>` with `T: Send`, and ownership
// moves wholesale into the reclamation system.
unsafe impl Send for Retired {}

impl Retired {
    /// Take ownership of `ptr` for deferred destruction.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `Box::into_raw`, must not be retired twice,
    /// and must not be accessed again outside the reclamation system.
    pub(crate) unsafe fn new<T: Send + 'static>(ptr: *mut T, retire: u64) -> Self {
        unsafe fn drop_box<T>(ptr: *mut u8) {
            // SAFETY: `ptr` was produced by `Box::into_raw::<T>` and this
            // runs at most once per record.
            unsafe {
                drop(Box::from_raw(ptr as *mut T));
            }
        }

        Self {
            ptr: ptr as *mut u8,
            drop_fn: drop_box::<T>,
            retire,
        }
    }

    /// Whether a reader pinned at `era` may still hold this pointer.
    ///
    /// Reservation eras are monotone: a reader that loaded the pointer
    /// before the unlink published its era no later than the retire stamp,
    /// so only reservations at or below the stamp can reach the record.
    pub(crate) fn covers(&self, era: u64) -> bool {
        era <= self.retire
    }

    /// Run the destructor and free the allocation.
    ///
    /// # Safety
    ///
    /// No thread may still be able to reach the pointee, i.e. no active
    /// reservation era satisfies [`Retired::covers`].
    pub(crate) unsafe fn reclaim(self) {
        unsafe { (self.drop_fn)(self.ptr) }
    }
}
