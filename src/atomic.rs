//! Guard-scoped atomic pointers.

use crate::guard::Guard;
use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

/// An atomic pointer whose loads are only meaningful inside a critical
/// section: every borrowing accessor takes a [`Guard`] and ties the
/// returned [`Shared`] to its lifetime.
pub(crate) struct Atomic<T> {
    data: AtomicPtr<T>,
}

unsafe impl<T: Send + Sync> Send for Atomic<T> {}
unsafe impl<T: Send + Sync> Sync for Atomic<T> {}

impl<T> Atomic<T> {
    pub(crate) const fn null() -> Self {
        Self {
            data: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub(crate) fn new(ptr: *mut T) -> Self {
        Self {
            data: AtomicPtr::new(ptr),
        }
    }

    pub(crate) fn load<'g>(&self, order: Ordering, _guard: &'g Guard) -> Shared<'g, T> {
        Shared {
            data: self.data.load(order),
            _marker: PhantomData,
        }
    }

    /// Read the pointer without a guard.
    ///
    /// Takes `&mut self`, so the caller provably has exclusive access and
    /// no concurrent retirement can race the read.
    pub(crate) fn load_raw(&mut self) -> *mut T {
        *self.data.get_mut()
    }

    pub(crate) fn swap<'g>(&self, new: *mut T, order: Ordering, _guard: &'g Guard) -> Shared<'g, T> {
        Shared {
            data: self.data.swap(new, order),
            _marker: PhantomData,
        }
    }

    /// Strong compare-exchange on the pointer value. Returns the witnessed
    /// pointer on either outcome.
    pub(crate) fn compare_exchange<'g>(
        &self,
        current: Shared<'_, T>,
        new: *mut T,
        success: Ordering,
        failure: Ordering,
        _guard: &'g Guard,
    ) -> Result<Shared<'g, T>, Shared<'g, T>> {
        match self.data.compare_exchange(current.data, new, success, failure) {
            Ok(prev) => Ok(Shared {
                data: prev,
                _marker: PhantomData,
            }),
            Err(prev) => Err(Shared {
                data: prev,
                _marker: PhantomData,
            }),
        }
    }
}

/// A pointer loaded from an [`Atomic`], valid for the lifetime `'g` of the
/// guard it was loaded under.
pub(crate) struct Shared<'g, T> {
    data: *mut T,
    _marker: PhantomData<(&'g Guard, *mut T)>,
}

impl<T> Clone for Shared<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Shared<'_, T> {}

impl<'g, T> Shared<'g, T> {
    pub(crate) fn as_raw(&self) -> *mut T {
        self.data
    }

    pub(crate) fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Borrow the pointee for the guard's lifetime.
    ///
    /// # Safety
    ///
    /// The pointer must have been loaded from an [`Atomic`] that publishes
    /// only fully-initialized nodes, and the node must not be mutated
    /// after publication.
    pub(crate) unsafe fn as_ref(&self) -> Option<&'g T> {
        unsafe { self.data.as_ref() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::pin;

    #[test]
    fn null_roundtrip() {
        let atomic: Atomic<u64> = Atomic::null();
        let guard = pin();
        let shared = atomic.load(Ordering::Acquire, &guard);
        assert!(shared.is_null());
        assert!(unsafe { shared.as_ref() }.is_none());
    }

    #[test]
    fn swap_returns_previous() {
        let first = Box::into_raw(Box::new(1u64));
        let second = Box::into_raw(Box::new(2u64));
        let atomic = Atomic::new(first);
        let guard = pin();
        let prev = atomic.swap(second, Ordering::AcqRel, &guard);
        assert_eq!(prev.as_raw(), first);
        assert_eq!(unsafe { prev.as_ref() }, Some(&1));
        // Exclusive in this test; free directly.
        unsafe {
            drop(Box::from_raw(first));
            drop(Box::from_raw(second));
        }
    }

    #[test]
    fn compare_exchange_is_pointer_identity() {
        let first = Box::into_raw(Box::new(5u64));
        let equal_value = Box::into_raw(Box::new(5u64));
        let third = Box::into_raw(Box::new(6u64));
        let atomic = Atomic::new(first);
        let guard = pin();

        // Same value at a different address must not match.
        let stale = Shared {
            data: equal_value,
            _marker: PhantomData,
        };
        assert!(
            atomic
                .compare_exchange(stale, third, Ordering::AcqRel, Ordering::Acquire, &guard)
                .is_err()
        );

        let current = atomic.load(Ordering::Acquire, &guard);
        assert!(
            atomic
                .compare_exchange(current, third, Ordering::AcqRel, Ordering::Acquire, &guard)
                .is_ok()
        );

        unsafe {
            drop(Box::from_raw(first));
            drop(Box::from_raw(equal_value));
            drop(Box::from_raw(third));
        }
    }
}
