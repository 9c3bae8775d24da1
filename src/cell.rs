//! Atomic value cells.

use crate::atomic::{Atomic, Shared};
use crate::guard;
use core::fmt;
use core::ptr;
use core::sync::atomic::Ordering;

/// A lock-free cell holding at most one value of type `T`.
///
/// Writers replace the value wholesale with a single atomic exchange;
/// readers clone it out under an internal critical section. Displaced
/// values are destroyed exactly once, and never while a concurrent reader
/// can still observe them.
///
/// An empty cell (never stored, or emptied by [`take`](Self::take)) reads
/// as `T::default()` through [`load`](Self::load), or as `None` through
/// [`get`](Self::get).
///
/// # Examples
///
/// ```
/// use petek::ValueCell;
///
/// let cell: ValueCell<u64> = ValueCell::new();
/// assert_eq!(cell.load(), 0);
///
/// cell.store(5);
/// assert_eq!(cell.load(), 5);
/// assert_eq!(cell.swap(9), 5);
/// assert_eq!(cell.load(), 9);
/// ```
pub struct ValueCell<T: Send + Sync + 'static> {
    // Send + Sync follow from Atomic's own bounds: the cell owns its
    // value through the pointer. The pointee is immutable after publish.
    slot: Atomic<T>,
}

impl<T: Send + Sync + 'static> ValueCell<T> {
    /// Creates an empty cell.
    pub const fn new() -> Self {
        Self {
            slot: Atomic::null(),
        }
    }

    /// Creates a cell already holding `value`.
    pub fn with_value(value: T) -> Self {
        Self {
            slot: Atomic::new(Box::into_raw(Box::new(value))),
        }
    }

    /// Returns a copy of the current value, or `T::default()` if the cell
    /// is empty.
    pub fn load(&self) -> T
    where
        T: Clone + Default,
    {
        self.get().unwrap_or_default()
    }

    /// Returns a copy of the current value, or `None` if the cell is
    /// empty.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        let guard = guard::pin();
        let shared = self.slot.load(Ordering::Acquire, &guard);
        // Cloned inside the critical section; the pointee outlives the
        // guard.
        unsafe { shared.as_ref() }.cloned()
    }

    /// Stores `value`, unconditionally replacing any current value.
    pub fn store(&self, value: T) {
        let new = Box::into_raw(Box::new(value));
        let guard = guard::pin();
        let old = self.slot.swap(new, Ordering::AcqRel, &guard);
        unsafe { Self::retire_node(old) };
    }

    /// Stores `value` and returns the displaced value, or `T::default()`
    /// if the cell was empty.
    ///
    /// Each displaced value is observed by exactly one swapper; a chain of
    /// concurrent swaps loses nothing.
    pub fn swap(&self, value: T) -> T
    where
        T: Clone + Default,
    {
        let new = Box::into_raw(Box::new(value));
        let guard = guard::pin();
        let old = self.slot.swap(new, Ordering::AcqRel, &guard);
        let displaced = unsafe { old.as_ref() }.cloned();
        unsafe { Self::retire_node(old) };
        displaced.unwrap_or_default()
    }

    /// Empties the cell, returning the displaced value if there was one.
    pub fn take(&self) -> Option<T>
    where
        T: Clone,
    {
        let guard = guard::pin();
        let old = self.slot.swap(ptr::null_mut(), Ordering::AcqRel, &guard);
        let displaced = unsafe { old.as_ref() }.cloned();
        unsafe { Self::retire_node(old) };
        displaced
    }

    /// Whether the cell currently holds no value.
    pub fn is_empty(&self) -> bool {
        let guard = guard::pin();
        self.slot.load(Ordering::Acquire, &guard).is_null()
    }

    /// Consumes the cell, returning its value without cloning.
    pub fn into_inner(mut self) -> Option<T> {
        let ptr = self.slot.load_raw();
        core::mem::forget(self);
        if ptr.is_null() {
            None
        } else {
            // SAFETY: consumed by value, so no other reference to the
            // cell exists and the allocation was never retired.
            Some(*unsafe { Box::from_raw(ptr) })
        }
    }

    /// Retire an allocation displaced by an exchange.
    ///
    /// # Safety
    ///
    /// `old` was atomically unlinked from this cell's slot and the caller
    /// does not touch it afterwards.
    unsafe fn retire_node(old: Shared<'_, T>) {
        let ptr = old.as_raw();
        if !ptr.is_null() {
            unsafe { guard::retire(ptr) };
        }
    }
}

impl<T: Send + Sync + 'static> Default for ValueCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> From<T> for ValueCell<T> {
    fn from(value: T) -> Self {
        Self::with_value(value)
    }
}

impl<T: Send + Sync + Clone + fmt::Debug + 'static> fmt::Debug for ValueCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCell").field("value", &self.get()).finish()
    }
}

impl<T: Send + Sync + 'static> Drop for ValueCell<T> {
    fn drop(&mut self) {
        // Exclusive access: the final node needs no deferral.
        let ptr = self.slot.load_raw();
        if !ptr.is_null() {
            unsafe { drop(Box::from_raw(ptr)) };
        }
        guard::flush();
    }
}

/// A [`ValueCell`] over a comparable type, adding an atomic
/// compare-and-swap gated on value equality.
///
/// The cell adds no storage of its own; all `ValueCell` operations are
/// available through delegation.
///
/// # Examples
///
/// ```
/// use petek::ComparableCell;
///
/// let cell = ComparableCell::with_value(9u32);
/// assert!(!cell.compare_and_swap(&5, 1));
/// assert_eq!(cell.load(), 9);
/// assert!(cell.compare_and_swap(&9, 1));
/// assert_eq!(cell.load(), 1);
/// ```
pub struct ComparableCell<T: Send + Sync + 'static> {
    cell: ValueCell<T>,
}

impl<T: Send + Sync + 'static> ComparableCell<T> {
    /// Creates an empty cell.
    pub const fn new() -> Self {
        Self {
            cell: ValueCell::new(),
        }
    }

    /// Creates a cell already holding `value`.
    pub fn with_value(value: T) -> Self {
        Self {
            cell: ValueCell::with_value(value),
        }
    }

    /// Returns a copy of the current value, or `T::default()` if the cell
    /// is empty.
    pub fn load(&self) -> T
    where
        T: Clone + Default,
    {
        self.cell.load()
    }

    /// Returns a copy of the current value, or `None` if the cell is
    /// empty.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.cell.get()
    }

    /// Stores `value`, unconditionally replacing any current value.
    pub fn store(&self, value: T) {
        self.cell.store(value);
    }

    /// Stores `value` and returns the displaced value, or `T::default()`
    /// if the cell was empty.
    pub fn swap(&self, value: T) -> T
    where
        T: Clone + Default,
    {
        self.cell.swap(value)
    }

    /// Empties the cell, returning the displaced value if there was one.
    pub fn take(&self) -> Option<T>
    where
        T: Clone,
    {
        self.cell.take()
    }

    /// Whether the cell currently holds no value.
    pub fn is_empty(&self) -> bool {
        self.cell.is_empty()
    }

    /// Consumes the cell, returning its value without cloning.
    pub fn into_inner(self) -> Option<T> {
        self.cell.into_inner()
    }

    /// Replaces the current value with `new` if it compares equal to
    /// `expected`, returning whether the replacement happened.
    ///
    /// Equality is by value, not by storage identity: a value stored by a
    /// different thread matches as long as it compares equal. An empty
    /// cell compares as `T::default()`, so a fresh cell accepts
    /// `compare_and_swap(&T::default(), new)`.
    ///
    /// On an unequal comparison the cell is untouched and nothing is
    /// allocated. The replacement itself is a single strong pointer
    /// compare-exchange: a concurrent replacement, even one publishing an
    /// equal value, causes a `false` return rather than a lost update.
    pub fn compare_and_swap(&self, expected: &T, new: T) -> bool
    where
        T: PartialEq + Default,
    {
        let guard = guard::pin();
        let current = self.cell.slot.load(Ordering::Acquire, &guard);
        let matches = match unsafe { current.as_ref() } {
            Some(value) => *expected == *value,
            None => *expected == T::default(),
        };
        if !matches {
            return false;
        }

        let new_ptr = Box::into_raw(Box::new(new));
        match self.cell.slot.compare_exchange(
            current,
            new_ptr,
            Ordering::AcqRel,
            Ordering::Acquire,
            &guard,
        ) {
            Ok(old) => {
                unsafe { ValueCell::<T>::retire_node(old) };
                true
            }
            Err(_) => {
                // Never published; no other thread saw the allocation.
                unsafe { drop(Box::from_raw(new_ptr)) };
                false
            }
        }
    }
}

impl<T: Send + Sync + 'static> Default for ComparableCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> From<T> for ComparableCell<T> {
    fn from(value: T) -> Self {
        Self::with_value(value)
    }
}

impl<T: Send + Sync + Clone + fmt::Debug + 'static> fmt::Debug for ComparableCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparableCell")
            .field("value", &self.get())
            .finish()
    }
}
