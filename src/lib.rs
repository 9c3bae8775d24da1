//! Lock-free atomic value cells with safe memory reclamation.
//!
//! petek provides [`ValueCell<T>`], a cell holding at most one value of an
//! arbitrary (`Send + Sync`) type that any number of threads can read and
//! replace without locks or torn values, and [`ComparableCell<T>`], which
//! adds an atomic compare-and-swap gated on value equality.
//!
//! Every store publishes a fresh heap allocation with a single atomic
//! exchange; readers clone the value out under a short internal critical
//! section. Displaced allocations go through an era-based reclamation
//! scheme: each reading thread publishes the global era it entered at,
//! each displaced allocation is stamped with the era it left at, and an
//! allocation is freed only once every published reader era lies above
//! its stamp. Values are therefore destroyed exactly once and never under
//! a concurrent reader.
//!
//! All cell operations are lock-free: no operation blocks, spins on
//! another thread's progress, or returns an error.
//!
//! # Examples
//!
//! ```
//! use petek::{ComparableCell, ValueCell};
//!
//! let cell = ValueCell::with_value(5u64);
//! assert_eq!(cell.load(), 5);
//! assert_eq!(cell.swap(9), 5);
//!
//! let counter = ComparableCell::with_value(0u32);
//! assert!(counter.compare_and_swap(&0, 1));
//! assert_eq!(counter.load(), 1);
//! ```
//!
//! Reclamation normally runs piggybacked on cell operations. A quiescent
//! embedder (or a test) can force it with [`flush`]; a reader wanting one
//! consistent view across several operations can hold a [`Guard`] from
//! [`pin`].

#![warn(missing_docs)]

mod atomic;
mod cell;
mod guard;
mod retired;
mod slot;
mod ttas;

pub use cell::{ComparableCell, ValueCell};
pub use guard::{Guard, flush, pin};
