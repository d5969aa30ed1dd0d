//! Parallel iteration when the `parallel` feature is on, plain iterators
//! otherwise.
//!
//! Stages only call `into_par_iter()` on ranges and collect, so the
//! sequential build needs nothing more than a renamed `into_iter()`.
//! The shim is compiled into every test build; `cargo test-seq` runs the
//! whole suite on it.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(any(test, not(feature = "parallel")))]
mod sequential {
    /// Sequential stand-in for `rayon::prelude::IntoParallelIterator`
    pub trait IntoParallelIterator {
        type Iter: Iterator<Item = Self::Item>;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }

}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
