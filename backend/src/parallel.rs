//! Parallel/sequential execution helpers
//!
//! The `cfg(feature = "parallel")` switch lives here so call sites stay
//! identical whether or not rayon is compiled in. Results always come back in
//! input order.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Map a function over a slice, potentially in parallel.
///
/// # Parameters
/// - `force_sequential`: When true, runs sequentially even if the
///   `parallel` feature is enabled
#[inline]
pub fn map_slice<T, F, R>(slice: &[T], f: F, force_sequential: bool) -> Vec<R>
where
    T: Sync,
    F: Fn(&T) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "parallel")]
    {
        if force_sequential {
            slice.iter().map(f).collect()
        } else {
            slice.par_iter().map(f).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = force_sequential;
        slice.iter().map(f).collect()
    }
}

/// Map over a Vec, consuming it, potentially in parallel.
///
/// Used when each task owns mutable state (negotiators, forked RNGs) that
/// must be handed back afterwards.
#[inline]
pub fn map_vec<T, F, R>(items: Vec<T>, f: F, force_sequential: bool) -> Vec<R>
where
    T: Send,
    F: Fn(T) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "parallel")]
    {
        if force_sequential {
            items.into_iter().map(f).collect()
        } else {
            items.into_par_iter().map(f).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = force_sequential;
        items.into_iter().map(f).collect()
    }
}
