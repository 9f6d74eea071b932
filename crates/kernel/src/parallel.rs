//! Parallel-for dispatch over particle indices.
//!
//! Every pass in the solver is "array in, array out": a closure reads shared
//! immutable state and produces the value for one particle slot. Each call
//! below returns only after all indices are processed, which is the phase
//! barrier between passes.

use rayon::prelude::*;

/// Minimum number of particles handed to one rayon task.
const MIN_CHUNK: usize = 256;

/// Execution strategy for per-particle passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispatch {
    /// Run every pass on the calling thread.
    Serial,
    /// Split every pass across the rayon global pool.
    #[default]
    Parallel,
}

impl Dispatch {
    /// `Parallel` when `parallel` is true, `Serial` otherwise.
    pub fn from_flag(parallel: bool) -> Self {
        if parallel {
            Self::Parallel
        } else {
            Self::Serial
        }
    }

    /// Evaluate `f(i)` for `i in 0..n` and collect the results in index order.
    pub fn map<T, F>(self, n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            Self::Serial => (0..n).map(f).collect(),
            Self::Parallel => (0..n)
                .into_par_iter()
                .with_min_len(MIN_CHUNK)
                .map(f)
                .collect(),
        }
    }

    /// Largest `f(i)` over `i in 0..n`, or 0 for `n == 0`.
    ///
    /// NaN propagates: if any value is NaN the result is NaN, so callers can
    /// detect divergence from the aggregate alone.
    pub fn max<F>(self, n: usize, f: F) -> f32
    where
        F: Fn(usize) -> f32 + Sync + Send,
    {
        match self {
            Self::Serial => (0..n).map(f).fold(0.0, nan_max),
            Self::Parallel => (0..n)
                .into_par_iter()
                .with_min_len(MIN_CHUNK)
                .map(f)
                .reduce(|| 0.0, nan_max),
        }
    }

    /// Fill per-particle slots of a flat buffer.
    ///
    /// `slots` holds `width` entries per particle and `heads` one entry per
    /// particle; `f(i, slot, head)` owns particle `i`'s slot and head
    /// exclusively, so no synchronization is needed.
    pub fn for_each_slot<T, H, F>(self, slots: &mut [T], width: usize, heads: &mut [H], f: F)
    where
        T: Send,
        H: Send,
        F: Fn(usize, &mut [T], &mut H) + Sync + Send,
    {
        debug_assert!(width > 0, "slot width must be positive");
        debug_assert_eq!(slots.len(), width * heads.len());
        match self {
            Self::Serial => slots
                .chunks_mut(width)
                .zip(heads.iter_mut())
                .enumerate()
                .for_each(|(i, (slot, head))| f(i, slot, head)),
            Self::Parallel => slots
                .par_chunks_mut(width)
                .zip(heads.par_iter_mut())
                .enumerate()
                .with_min_len(MIN_CHUNK / 4)
                .for_each(|(i, (slot, head))| f(i, slot, head)),
        }
    }
}

#[inline]
fn nan_max(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else {
        a.max(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_preserves_order() {
        for dispatch in [Dispatch::Serial, Dispatch::Parallel] {
            let v = dispatch.map(1000, |i| i * 2);
            assert_eq!(v.len(), 1000);
            assert!(v.iter().enumerate().all(|(i, &x)| x == i * 2));
        }
    }

    #[test]
    fn max_matches_between_strategies() {
        let f = |i: usize| ((i * 37) % 101) as f32 * 0.5;
        let serial = Dispatch::Serial.max(5000, f);
        let parallel = Dispatch::Parallel.max(5000, f);
        assert_eq!(serial, 50.0);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn max_of_nothing_is_zero() {
        assert_eq!(Dispatch::Parallel.max(0, |_| 1.0), 0.0);
    }

    #[test]
    fn max_propagates_nan() {
        for dispatch in [Dispatch::Serial, Dispatch::Parallel] {
            let m = dispatch.max(2000, |i| if i == 1234 { f32::NAN } else { 1.0 });
            assert!(m.is_nan(), "{dispatch:?} should propagate NaN, got {m}");
        }
    }

    #[test]
    fn for_each_slot_owns_disjoint_slots() {
        for dispatch in [Dispatch::Serial, Dispatch::Parallel] {
            let width = 3;
            let n = 700;
            let mut slots = vec![0usize; n * width];
            let mut heads = vec![0usize; n];
            dispatch.for_each_slot(&mut slots, width, &mut heads, |i, slot, head| {
                for (k, s) in slot.iter_mut().enumerate() {
                    *s = i * 10 + k;
                }
                *head = i;
            });
            for i in 0..n {
                assert_eq!(heads[i], i);
                assert_eq!(&slots[i * width..(i + 1) * width], &[i * 10, i * 10 + 1, i * 10 + 2]);
            }
        }
    }

    #[test]
    fn from_flag() {
        assert_eq!(Dispatch::from_flag(true), Dispatch::Parallel);
        assert_eq!(Dispatch::from_flag(false), Dispatch::Serial);
        assert_eq!(Dispatch::default(), Dispatch::Parallel);
    }
}
