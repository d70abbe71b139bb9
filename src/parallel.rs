//! Execution-mode switch for the data-parallel passes.
//!
//! Every stage that can run data-parallel (histogram, prefix sums, palette
//! table fill, per-row dithering) is written against these two helpers, so
//! the algorithm code never mentions rayon directly. With the `threads`
//! feature disabled, `Threaded` quietly degrades to sequential.

#[cfg(feature = "threads")]
use rayon::prelude::*;

/// How the quantizer distributes independent lines of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// Run everything on the calling thread.
    #[default]
    Sequential,
    /// Spread work across the rayon pool (requires the `threads` feature).
    Threaded,
}

impl Execution {
    /// Split `data` into chunks of `width` and hand each to `body` along
    /// with its chunk index. Chunks are disjoint, so the threaded path needs
    /// no synchronization.
    pub(crate) fn run_chunks_mut<T, F>(self, data: &mut [T], width: usize, body: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        match self {
            #[cfg(feature = "threads")]
            Execution::Threaded => {
                data.par_chunks_mut(width)
                    .enumerate()
                    .for_each(|(i, chunk)| body(i, chunk));
            }
            _ => {
                for (i, chunk) in data.chunks_mut(width).enumerate() {
                    body(i, chunk);
                }
            }
        }
    }

    /// Map each line index through `body` and collect the results in line
    /// order, regardless of completion order.
    pub(crate) fn run_lines<R, F>(self, lines: usize, body: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize) -> R + Send + Sync,
    {
        match self {
            #[cfg(feature = "threads")]
            Execution::Threaded => (0..lines).into_par_iter().map(body).collect(),
            _ => (0..lines).map(body).collect(),
        }
    }
}
