//! 3D integral image over the histogram cube.
//!
//! [`integrate`] converts raw cell counts into cumulative sums in place via
//! three axis passes; afterwards any axis-aligned box total is eight corner
//! lookups. The passes must run in order, each parallel only across its own
//! perpendicular lines.

use crate::histogram::{CUBE_CELLS, CUBE_SIDE};
use crate::parallel::Execution;

/// Cells per b-plane.
const PLANE: usize = CUBE_SIDE * CUBE_SIDE;

/// Convert `cube` from histogram counts to cumulative sums, in place.
///
/// After this, cell (r,g,b) holds the weighted count of all cells with
/// coordinates `<= (r,g,b)` component-wise.
pub(crate) fn integrate(cube: &mut [u32], exec: Execution) {
    debug_assert_eq!(cube.len(), CUBE_CELLS);

    // R pass: each contiguous 32-cell line sums along r.
    exec.run_chunks_mut(cube, CUBE_SIDE, |_, line| {
        for i in 1..line.len() {
            line[i] += line[i - 1];
        }
    });

    // G pass: within each b-plane, rows accumulate downward in g.
    exec.run_chunks_mut(cube, PLANE, |_, plane| {
        for g in 1..CUBE_SIDE {
            for r in 0..CUBE_SIDE {
                plane[g * CUBE_SIDE + r] += plane[(g - 1) * CUBE_SIDE + r];
            }
        }
    });

    // B pass: gather each of the 1024 (g,r) columns into its running sum,
    // then scatter the finished columns back plane by plane.
    let columns: Vec<[u32; CUBE_SIDE]> = {
        let cells: &[u32] = cube;
        exec.run_lines(PLANE, |line| {
            let mut column = [0u32; CUBE_SIDE];
            let mut acc = 0u32;
            for (b, slot) in column.iter_mut().enumerate() {
                acc += cells[b * PLANE + line];
                *slot = acc;
            }
            column
        })
    };
    exec.run_chunks_mut(cube, PLANE, |b, plane| {
        for (line, column) in columns.iter().enumerate() {
            plane[line] = column[b];
        }
    });
}

/// Read-only view of an integrated cube with O(1) box-sum queries.
#[derive(Clone, Copy)]
pub(crate) struct PrefixCube<'a> {
    cells: &'a [u32],
}

impl<'a> PrefixCube<'a> {
    pub(crate) fn new(cells: &'a [u32]) -> Self {
        debug_assert_eq!(cells.len(), CUBE_CELLS);
        Self { cells }
    }

    #[inline]
    fn corner(&self, r: i32, g: i32, b: i32) -> i64 {
        // A -1 coordinate means the box extends below the cube: empty.
        if r < 0 || g < 0 || b < 0 {
            return 0;
        }
        self.cells[((b as usize) << 10) | ((g as usize) << 5) | r as usize] as i64
    }

    /// Weighted count inside the inclusive box `lo..=hi`.
    pub(crate) fn box_sum(&self, lo: [i32; 3], hi: [i32; 3]) -> u64 {
        let mut total = 0i64;
        for mask in 0..8u32 {
            let pick = |axis: usize| {
                if mask & (1 << axis) != 0 {
                    lo[axis] - 1
                } else {
                    hi[axis]
                }
            };
            let term = self.corner(pick(0), pick(1), pick(2));
            if mask.count_ones() % 2 == 0 {
                total += term;
            } else {
                total -= term;
            }
        }
        total as u64
    }

    /// Box sum with the given axis range shrunk to `lo[axis]..=v`.
    pub(crate) fn below_sum(&self, axis: usize, v: i32, lo: [i32; 3], hi: [i32; 3]) -> u64 {
        let mut hi = hi;
        hi[axis] = v;
        self.box_sum(lo, hi)
    }

    /// Box sum of the single slice `axis == v` within `lo..=hi`.
    pub(crate) fn slice_sum(&self, axis: usize, v: i32, lo: [i32; 3], hi: [i32; 3]) -> u64 {
        let mut lo = lo;
        let mut hi = hi;
        lo[axis] = v;
        hi[axis] = v;
        self.box_sum(lo, hi)
    }
}
