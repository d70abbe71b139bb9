//! Median-cut box splitting over the prefix-summed histogram cube.
//!
//! Boxes split level by level: level L holds 2^L boxes, and every box at a
//! level splits (or clones) before the next level begins. Split positions and
//! child populations come from O(1) prefix-cube queries, never from rescans.

use crate::histogram::CUBE_SIDE;
use crate::parallel::Execution;
use crate::prefix::PrefixCube;

/// Axis-aligned region of histogram cells, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColorBox {
    pub lo: [i32; 3],
    pub hi: [i32; 3],
    pub count: u64,
}

impl ColorBox {
    /// Split axis: the largest coordinate range, preferring G, then R, then B
    /// on ties. Green carries the most luminance, so it splits first.
    fn split_axis(&self) -> usize {
        let range = |axis: usize| self.hi[axis] - self.lo[axis];
        let (r, g, b) = (range(0), range(1), range(2));
        if g >= r && g >= b {
            1
        } else if r >= b {
            0
        } else {
            2
        }
    }

    /// Smallest `v` in `[lo+1, hi]` along `axis` where the cells with
    /// coordinate `<= v` reach half the box population.
    fn median(&self, axis: usize, prefix: &PrefixCube) -> i32 {
        let mut low = self.lo[axis] + 1;
        let mut high = self.hi[axis];
        while low < high {
            let mid = (low + high) / 2;
            if 2 * prefix.below_sum(axis, mid, self.lo, self.hi) >= self.count {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        low
    }

    /// Split at the population median of the widest axis.
    ///
    /// Child counts are exact prefix queries and sum to the parent count. A
    /// box whose widest axis has zero range is a single cell; it is cloned
    /// unchanged to both slots, the one case where children duplicate the
    /// parent population instead of partitioning it.
    fn split(&self, prefix: &PrefixCube) -> (ColorBox, ColorBox) {
        let axis = self.split_axis();
        if self.lo[axis] == self.hi[axis] {
            return (*self, *self);
        }

        let v = self.median(axis, prefix);
        let mut left = *self;
        let mut right = *self;
        left.hi[axis] = v - 1;
        right.lo[axis] = v;
        left.count = prefix.box_sum(left.lo, left.hi);
        right.count = prefix.box_sum(right.lo, right.hi);
        (left, right)
    }
}

/// Bounding box of all non-zero cells in a raw (not yet integrated) cube,
/// carrying the total weighted count. `None` when every cell is zero.
pub(crate) fn occupied_box(cube: &[u32], exec: Execution) -> Option<ColorBox> {
    let partials = exec.run_lines(CUBE_SIDE, |b| {
        let mut lo = [i32::MAX; 3];
        let mut hi = [i32::MIN; 3];
        let mut count = 0u64;
        for g in 0..CUBE_SIDE {
            for r in 0..CUBE_SIDE {
                let c = cube[(b << 10) | (g << 5) | r];
                if c != 0 {
                    count += c as u64;
                    let cell = [r as i32, g as i32, b as i32];
                    for axis in 0..3 {
                        lo[axis] = lo[axis].min(cell[axis]);
                        hi[axis] = hi[axis].max(cell[axis]);
                    }
                }
            }
        }
        (lo, hi, count)
    });

    let mut lo = [i32::MAX; 3];
    let mut hi = [i32::MIN; 3];
    let mut count = 0u64;
    for (plo, phi, pcount) in partials {
        count += pcount;
        for axis in 0..3 {
            lo[axis] = lo[axis].min(plo[axis]);
            hi[axis] = hi[axis].max(phi[axis]);
        }
    }
    (count > 0).then_some(ColorBox { lo, hi, count })
}

/// Split `root` into exactly `colors` boxes, where `colors` is a power of two
/// up to 256. Boxes within a level split independently; levels are strictly
/// ordered because each level reads the finalized counts of the previous one.
pub(crate) fn split_boxes(
    prefix: PrefixCube<'_>,
    root: ColorBox,
    colors: usize,
    exec: Execution,
) -> Vec<ColorBox> {
    debug_assert!(colors.is_power_of_two() && colors <= 256);
    let mut boxes = vec![root];
    while boxes.len() < colors {
        let pairs = exec.run_lines(boxes.len(), |i| boxes[i].split(&prefix));
        boxes = pairs.into_iter().flat_map(|(a, b)| [a, b]).collect();
    }
    boxes
}
