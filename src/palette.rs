//! Palette extraction and the per-cell candidate table.
//!
//! The palette is one representative color per final median-cut box. The LUT
//! then ranks, for every one of the 32³ cells, the nearest palette entries in
//! linear light, so the per-pixel remap is a table walk instead of a palette
//! scan.

use crate::histogram::{cell_center, CUBE_SIDE};
use crate::linear::{LinearRgb, SrgbLut};
use crate::median_cut::ColorBox;
use crate::parallel::Execution;
use crate::prefix::PrefixCube;

/// Ranked palette entries kept per LUT cell.
pub(crate) const LUT_CANDIDATES: usize = 8;

/// One ranked palette entry in a LUT cell.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    /// Palette color in linear light; negative first channel marks a sentinel.
    pub lin: LinearRgb,
    /// Squared linear-light distance from the cell's color.
    pub dist: f32,
    /// Palette color as stored in the image.
    pub srgb: rgb::RGB<u8>,
}

impl Candidate {
    pub(crate) const SENTINEL: Candidate = Candidate {
        lin: LinearRgb::new(-1.0, 0.0, 0.0),
        dist: f32::INFINITY,
        srgb: rgb::RGB { r: 0, g: 0, b: 0 },
    };

    #[inline]
    pub(crate) fn is_sentinel(&self) -> bool {
        self.lin.r < 0.0
    }
}

/// Scale a (possibly fractional) cell coordinate back to an 8-bit channel.
fn coord_to_byte(coord: f64) -> u8 {
    (coord * 255.0 / 31.0).round().clamp(0.0, 255.0) as u8
}

/// Representative color for one box: the weighted centroid of its cells, or
/// the geometric midpoint when the box holds no pixels.
fn box_color(b: &ColorBox, prefix: &PrefixCube) -> rgb::RGB<u8> {
    if b.count == 0 {
        let mid = |axis: usize| coord_to_byte((b.lo[axis] + b.hi[axis]) as f64 / 2.0);
        return rgb::RGB { r: mid(0), g: mid(1), b: mid(2) };
    }

    // Per-axis moment via one slice query per coordinate value.
    let mut moments = [0u64; 3];
    for (axis, moment) in moments.iter_mut().enumerate() {
        for v in b.lo[axis]..=b.hi[axis] {
            *moment += v as u64 * prefix.slice_sum(axis, v, b.lo, b.hi);
        }
    }
    let mean = |axis: usize| coord_to_byte(moments[axis] as f64 / b.count as f64);
    rgb::RGB { r: mean(0), g: mean(1), b: mean(2) }
}

/// Palette colors for the final boxes, in box order.
pub(crate) fn palette_colors(
    boxes: &[ColorBox],
    prefix: PrefixCube<'_>,
    exec: Execution,
) -> Vec<rgb::RGB<u8>> {
    exec.run_lines(boxes.len(), |i| box_color(&boxes[i], &prefix))
}

/// Fill `lut` (length 32³ × [`LUT_CANDIDATES`]) with each cell's nearest
/// palette entries, ascending by squared linear distance, sentinel-padded
/// when the palette is smaller than the candidate count.
pub(crate) fn build_lut(
    lut: &mut [Candidate],
    palette: &[rgb::RGB<u8>],
    srgb: &SrgbLut,
    exec: Execution,
) {
    let linear: Vec<LinearRgb> = palette.iter().map(|&p| srgb.linear_rgb(p)).collect();

    // One chunk per 32-cell r-line keeps chunks contiguous in the flat table.
    let line_width = CUBE_SIDE * LUT_CANDIDATES;
    exec.run_chunks_mut(lut, line_width, |line, cells| {
        for (k, slots) in cells.chunks_mut(LUT_CANDIDATES).enumerate() {
            let cell = line * CUBE_SIDE + k;
            let r = cell & 31;
            let g = (cell >> 5) & 31;
            let b = cell >> 10;
            let cell_lin = LinearRgb::new(
                srgb.linear_u8(cell_center(r)),
                srgb.linear_u8(cell_center(g)),
                srgb.linear_u8(cell_center(b)),
            );

            let mut best = [Candidate::SENTINEL; LUT_CANDIDATES];
            let mut filled = 0usize;
            for (entry, lin) in palette.iter().zip(&linear) {
                let dist = cell_lin.distance_sq(*lin);
                let at = if filled < LUT_CANDIDATES {
                    filled += 1;
                    filled - 1
                } else if dist < best[LUT_CANDIDATES - 1].dist {
                    LUT_CANDIDATES - 1
                } else {
                    continue;
                };
                best[at] = Candidate { lin: *lin, dist, srgb: *entry };
                let mut j = at;
                while j > 0 && best[j].dist < best[j - 1].dist {
                    best.swap(j, j - 1);
                    j -= 1;
                }
            }
            slots.copy_from_slice(&best);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::{cell_index, CUBE_CELLS};
    use crate::prefix::integrate;

    fn prefix_from(raw: &[u32]) -> Vec<u32> {
        let mut cube = raw.to_vec();
        integrate(&mut cube, Execution::Sequential);
        cube
    }

    #[test]
    fn single_cell_box_yields_its_color() {
        let mut raw = vec![0u32; CUBE_CELLS];
        raw[cell_index(255, 0, 0)] = 4;
        let cube = prefix_from(&raw);
        let boxes = [ColorBox { lo: [31, 0, 0], hi: [31, 0, 0], count: 4 }];
        let colors = palette_colors(&boxes, PrefixCube::new(&cube), Execution::Sequential);
        assert_eq!(colors, vec![rgb::RGB { r: 255, g: 0, b: 0 }]);
    }

    #[test]
    fn empty_box_falls_back_to_midpoint() {
        let raw = vec![0u32; CUBE_CELLS];
        let cube = prefix_from(&raw);
        let boxes = [ColorBox { lo: [0, 0, 0], hi: [31, 31, 31], count: 0 }];
        let colors = palette_colors(&boxes, PrefixCube::new(&cube), Execution::Sequential);
        assert_eq!(colors, vec![rgb::RGB { r: 128, g: 128, b: 128 }]);
    }

    #[test]
    fn centroid_weights_by_count() {
        // g=10 with weight 1, g=20 with weight 3: mean coordinate 17.5.
        let mut raw = vec![0u32; CUBE_CELLS];
        raw[10 << 5] = 1;
        raw[20 << 5] = 3;
        let cube = prefix_from(&raw);
        let boxes = [ColorBox { lo: [0, 10, 0], hi: [0, 20, 0], count: 4 }];
        let colors = palette_colors(&boxes, PrefixCube::new(&cube), Execution::Sequential);
        assert_eq!(colors, vec![rgb::RGB { r: 0, g: 144, b: 0 }]);
    }

    #[test]
    fn lut_ranks_black_and_white() {
        let palette = [rgb::RGB { r: 0, g: 0, b: 0 }, rgb::RGB { r: 255, g: 255, b: 255 }];
        let srgb = SrgbLut::new();
        let mut lut = vec![Candidate::SENTINEL; CUBE_CELLS * LUT_CANDIDATES];
        build_lut(&mut lut, &palette, &srgb, Execution::Sequential);

        let black_cell = &lut[..LUT_CANDIDATES];
        assert_eq!(black_cell[0].srgb, palette[0]);
        assert_eq!(black_cell[0].dist, 0.0);
        assert_eq!(black_cell[1].srgb, palette[1]);
        assert!(black_cell[2..].iter().all(Candidate::is_sentinel));

        let white_cell = &lut[(CUBE_CELLS - 1) * LUT_CANDIDATES..];
        assert_eq!(white_cell[0].srgb, palette[1]);
        assert_eq!(white_cell[0].dist, 0.0);
        assert_eq!(white_cell[1].srgb, palette[0]);
    }

    #[test]
    fn lut_matches_brute_force_ranking() {
        let mut state = 0xdead_beefu32;
        let palette: Vec<rgb::RGB<u8>> = (0..32)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                rgb::RGB {
                    r: (state >> 24) as u8,
                    g: (state >> 16) as u8,
                    b: (state >> 8) as u8,
                }
            })
            .collect();
        let srgb = SrgbLut::new();
        let mut lut = vec![Candidate::SENTINEL; CUBE_CELLS * LUT_CANDIDATES];
        build_lut(&mut lut, &palette, &srgb, Execution::Sequential);

        for cell in [0usize, 777, 12345, CUBE_CELLS - 1] {
            let r = cell_center(cell & 31);
            let g = cell_center((cell >> 5) & 31);
            let b = cell_center(cell >> 10);
            let cell_lin = srgb.linear_rgb(rgb::RGB { r, g, b });

            let mut dists: Vec<f32> = palette
                .iter()
                .map(|&p| cell_lin.distance_sq(srgb.linear_rgb(p)))
                .collect();
            dists.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());

            let slots = &lut[cell * LUT_CANDIDATES..(cell + 1) * LUT_CANDIDATES];
            for (slot, want) in slots.iter().zip(&dists) {
                assert_eq!(slot.dist, *want, "cell {cell}");
            }
            for pair in slots.windows(2) {
                assert!(pair[0].dist <= pair[1].dist);
            }
        }
    }
}
