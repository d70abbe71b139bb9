//! 3D color histogram over the 5-bit quantized sRGB cube.
//!
//! Every pixel lands in one of 32×32×32 cells; cell (r,g,b) lives at flat
//! index `(b << 10) | (g << 5) | r`, so R varies fastest in memory. The same
//! layout is shared by the prefix-sum pass and the palette LUT.

use crate::parallel::Execution;

pub(crate) const CUBE_SIDE: usize = 32;
pub(crate) const CUBE_CELLS: usize = CUBE_SIDE * CUBE_SIDE * CUBE_SIDE;

/// Pixels per accumulation band; bands build partial cubes that are merged
/// sequentially, keeping the counts order-independent.
const BAND_PIXELS: usize = 32 * 1024;

/// 5-bit cell coordinate for an 8-bit channel, rounding to nearest.
#[inline]
pub(crate) fn cell_coord(c: u8) -> usize {
    (c as usize * 31 + 127) / 255
}

/// Flat cube index for a color.
#[inline]
pub(crate) fn cell_index(r: u8, g: u8, b: u8) -> usize {
    (cell_coord(b) << 10) | (cell_coord(g) << 5) | cell_coord(r)
}

/// Map a 5-bit cell coordinate back to the 8-bit channel it represents.
#[inline]
pub fn cell_center(coord: usize) -> u8 {
    ((coord * 255 + 15) / 31) as u8
}

/// HSV-saturation histogram weight, `1 + floor(3 * (max-min)/max)`, in 1..=4.
///
/// Saturated colors count up to four times so they keep palette seats even
/// when they cover few pixels.
#[inline]
pub(crate) fn saturation_weight(p: rgb::RGB<u8>) -> u32 {
    let max = p.r.max(p.g).max(p.b) as u32;
    let min = p.r.min(p.g).min(p.b) as u32;
    if max == 0 {
        1
    } else {
        1 + 3 * (max - min) / max
    }
}

/// Accumulate the histogram for `pixels` into `cube` (length [`CUBE_CELLS`]),
/// replacing its previous contents.
///
/// Large inputs are partitioned into bands that accumulate private partial
/// cubes in parallel; the partials are then summed in band order. Counts are
/// additive, so the result is identical to a single sequential pass.
pub(crate) fn build_cube(
    cube: &mut [u32],
    pixels: &[rgb::RGB<u8>],
    saturation_boost: bool,
    exec: Execution,
) {
    debug_assert_eq!(cube.len(), CUBE_CELLS);
    cube.fill(0);

    let bands = pixels.len().div_ceil(BAND_PIXELS).max(1);
    if bands == 1 {
        accumulate(cube, pixels, saturation_boost);
        return;
    }

    let partials = exec.run_lines(bands, |band| {
        let start = band * BAND_PIXELS;
        let end = (start + BAND_PIXELS).min(pixels.len());
        let mut local = vec![0u32; CUBE_CELLS];
        accumulate(&mut local, &pixels[start..end], saturation_boost);
        local
    });
    for partial in partials {
        for (cell, add) in cube.iter_mut().zip(partial) {
            *cell += add;
        }
    }
}

fn accumulate(cube: &mut [u32], pixels: &[rgb::RGB<u8>], saturation_boost: bool) {
    if saturation_boost {
        for p in pixels {
            cube[cell_index(p.r, p.g, p.b)] += saturation_weight(*p);
        }
    } else {
        for p in pixels {
            cube[cell_index(p.r, p.g, p.b)] += 1;
        }
    }
}

/// Box-filter `pixels` down 2× per axis into `out`, returning the reduced
/// dimensions. Odd edges average whatever partial block remains.
///
/// This is the optional histogram pre-pass; dithering always runs at full
/// resolution.
pub(crate) fn downsample(
    pixels: &[rgb::RGB<u8>],
    width: usize,
    height: usize,
    out: &mut Vec<rgb::RGB<u8>>,
    exec: Execution,
) -> (usize, usize) {
    let half_w = width.div_ceil(2);
    let half_h = height.div_ceil(2);
    out.clear();
    out.resize(half_w * half_h, rgb::RGB { r: 0, g: 0, b: 0 });

    exec.run_chunks_mut(out, half_w, |oy, row| {
        let y0 = oy * 2;
        let y1 = (y0 + 2).min(height);
        for (ox, slot) in row.iter_mut().enumerate() {
            let x0 = ox * 2;
            let x1 = (x0 + 2).min(width);
            let mut sum = [0u32; 3];
            let mut n = 0u32;
            for y in y0..y1 {
                for p in &pixels[y * width + x0..y * width + x1] {
                    sum[0] += p.r as u32;
                    sum[1] += p.g as u32;
                    sum[2] += p.b as u32;
                    n += 1;
                }
            }
            *slot = rgb::RGB {
                r: ((sum[0] + n / 2) / n) as u8,
                g: ((sum[1] + n / 2) / n) as u8,
                b: ((sum[2] + n / 2) / n) as u8,
            };
        }
    });

    (half_w, half_h)
}
