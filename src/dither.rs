//! Ordered-dither quantization, uniform and palette-driven.
//!
//! Uniform mode quantizes each channel to a power-of-two level grid; adaptive
//! mode resolves pixels through the candidate LUT. Both consult the same
//! threshold matrices, so output depends only on pixel value and position;
//! repeated frames dither identically with no temporal flicker.

use crate::histogram::cell_index;
use crate::linear::{LinearRgb, SrgbLut};
use crate::matrix;
use crate::palette::{Candidate, LUT_CANDIDATES};
use crate::parallel::Execution;

/// Threshold matrix selection; `None` disables dithering entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitherMode {
    /// Nearest level or palette color only.
    None,
    /// Classic 8×8 Bayer matrix.
    #[default]
    Bayer,
    /// 64×64 blue-noise matrix; same mean, less visible structure.
    BlueNoise,
}

impl DitherMode {
    #[inline]
    fn threshold(self, x: usize, y: usize) -> f32 {
        match self {
            DitherMode::None => 0.5,
            DitherMode::Bayer => matrix::bayer(x, y),
            DitherMode::BlueNoise => matrix::blue_noise(x, y),
        }
    }
}

/// Quality/speed trade-off for the dither decision itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitherQuality {
    /// Linear-light comparisons; all candidates weighted in adaptive mode.
    #[default]
    Full,
    /// sRGB-space thresholding and two-candidate adaptive dithering.
    Fast,
}

/// Singularity guard for inverse-square candidate weights.
const WEIGHT_EPSILON: f32 = 0.01;

/// Per-channel quantization table indexed by input byte: the two bracketing
/// output levels plus the input's position between them, in sRGB and in
/// linear light.
pub(crate) struct ChannelTable {
    lower: [u8; 256],
    upper: [u8; 256],
    frac: [f32; 256],
    lin_frac: [f32; 256],
}

fn level_byte(level: u32, max: u32) -> u8 {
    (level as f32 * 255.0 / max as f32).round() as u8
}

impl ChannelTable {
    fn new(bits: u32, srgb: &SrgbLut) -> Self {
        let max = (1u32 << bits) - 1;
        let mut table = ChannelTable {
            lower: [0; 256],
            upper: [0; 256],
            frac: [0.0; 256],
            lin_frac: [0.0; 256],
        };
        for c in 0..256usize {
            let exact = c as f32 * max as f32 / 255.0;
            let lo = (exact.floor() as u32).min(max);
            let hi = (lo + 1).min(max);
            let lower = level_byte(lo, max);
            let upper = level_byte(hi, max);
            table.lower[c] = lower;
            table.upper[c] = upper;
            if hi > lo {
                table.frac[c] = exact - lo as f32;
                let base = srgb.linear_u8(lower);
                let span = srgb.linear_u8(upper) - base;
                if span > 0.0 {
                    table.lin_frac[c] = (srgb.linear_u8(c as u8) - base) / span;
                }
            }
        }
        table
    }

    /// Nearest output level, `floor(c/255 * max + 0.5)` scaled back to a byte.
    #[inline]
    fn nearest(&self, c: u8) -> u8 {
        if self.frac[c as usize] >= 0.5 {
            self.upper[c as usize]
        } else {
            self.lower[c as usize]
        }
    }

    /// Threshold the sRGB-space fraction: the dithered generalization of
    /// `floor(c/255 * max + strength * t)`.
    #[inline]
    fn dither_fast(&self, c: u8, t: f32, strength: f32) -> u8 {
        if self.frac[c as usize] + strength * t >= 1.0 {
            self.upper[c as usize]
        } else {
            self.lower[c as usize]
        }
    }

    /// Compare the threshold against the linear-light fraction instead; the
    /// threshold is damped toward ½ so strength scales the dither amplitude
    /// without shifting the mean.
    #[inline]
    fn dither_linear(&self, c: u8, t: f32, strength: f32) -> u8 {
        let damped = 0.5 + strength * (t - 0.5);
        if damped < self.lin_frac[c as usize] {
            self.upper[c as usize]
        } else {
            self.lower[c as usize]
        }
    }
}

/// The three channel tables for one bit allocation, rebuilt per frame.
pub(crate) struct UniformTables {
    ch: [ChannelTable; 3],
}

impl UniformTables {
    pub(crate) fn new(bits: [u32; 3], srgb: &SrgbLut) -> Self {
        UniformTables {
            ch: [
                ChannelTable::new(bits[0], srgb),
                ChannelTable::new(bits[1], srgb),
                ChannelTable::new(bits[2], srgb),
            ],
        }
    }
}

/// Quantize every pixel to the uniform per-channel grid, writing the full
/// output resolution row by row.
pub(crate) fn remap_uniform(
    out: &mut [rgb::RGB<u8>],
    pixels: &[rgb::RGB<u8>],
    width: usize,
    tables: &UniformTables,
    mode: DitherMode,
    quality: DitherQuality,
    strength: f32,
    exec: Execution,
) {
    debug_assert_eq!(out.len(), pixels.len());
    let [rt, gt, bt] = &tables.ch;

    exec.run_chunks_mut(out, width, |y, row| {
        let base = y * width;
        for (x, slot) in row.iter_mut().enumerate() {
            let p = pixels[base + x];
            *slot = match mode {
                DitherMode::None => rgb::RGB {
                    r: rt.nearest(p.r),
                    g: gt.nearest(p.g),
                    b: bt.nearest(p.b),
                },
                _ => {
                    let t = mode.threshold(x, y);
                    match quality {
                        DitherQuality::Fast => rgb::RGB {
                            r: rt.dither_fast(p.r, t, strength),
                            g: gt.dither_fast(p.g, t, strength),
                            b: bt.dither_fast(p.b, t, strength),
                        },
                        DitherQuality::Full => rgb::RGB {
                            r: rt.dither_linear(p.r, t, strength),
                            g: gt.dither_linear(p.g, t, strength),
                            b: bt.dither_linear(p.b, t, strength),
                        },
                    }
                }
            };
        }
    });
}

/// Resolve every pixel through the candidate LUT.
///
/// Candidate weights are recomputed from the pixel's own linear color, not
/// the cell center's, so neighboring pixels in one cell can still rank the
/// candidates differently.
pub(crate) fn remap_adaptive(
    out: &mut [rgb::RGB<u8>],
    pixels: &[rgb::RGB<u8>],
    width: usize,
    lut: &[Candidate],
    mode: DitherMode,
    quality: DitherQuality,
    srgb: &SrgbLut,
    exec: Execution,
) {
    debug_assert_eq!(out.len(), pixels.len());

    exec.run_chunks_mut(out, width, |y, row| {
        let base = y * width;
        for (x, slot) in row.iter_mut().enumerate() {
            let p = pixels[base + x];
            let cell = cell_index(p.r, p.g, p.b);
            let cands = &lut[cell * LUT_CANDIDATES..(cell + 1) * LUT_CANDIDATES];

            *slot = match mode {
                DitherMode::None => cands[0].srgb,
                _ => {
                    let t = mode.threshold(x, y);
                    let lin = srgb.linear_rgb(p);
                    match quality {
                        DitherQuality::Fast => pick_pair(cands, lin, t),
                        DitherQuality::Full => pick_weighted(cands, lin, t),
                    }
                }
            };
        }
    });
}

/// Two-candidate dither: the runner-up wins when the threshold falls below
/// the squared-distance ratio `d1²/(d1²+d2²)`.
#[inline]
fn pick_pair(cands: &[Candidate], lin: LinearRgb, t: f32) -> rgb::RGB<u8> {
    let second = &cands[1];
    if second.is_sentinel() {
        return cands[0].srgb;
    }
    let d1 = lin.distance_sq(cands[0].lin);
    let d2 = lin.distance_sq(second.lin);
    let total = d1 + d2;
    if total <= 0.0 {
        return cands[0].srgb;
    }
    if t < d1 / total {
        second.srgb
    } else {
        cands[0].srgb
    }
}

/// K-candidate dither: inverse-square-distance weights over the non-sentinel
/// candidates form a cumulative distribution, and the threshold picks its
/// bucket.
#[inline]
fn pick_weighted(cands: &[Candidate], lin: LinearRgb, t: f32) -> rgb::RGB<u8> {
    let mut weights = [0.0f32; LUT_CANDIDATES];
    let mut used = 0;
    let mut total = 0.0f32;
    for cand in cands {
        if cand.is_sentinel() {
            break;
        }
        let d = lin.distance_sq(cand.lin).sqrt() + WEIGHT_EPSILON;
        let w = 1.0 / (d * d);
        weights[used] = w;
        total += w;
        used += 1;
    }

    // The scaled threshold lands in exactly one cumulative bucket; the last
    // candidate absorbs any float shortfall.
    let target = t * total;
    let mut acc = 0.0f32;
    for i in 0..used {
        acc += weights[i];
        if target < acc {
            return cands[i].srgb;
        }
    }
    cands[used.saturating_sub(1)].srgb
}
