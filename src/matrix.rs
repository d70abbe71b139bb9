//! Ordered-dither threshold matrices.
//!
//! Both matrices are process-wide constants tiled by modulo: the classic 8×8
//! Bayer index matrix, and a 64×64 blue-noise rank matrix generated once on
//! first use. Thresholds are normalized to [0, 1) with mean exactly ½, so a
//! dithered region averages back to its input level.

use std::sync::OnceLock;

/// Classic recursive Bayer index matrix; every value 0..64 appears once.
const BAYER_8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

pub(crate) const BLUE_SIDE: usize = 64;
const BLUE_CELLS: usize = BLUE_SIDE * BLUE_SIDE;

static BLUE_NOISE: OnceLock<Vec<u16>> = OnceLock::new();

/// Bayer threshold for a pixel position, in [0, 1).
#[inline]
pub fn bayer(x: usize, y: usize) -> f32 {
    (BAYER_8[y % 8][x % 8] as f32 + 0.5) / 64.0
}

/// Blue-noise threshold for a pixel position, in [0, 1).
#[inline]
pub fn blue_noise(x: usize, y: usize) -> f32 {
    let ranks = BLUE_NOISE.get_or_init(generate_blue_noise);
    let rank = ranks[(y % BLUE_SIDE) * BLUE_SIDE + (x % BLUE_SIDE)];
    (rank as f32 + 0.5) / BLUE_CELLS as f32
}

/// Build a 64×64 blue-noise rank matrix by greedy void filling.
///
/// Each step places the next rank at the lowest-energy free cell (the center
/// of the largest void) and splats a toroidal Gaussian around it. The result
/// is a permutation of 0..4096 whose low ranks are evenly spread, which is
/// the property ordered dithering needs. A small multiplicative-hash jitter
/// seeds the energy field so the first placements do not form a lattice; the
/// whole construction is deterministic.
pub(crate) fn generate_blue_noise() -> Vec<u16> {
    let side = BLUE_SIDE;
    // Toroidal Gaussian kernel, indexed by wrapped offset. Sigma 1.9 per
    // Ulichney's void-and-cluster recommendation.
    let sigma_sq2 = 2.0 * 1.9f32 * 1.9f32;
    let mut kernel = vec![0.0f32; BLUE_CELLS];
    for dy in 0..side {
        for dx in 0..side {
            let wy = dy.min(side - dy) as f32;
            let wx = dx.min(side - dx) as f32;
            kernel[dy * side + dx] = (-(wx * wx + wy * wy) / sigma_sq2).exp();
        }
    }

    let mut energy: Vec<f32> = (0..BLUE_CELLS)
        .map(|i| ((i as u32).wrapping_mul(2654435761) >> 16) as f32 * 1e-7)
        .collect();
    let mut placed = vec![false; BLUE_CELLS];
    let mut ranks = vec![0u16; BLUE_CELLS];

    for rank in 0..BLUE_CELLS {
        let mut best = 0;
        let mut best_energy = f32::INFINITY;
        for (i, &e) in energy.iter().enumerate() {
            if !placed[i] && e < best_energy {
                best_energy = e;
                best = i;
            }
        }
        placed[best] = true;
        ranks[best] = rank as u16;

        let by = best / side;
        let bx = best % side;
        for y in 0..side {
            let dy = (y + side - by) % side;
            let kernel_row = dy * side;
            let energy_row = y * side;
            for x in 0..side {
                let dx = (x + side - bx) % side;
                energy[energy_row + x] += kernel[kernel_row + dx];
            }
        }
    }

    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bayer_is_a_permutation() {
        let mut seen = [false; 64];
        for row in &BAYER_8 {
            for &v in row {
                assert!(!seen[v as usize], "duplicate bayer entry {v}");
                seen[v as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn bayer_thresholds_centered() {
        let mut sum = 0.0f64;
        for y in 0..8 {
            for x in 0..8 {
                let t = bayer(x, y);
                assert!((0.0..1.0).contains(&t));
                sum += t as f64;
            }
        }
        assert!((sum / 64.0 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn bayer_tiles() {
        assert_eq!(bayer(3, 5), bayer(3 + 8, 5 + 16));
    }

    #[test]
    fn blue_noise_is_a_permutation() {
        let ranks = generate_blue_noise();
        let mut seen = vec![false; BLUE_CELLS];
        for &r in &ranks {
            assert!(!seen[r as usize], "duplicate rank {r}");
            seen[r as usize] = true;
        }
    }

    #[test]
    fn blue_noise_deterministic() {
        assert_eq!(generate_blue_noise(), generate_blue_noise());
    }

    #[test]
    fn blue_noise_low_ranks_spread_out() {
        // The 64 earliest ranks come from void centers; none of them should
        // touch, even diagonally, on the torus.
        let ranks = generate_blue_noise();
        let side = BLUE_SIDE as i32;
        let low: Vec<(i32, i32)> = (0..BLUE_CELLS)
            .filter(|&i| ranks[i] < 64)
            .map(|i| ((i / BLUE_SIDE) as i32, (i % BLUE_SIDE) as i32))
            .collect();
        assert_eq!(low.len(), 64);
        for (i, &(y1, x1)) in low.iter().enumerate() {
            for &(y2, x2) in &low[i + 1..] {
                let dy = (y1 - y2).rem_euclid(side).min((y2 - y1).rem_euclid(side));
                let dx = (x1 - x2).rem_euclid(side).min((x2 - x1).rem_euclid(side));
                assert!(dy.max(dx) > 1, "adjacent low ranks at ({y1},{x1}) / ({y2},{x2})");
            }
        }
    }

    #[test]
    fn thresholds_in_unit_interval() {
        for y in 0..BLUE_SIDE {
            for x in 0..BLUE_SIDE {
                let t = blue_noise(x, y);
                assert!((0.0..1.0).contains(&t));
            }
        }
    }
}
