use std::io::Cursor;

use zendither::_internals::srgb_to_linear;
use zendither::{BitDepth, DitherMode, DitherQuality, EncodeConfig, PaletteMode};

/// Mean squared error between two frames in linear light, summed over the
/// three channels.
fn compute_mse(a: &[rgb::RGB<u8>], b: &[rgb::RGB<u8>]) -> f32 {
    assert_eq!(a.len(), b.len());
    let lin = |c: u8| srgb_to_linear(c as f32 / 255.0);
    let mut total = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        let dr = lin(x.r) - lin(y.r);
        let dg = lin(x.g) - lin(y.g);
        let db = lin(x.b) - lin(y.b);
        total += dr * dr + dg * dg + db * db;
    }
    total / a.len() as f32
}

/// Decode through the `png` crate, expanding indexed data back to RGB.
fn decode_rgb(data: &[u8]) -> Vec<rgb::RGB<u8>> {
    let mut decoder = png::Decoder::new(Cursor::new(data));
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder.read_info().expect("readable header");
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).expect("decodable frame");
    buf.truncate(frame.buffer_size());
    assert_eq!(frame.color_type, png::ColorType::Rgb);
    buf.chunks_exact(3)
        .map(|c| rgb::RGB { r: c[0], g: c[1], b: c[2] })
        .collect()
}

fn gradient_image(width: usize, height: usize) -> Vec<rgb::RGB<u8>> {
    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = ((x + y) * 128 / (width + height).max(1)) as u8;
            pixels.push(rgb::RGB { r, g, b });
        }
    }
    pixels
}

/// Two tight hue clusters, shades of orange on the left and teal on the
/// right. A fitted palette should resolve these far better than a grid.
fn two_hue_image(width: usize, height: usize) -> Vec<rgb::RGB<u8>> {
    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let t = (y * 48 / height.max(1)) as u8;
            let s = (x % 7) as u8 * 3;
            if x < width / 2 {
                pixels.push(rgb::RGB { r: 200 + t, g: 90 + t, b: 30 + s });
            } else {
                pixels.push(rgb::RGB { r: 20 + s, g: 130 + t, b: 160 + t });
            }
        }
    }
    pixels
}

#[test]
fn bayer_tiles_track_gradient_average() {
    // Horizontal gray ramp, one byte per column, dithered down to one bit
    // per channel at full strength.
    let width = 256;
    let height = 16;
    let pixels: Vec<rgb::RGB<u8>> = (0..width * height)
        .map(|i| {
            let v = (i % width) as u8;
            rgb::RGB { r: v, g: v, b: v }
        })
        .collect();

    let config = EncodeConfig::new()
        .bit_depth(BitDepth::Bpp3)
        .palette_mode(PaletteMode::Uniform)
        .dither(DitherMode::Bayer)
        .dither_quality(DitherQuality::Fast)
        .dither_strength(1.0);
    let decoded = decode_rgb(&zendither::encode_rgb(&pixels, width, height, &config).unwrap());

    for tile in 0..width / 16 {
        let mut in_sum = 0u32;
        let mut out_sum = 0u32;
        for y in 0..16 {
            for x in tile * 16..(tile + 1) * 16 {
                in_sum += pixels[y * width + x].r as u32;
                out_sum += decoded[y * width + x].r as u32;
            }
        }
        let in_avg = in_sum as f32 / 256.0;
        let out_avg = out_sum as f32 / 256.0;
        assert!(
            (in_avg - out_avg).abs() < 24.0,
            "tile {tile}: input averages {in_avg:.1}, dithered output {out_avg:.1}"
        );
    }
}

#[test]
fn dither_preserves_midgray_average() {
    // A 64x64 patch covers both threshold matrices a whole number of times,
    // so a flat input averages back almost exactly.
    let pixels = vec![rgb::RGB { r: 128, g: 128, b: 128 }; 64 * 64];

    for mode in &[DitherMode::Bayer, DitherMode::BlueNoise] {
        let config = EncodeConfig::new()
            .bit_depth(BitDepth::Bpp3)
            .palette_mode(PaletteMode::Uniform)
            .dither(*mode)
            .dither_quality(DitherQuality::Fast)
            .dither_strength(1.0);
        let decoded = decode_rgb(&zendither::encode_rgb(&pixels, 64, 64, &config).unwrap());

        let sum: u32 = decoded.iter().map(|p| p.r as u32).sum();
        let avg = sum as f32 / (64.0 * 64.0);
        assert!(
            (avg - 128.0).abs() < 2.0,
            "{mode:?}: flat midgray averaged to {avg:.2}"
        );
    }
}

#[test]
fn adaptive_beats_uniform_on_clustered_hues() {
    let pixels = two_hue_image(32, 32);

    let adaptive = EncodeConfig::new()
        .bit_depth(BitDepth::Bpp6)
        .palette_mode(PaletteMode::Adaptive)
        .dither(DitherMode::None);
    let uniform = EncodeConfig::new()
        .bit_depth(BitDepth::Bpp6)
        .palette_mode(PaletteMode::Uniform)
        .dither(DitherMode::None);

    let adaptive_out = decode_rgb(&zendither::encode_rgb(&pixels, 32, 32, &adaptive).unwrap());
    let uniform_out = decode_rgb(&zendither::encode_rgb(&pixels, 32, 32, &uniform).unwrap());

    let adaptive_mse = compute_mse(&pixels, &adaptive_out);
    let uniform_mse = compute_mse(&pixels, &uniform_out);
    eprintln!("clustered hues: adaptive mse {adaptive_mse:.6}, uniform mse {uniform_mse:.6}");
    assert!(
        adaptive_mse < uniform_mse,
        "fitted palette should beat the grid: adaptive={adaptive_mse:.6}, uniform={uniform_mse:.6}"
    );
}

#[test]
fn more_colors_lower_mse() {
    let pixels = gradient_image(32, 32);

    let mut mse = [0.0f32; 2];
    for (slot, depth) in mse.iter_mut().zip([BitDepth::Bpp3, BitDepth::Bpp8]) {
        let config = EncodeConfig::new().bit_depth(depth).dither(DitherMode::None);
        let decoded = decode_rgb(&zendither::encode_rgb(&pixels, 32, 32, &config).unwrap());
        *slot = compute_mse(&pixels, &decoded);
    }

    assert!(
        mse[1] < mse[0],
        "256 colors should have lower MSE than 8: mse_8c={:.6}, mse_256c={:.6}",
        mse[0],
        mse[1]
    );
}

#[test]
fn saturation_boost_rescues_accent_colors() {
    // Thirty columns of gray ramp and two columns of pure red: the red cell
    // holds about six percent of the pixels. Quadrupled by the boost it wins
    // its own median-cut box even at eight colors.
    let width = 32;
    let height = 32;
    let cc = zendither::_internals::cell_center;
    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        let gray = cc(y);
        for x in 0..width {
            if x < 30 {
                pixels.push(rgb::RGB { r: gray, g: gray, b: gray });
            } else {
                pixels.push(rgb::RGB { r: 255, g: 0, b: 0 });
            }
        }
    }
    let red_region: Vec<usize> = (0..height)
        .flat_map(|y| [y * width + 30, y * width + 31])
        .collect();

    let base = EncodeConfig::new()
        .bit_depth(BitDepth::Bpp3)
        .dither(DitherMode::None);
    let plain = decode_rgb(&zendither::encode_rgb(&pixels, width, height, &base).unwrap());
    let boosted_config = base.clone().saturation_boost(true);
    let boosted =
        decode_rgb(&zendither::encode_rgb(&pixels, width, height, &boosted_config).unwrap());

    let red = rgb::RGB { r: 255, g: 0, b: 0 };
    assert!(
        red_region.iter().all(|&i| boosted[i] == red),
        "boosted palette should keep pure red"
    );

    let region = |frame: &[rgb::RGB<u8>]| -> Vec<rgb::RGB<u8>> {
        red_region.iter().map(|&i| frame[i]).collect()
    };
    let want: Vec<rgb::RGB<u8>> = vec![red; red_region.len()];
    let boosted_mse = compute_mse(&want, &region(&boosted));
    let plain_mse = compute_mse(&want, &region(&plain));
    eprintln!("red region: boosted mse {boosted_mse:.6}, plain mse {plain_mse:.6}");
    assert!(
        boosted_mse < plain_mse,
        "boost should cut the accent error: boosted={boosted_mse:.6}, plain={plain_mse:.6}"
    );
}

#[test]
fn dithered_adaptive_error_stays_small() {
    let pixels = gradient_image(32, 32);

    for quality in &[DitherQuality::Full, DitherQuality::Fast] {
        let config = EncodeConfig::new()
            .bit_depth(BitDepth::Bpp8)
            .dither(DitherMode::Bayer)
            .dither_quality(*quality);
        let decoded = decode_rgb(&zendither::encode_rgb(&pixels, 32, 32, &config).unwrap());
        let mse = compute_mse(&pixels, &decoded);
        assert!(
            mse < 0.01,
            "{quality:?}: MSE too high for a 256-color gradient: {mse:.6}"
        );
    }
}
