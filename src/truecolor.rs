//! Truecolor delegate for depths above 8 bits per pixel.
//!
//! Pixel encoding is handed to the `png` crate; only the eXIf chunk is ours,
//! spliced in directly after IHDR so both container variants carry the same
//! metadata block.

use crate::encode::chunk_bytes;
use crate::error::EncodeError;
use crate::exif::build_exif;

/// Signature plus the complete IHDR chunk: 8 + (4 + 4 + 13 + 4) bytes.
const AFTER_IHDR: usize = 33;

/// Serialize the quantized grid as an 8-bit-per-channel RGB PNG carrying
/// `tag` in an eXIf chunk.
pub(crate) fn encode_truecolor(
    grid: &[rgb::RGB<u8>],
    width: usize,
    height: usize,
    tag: &str,
) -> Result<Vec<u8>, EncodeError> {
    let flat: Vec<u8> = grid.iter().flat_map(|p| [p.r, p.g, p.b]).collect();

    let mut plain = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut plain, width as u32, height as u32);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&flat)?;
        writer.finish()?;
    }

    let exif = chunk_bytes(b"eXIf", &build_exif(tag));
    let mut out = Vec::with_capacity(plain.len() + exif.len());
    out.extend_from_slice(&plain[..AFTER_IHDR]);
    out.extend_from_slice(&exif);
    out.extend_from_slice(&plain[AFTER_IHDR..]);
    Ok(out)
}
