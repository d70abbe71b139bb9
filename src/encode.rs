//! Indexed PNG container writer.
//!
//! Everything is hand-assembled: chunk framing with CRC32, zlib framing with
//! Adler-32, palette table, scanline packing. Only the DEFLATE body itself is
//! delegated to miniz_oxide. Chunk order is signature, IHDR, PLTE, eXIf,
//! IDAT, IEND; every multi-byte integer is big-endian.

use std::collections::BTreeMap;

use miniz_oxide::deflate::compress_to_vec;

use crate::error::EncodeError;
use crate::exif::build_exif;

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// DEFLATE effort; 6 matches the 0x9C "default compression" zlib header.
const COMPRESSION_LEVEL: u8 = 6;

const CRC_TABLE: [u32; 256] = crc_table();

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// CRC32 (reflected 0xEDB88320, final inversion) over chunk type + data.
pub fn crc32(chunk_type: &[u8], data: &[u8]) -> u32 {
    let mut c = u32::MAX;
    for &b in chunk_type.iter().chain(data) {
        c = CRC_TABLE[((c ^ b as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    c ^ u32::MAX
}

fn adler32(data: &[u8]) -> u32 {
    let mut s1 = 1u32;
    let mut s2 = 0u32;
    for &b in data {
        s1 = (s1 + b as u32) % 65521;
        s2 = (s2 + s1) % 65521;
    }
    (s2 << 16) | s1
}

/// Append one `[length][type][data][crc]` chunk.
pub(crate) fn write_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);
    out.extend_from_slice(&crc32(chunk_type, data).to_be_bytes());
}

/// One chunk as a standalone byte string.
#[cfg(feature = "truecolor")]
pub(crate) fn chunk_bytes(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 12);
    write_chunk(&mut out, chunk_type, data);
    out
}

/// zlib-frame `raw`: `0x78 0x9C` header, DEFLATE body, Adler-32 trailer.
fn zlib_wrap(raw: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let body = compress_to_vec(raw, COMPRESSION_LEVEL);
    if body.is_empty() && !raw.is_empty() {
        return Err(EncodeError::Compression);
    }
    let mut out = Vec::with_capacity(body.len() + 6);
    out.push(0x78);
    out.push(0x9C);
    out.extend_from_slice(&body);
    out.extend_from_slice(&adler32(raw).to_be_bytes());
    Ok(out)
}

/// Palette of the grid's distinct colors in first-seen order, plus one index
/// per pixel. The caller guarantees at most 256 distinct colors.
fn index_grid(grid: &[rgb::RGB<u8>]) -> (Vec<rgb::RGB<u8>>, Vec<u8>) {
    let mut seen: BTreeMap<[u8; 3], u8> = BTreeMap::new();
    let mut palette = Vec::new();
    let mut indices = Vec::with_capacity(grid.len());
    for p in grid {
        let key = [p.r, p.g, p.b];
        let idx = match seen.get(&key) {
            Some(&i) => i,
            None => {
                debug_assert!(palette.len() < 256, "quantized grid exceeds 256 colors");
                let i = palette.len() as u8;
                seen.insert(key, i);
                palette.push(*p);
                i
            }
        };
        indices.push(idx);
    }
    (palette, indices)
}

/// Serialize the quantized grid as an indexed PNG carrying `tag` in its eXIf
/// chunk. Index depth is 4 bits when the palette fits 16 entries, 8 otherwise.
pub(crate) fn encode_indexed(
    grid: &[rgb::RGB<u8>],
    width: usize,
    height: usize,
    tag: &str,
) -> Result<Vec<u8>, EncodeError> {
    let (palette, indices) = index_grid(grid);
    let bit_depth: u8 = if palette.len() <= 16 { 4 } else { 8 };

    // Scanlines: a zero filter byte, then packed indices. 4-bit rows put the
    // first index in the high nibble and left-shift a trailing odd index.
    let stride = if bit_depth == 4 { width.div_ceil(2) } else { width };
    let mut raw = Vec::with_capacity((stride + 1) * height);
    for y in 0..height {
        raw.push(0);
        let row = &indices[y * width..(y + 1) * width];
        if bit_depth == 4 {
            for pair in row.chunks(2) {
                let lo = if pair.len() == 2 { pair[1] } else { 0 };
                raw.push((pair[0] << 4) | lo);
            }
        } else {
            raw.extend_from_slice(row);
        }
    }
    let idat = zlib_wrap(&raw)?;

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(bit_depth);
    ihdr.push(3); // indexed color
    ihdr.push(0);
    ihdr.push(0);
    ihdr.push(0);

    let mut plte = Vec::with_capacity(palette.len() * 3);
    for p in &palette {
        plte.extend_from_slice(&[p.r, p.g, p.b]);
    }

    let mut out = Vec::with_capacity(idat.len() + plte.len() + 160);
    out.extend_from_slice(&SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"PLTE", &plte);
    write_chunk(&mut out, b"eXIf", &build_exif(tag));
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}
