//! Minimal synthesized EXIF payload.
//!
//! One big-endian TIFF structure with a single chain: IFD0 holds only the
//! Exif-sub-IFD pointer, and the sub-IFD holds only a LensModel string. The
//! lens field is reused on purpose as a free-text channel describing the
//! quantization parameters; nothing here is real lens data.

const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_LENS_MODEL: u16 = 0xA434;
const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;

/// Byte offset of IFD0, directly after the TIFF header.
const IFD0_OFFSET: u32 = 8;
/// Byte offset of the Exif sub-IFD: IFD0 is 2 + 12 + 4 bytes.
const SUB_IFD_OFFSET: u32 = 26;
/// Byte offset of an out-of-line string: the sub-IFD ends here.
const STRING_OFFSET: u32 = 44;

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Serialize the TIFF block carrying `tag` as a null-terminated ASCII string.
///
/// Strings of at most three bytes fit the entry's inline value field; longer
/// ones are stored out-of-line at [`STRING_OFFSET`].
pub fn build_exif(tag: &str) -> Vec<u8> {
    let ascii_len = (tag.len() + 1) as u32;
    let mut out = Vec::with_capacity(STRING_OFFSET as usize + tag.len() + 1);

    out.extend_from_slice(b"MM");
    push_u16(&mut out, 0x002A);
    push_u32(&mut out, IFD0_OFFSET);

    // IFD0: entry count, the sub-IFD pointer entry, next-IFD terminator.
    push_u16(&mut out, 1);
    push_u16(&mut out, TAG_EXIF_IFD);
    push_u16(&mut out, TYPE_LONG);
    push_u32(&mut out, 1);
    push_u32(&mut out, SUB_IFD_OFFSET);
    push_u32(&mut out, 0);

    // Exif sub-IFD: the LensModel string entry.
    push_u16(&mut out, 1);
    push_u16(&mut out, TAG_LENS_MODEL);
    push_u16(&mut out, TYPE_ASCII);
    push_u32(&mut out, ascii_len);
    if ascii_len <= 4 {
        let mut inline = [0u8; 4];
        inline[..tag.len()].copy_from_slice(tag.as_bytes());
        out.extend_from_slice(&inline);
        push_u32(&mut out, 0);
    } else {
        push_u32(&mut out, STRING_OFFSET);
        push_u32(&mut out, 0);
        out.extend_from_slice(tag.as_bytes());
        out.push(0);
    }
    out
}
