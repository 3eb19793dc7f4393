//! Minimal EXIF orientation reader for JPEG and TIFF bytes.
//!
//! Only one tag matters here: Orientation (`0x0112`) in IFD0.
//!
//! For JPEG: the APP1 segment starting with `Exif\0\0` holds a TIFF structure.
//! For TIFF: the file itself is the structure.
//!
//! Anything unreadable is treated as "no orientation".

/// EXIF Orientation tag number.
const ORIENTATION_TAG: u16 = 0x0112;
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Clockwise rotation that makes a stored image upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    /// Map an EXIF orientation value. Mirrored orientations are left alone.
    pub fn from_orientation(value: u16) -> Self {
        match value {
            3 => Rotation::Rotate180,
            6 => Rotation::Rotate90,
            8 => Rotation::Rotate270,
            _ => Rotation::None,
        }
    }

    /// Rotation needed for the given encoded image.
    pub fn detect(bytes: &[u8]) -> Self {
        read_orientation(bytes)
            .map(Self::from_orientation)
            .unwrap_or(Rotation::None)
    }
}

/// Read the raw orientation value from JPEG or TIFF bytes.
pub fn read_orientation(bytes: &[u8]) -> Option<u16> {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        find_jpeg_exif(bytes).and_then(orientation_from_tiff)
    } else if bytes.starts_with(b"II") || bytes.starts_with(b"MM") {
        orientation_from_tiff(bytes)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// JPEG: locate the Exif APP1 segment
// ---------------------------------------------------------------------------

/// Return the TIFF structure inside a JPEG's `Exif` APP1 segment.
fn find_jpeg_exif(data: &[u8]) -> Option<&[u8]> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // Fill bytes before a marker
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // Markers without a length field
        if marker == 0x01 || marker == 0xD8 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        // End of image, or start of scan: no metadata past this point
        if marker == 0xD9 || marker == 0xDA {
            return None;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if len < 2 {
            return None;
        }
        let seg_start = pos + 4;
        let seg_end = (pos + 2 + len).min(data.len());
        if marker == 0xE1 {
            if let Some(tiff) = data[seg_start..seg_end].strip_prefix(EXIF_HEADER) {
                return Some(tiff);
            }
        }
        pos += 2 + len;
    }
    None
}

// ---------------------------------------------------------------------------
// TIFF: walk IFD0
// ---------------------------------------------------------------------------

struct TiffReader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl TiffReader<'_> {
    fn u16_at(&self, offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = self.data.get(offset..offset + 2)?.try_into().ok()?;
        Some(if self.big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(offset..offset + 4)?.try_into().ok()?;
        Some(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }
}

/// Find the Orientation value in IFD0 of a TIFF structure.
///
/// Each IFD entry is 12 bytes: tag (2), type (2), count (4), value (4).
/// Orientation is a single SHORT, stored in the first two value bytes.
fn orientation_from_tiff(data: &[u8]) -> Option<u16> {
    let big_endian = match data.get(0..2)? {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };
    let reader = TiffReader { data, big_endian };
    if reader.u16_at(2)? != 42 {
        return None;
    }

    let ifd_offset = reader.u32_at(4)? as usize;
    let entry_count = reader.u16_at(ifd_offset)? as usize;
    let entries_start = ifd_offset + 2;

    (0..entry_count)
        .map(|i| entries_start + i * 12)
        .take_while(|entry| entry + 12 <= data.len())
        .find(|&entry| reader.u16_at(entry) == Some(ORIENTATION_TAG))
        .and_then(|entry| {
            // SHORT, count 1
            (reader.u16_at(entry + 2)? == 3).then_some(())?;
            reader.u16_at(entry + 8)
        })
}
