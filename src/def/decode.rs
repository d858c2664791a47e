use super::{DefFrame, Error, Result, FRAME_HEADER_LEN};

/// Decodes the frame whose 32-byte header starts at `offset` in `data`.
pub(super) fn decode_frame_at(data: &[u8], offset: usize) -> Result<DefFrame> {
    let header = data.get(offset..offset + FRAME_HEADER_LEN).ok_or(Error::InvalidDef {
        reason: "frame header out of range",
    })?;

    let size_on_disk = read_u32(header, 0);
    let encoding = read_u32(header, 4);
    let full_width = read_u32(header, 8);
    let full_height = read_u32(header, 12);
    let width = read_u32(header, 16);
    let height = read_u32(header, 20);
    let left = read_u32(header, 24) as i32;
    let top = read_u32(header, 28) as i32;

    if left < 0 || top < 0 || (left as u32) + width > full_width || (top as u32) + height > full_height {
        return Err(Error::InvalidDef {
            reason: "frame origin/extent exceeds its full canvas",
        });
    }

    let body_start = offset + FRAME_HEADER_LEN;
    let body = data.get(body_start..).ok_or(Error::InvalidDef {
        reason: "frame body out of range",
    })?;

    let pixels = match encoding {
        0 => decode_mode0(body, width, height)?,
        1 => decode_mode1(body, width, height)?,
        2 => decode_mode2(body, width, height)?,
        3 => decode_mode3(body, width, height)?,
        _ => {
            return Err(Error::InvalidDef {
                reason: "unrecognized frame encoding mode",
            })
        }
    };

    Ok(DefFrame {
        size_on_disk,
        encoding,
        full_width,
        full_height,
        width,
        height,
        left,
        top,
        pixels,
    })
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(bytes[at..at + 2].try_into().unwrap())
}

fn decode_mode0(body: &[u8], width: u32, height: u32) -> Result<Box<[u8]>> {
    let len = (width as usize) * (height as usize);
    let slice = body.get(..len).ok_or(Error::InvalidPixelStream {
        reason: "mode 0 body shorter than width*height",
    })?;
    Ok(slice.to_vec().into_boxed_slice())
}

/// Decodes one row given its first byte of segment data, filling exactly
/// `width` indices. `next` reads the next segment's (code, length, literal
/// bytes) and advances its own cursor; shared by modes 1/2/3 since they
/// differ only in how the row-offset table and the code/length byte are
/// laid out, not in the segment semantics.
fn decode_row_segments(
    row_data: &[u8],
    width: usize,
    mut next_segment: impl FnMut(&[u8], usize) -> Result<(SegmentKind, usize)>,
) -> Result<Vec<u8>> {
    let mut row = Vec::with_capacity(width);
    let mut pos = 0usize;

    while row.len() < width {
        let (kind, consumed) = next_segment(row_data, pos)?;
        pos += consumed;
        match kind {
            SegmentKind::Raw(bytes) => row.extend_from_slice(bytes),
            SegmentKind::Run { value, length } => row.extend(std::iter::repeat(value).take(length)),
        }
    }

    if row.len() != width {
        return Err(Error::InvalidPixelStream {
            reason: "row segments overran the declared width",
        });
    }
    Ok(row)
}

enum SegmentKind<'a> {
    Raw(&'a [u8]),
    Run { value: u8, length: usize },
}

fn decode_mode1(body: &[u8], width: u32, height: u32) -> Result<Box<[u8]>> {
    let width = width as usize;
    let height = height as usize;

    let offsets_region = body
        .get(..height * 2)
        .ok_or(Error::InvalidPixelStream { reason: "mode 1 offset table truncated" })?;

    let mut out = Vec::with_capacity(width * height);
    for r in 0..height {
        let row_offset = read_u16(offsets_region, r * 2) as usize;
        let row_data = body.get(row_offset..).ok_or(Error::InvalidPixelStream {
            reason: "mode 1 row offset out of range",
        })?;

        let row = decode_row_segments(row_data, width, |data, pos| {
            let code = *data.get(pos).ok_or(Error::InvalidPixelStream { reason: "mode 1 segment truncated" })?;
            let length = *data.get(pos + 1).ok_or(Error::InvalidPixelStream { reason: "mode 1 segment truncated" })? as usize;
            if code == 0xFF {
                let raw = data.get(pos + 2..pos + 2 + length).ok_or(Error::InvalidPixelStream {
                    reason: "mode 1 raw segment truncated",
                })?;
                Ok((SegmentKind::Raw(raw), 2 + length))
            } else {
                Ok((SegmentKind::Run { value: code, length }, 2))
            }
        })?;
        out.extend_from_slice(&row);
    }
    Ok(out.into_boxed_slice())
}

fn decode_mode2_segment(data: &[u8], pos: usize) -> Result<(SegmentKind<'_>, usize)> {
    let packed = *data.get(pos).ok_or(Error::InvalidPixelStream { reason: "mode 2 segment truncated" })?;
    let code = packed >> 5;
    let length = usize::from(packed & 0x1F) + 1;

    if code == 7 {
        let raw = data.get(pos + 1..pos + 1 + length).ok_or(Error::InvalidPixelStream {
            reason: "mode 2 raw segment truncated",
        })?;
        Ok((SegmentKind::Raw(raw), 1 + length))
    } else {
        Ok((SegmentKind::Run { value: code, length }, 1))
    }
}

fn decode_mode2(body: &[u8], width: u32, height: u32) -> Result<Box<[u8]>> {
    let width = width as usize;
    let height = height as usize;

    let offsets_region = body
        .get(..height * 4)
        .ok_or(Error::InvalidPixelStream { reason: "mode 2 offset table truncated" })?;

    let mut out = Vec::with_capacity(width * height);
    for r in 0..height {
        let row_offset = read_u32(offsets_region, r * 4) as usize;
        let row_data = body.get(row_offset..).ok_or(Error::InvalidPixelStream {
            reason: "mode 2 row offset out of range",
        })?;
        let row = decode_row_segments(row_data, width, decode_mode2_segment)?;
        out.extend_from_slice(&row);
    }
    Ok(out.into_boxed_slice())
}

fn decode_mode3(body: &[u8], width: u32, height: u32) -> Result<Box<[u8]>> {
    let width = width as usize;
    let height = height as usize;
    let blocks_per_row = width.div_ceil(32);

    let offsets_region = body
        .get(..height * blocks_per_row * 2)
        .ok_or(Error::InvalidPixelStream { reason: "mode 3 offset table truncated" })?;

    let mut out = vec![0u8; width * height];
    for r in 0..height {
        for b in 0..blocks_per_row {
            let block_width = (width - b * 32).min(32);
            let idx = r * blocks_per_row + b;
            let row_offset = read_u16(offsets_region, idx * 2) as usize;
            let block_data = body.get(row_offset..).ok_or(Error::InvalidPixelStream {
                reason: "mode 3 block offset out of range",
            })?;
            let block = decode_row_segments(block_data, block_width, decode_mode2_segment)?;
            let dst = r * width + b * 32;
            out[dst..dst + block_width].copy_from_slice(&block);
        }
    }
    Ok(out.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(encoding: u32, width: u32, height: u32, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; FRAME_HEADER_LEN];
        out[0..4].copy_from_slice(&(body.len() as u32).to_le_bytes());
        out[4..8].copy_from_slice(&encoding.to_le_bytes());
        out[8..12].copy_from_slice(&width.to_le_bytes());
        out[12..16].copy_from_slice(&height.to_le_bytes());
        out[16..20].copy_from_slice(&width.to_le_bytes());
        out[20..24].copy_from_slice(&height.to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn mode0_is_raw_row_major() {
        let data = build_frame(0, 2, 2, &[1, 2, 3, 4]);
        let frame = decode_frame_at(&data, 0).unwrap();
        assert_eq!(&*frame.pixels, &[1, 2, 3, 4]);
    }

    #[test]
    fn mode2_decodes_raw_then_run() {
        // 4x2: row0 raw [1,2,3,4] (code=7, length=4 -> packed 0b111_00011 = 0xE3),
        // row1 run of index 5, length 4 (code=5, length=4 -> packed 0b101_00011 = 0xA3).
        let offsets: [u8; 8] = {
            let mut o = [0u8; 8];
            o[0..4].copy_from_slice(&8u32.to_le_bytes());
            o[4..8].copy_from_slice(&13u32.to_le_bytes());
            o
        };
        let mut body = offsets.to_vec();
        body.push(0xE3);
        body.extend_from_slice(&[1, 2, 3, 4]);
        body.push(0xA3);

        let data = build_frame(2, 4, 2, &body);
        let frame = decode_frame_at(&data, 0).unwrap();
        assert_eq!(&*frame.pixels, &[1, 2, 3, 4, 5, 5, 5, 5]);
    }

    #[test]
    fn mode1_raw_segment_then_run() {
        let mut body = Vec::new();
        body.extend_from_slice(&2u16.to_le_bytes()); // one row, offset 2 (right after table)
        body.push(0xFF);
        body.push(3);
        body.extend_from_slice(&[9, 8, 7]);
        let data = build_frame(1, 3, 1, &body);
        let frame = decode_frame_at(&data, 0).unwrap();
        assert_eq!(&*frame.pixels, &[9, 8, 7]);
    }

    #[test]
    fn rejects_out_of_bounds_origin() {
        let mut data = build_frame(0, 2, 2, &[1, 2, 3, 4]);
        data[24..28].copy_from_slice(&10u32.to_le_bytes()); // left
        assert!(decode_frame_at(&data, 0).is_err());
    }
}
