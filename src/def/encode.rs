use super::{DefHeader, DefPalette, Error, Result, FRAME_HEADER_LEN, FRAME_NAME_WIDTH, GROUP_RECORD_LEN, HEADER_LEN, PALETTE_LEN};
use crate::io::{Endian, Sink};
use crate::strings::FixedName;
use bstr::BStr;

/// Input to the encoder: the inverse of a decoded [`super::DefFrame`], plus
/// an optional encoding mode override (default: mode 2, per the component
/// design).
pub struct EncodedFrame {
    pub full_width: u32,
    pub full_height: u32,
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
    pub pixels: Vec<u8>,
    pub encoding: Option<u32>,
}

pub struct EncodeGroup<'a> {
    pub group_index: u32,
    pub unknown1: u32,
    pub unknown2: u32,
    pub frames: Vec<(&'a BStr, EncodedFrame)>,
}

/// Re-packs `groups` into a binary equal in structure to what [`super::Def::read`]
/// parses. Frame table offsets are computed in a second pass, once every
/// frame body has been serialised, per the two-pass layout this format
/// uses on disk.
pub fn encode_def(header: DefHeader, palette: &DefPalette, groups: &[EncodeGroup<'_>]) -> Result<Vec<u8>> {
    let tables_len = HEADER_LEN
        + PALETTE_LEN
        + groups
            .iter()
            .map(|g| GROUP_RECORD_LEN + g.frames.len() * (FRAME_NAME_WIDTH + 4))
            .sum::<usize>();

    let mut frame_bodies = Vec::new();
    for group in groups {
        for (_, frame) in &group.frames {
            frame_bodies.push(encode_frame(frame)?);
        }
    }

    let mut offsets = Vec::with_capacity(frame_bodies.len());
    let mut cursor = tables_len;
    for body in &frame_bodies {
        offsets.push(cursor as u32);
        cursor += body.len();
    }

    let mut out = Vec::with_capacity(cursor);
    out.extend_from_slice(&header.def_type.to_le_bytes());
    out.extend_from_slice(&header.full_width.to_le_bytes());
    out.extend_from_slice(&header.full_height.to_le_bytes());
    out.extend_from_slice(&(groups.len() as u32).to_le_bytes());
    for &(r, g, b) in palette.iter() {
        out.push(r);
        out.push(g);
        out.push(b);
    }

    let mut offset_iter = offsets.iter();
    for group in groups {
        out.extend_from_slice(&group.group_index.to_le_bytes());
        out.extend_from_slice(&(group.frames.len() as u32).to_le_bytes());
        out.extend_from_slice(&group.unknown1.to_le_bytes());
        out.extend_from_slice(&group.unknown2.to_le_bytes());

        for (name, _) in &group.frames {
            let mut sink = Sink::new(&mut out);
            sink.write_protocol::<FixedName<FRAME_NAME_WIDTH>>(*name, Endian::Little)
                .map_err(|_| Error::InvalidDef {
                    reason: "frame name does not fit its 13-byte field",
                })?;
        }
        for _ in &group.frames {
            out.extend_from_slice(&offset_iter.next().expect("one offset per frame").to_le_bytes());
        }
    }

    for body in frame_bodies {
        out.extend_from_slice(&body);
    }

    Ok(out)
}

fn encode_frame(frame: &EncodedFrame) -> Result<Vec<u8>> {
    let encoding = frame.encoding.unwrap_or(2);
    let expected_len = (frame.width as usize) * (frame.height as usize);
    if frame.pixels.len() != expected_len {
        return Err(Error::InvalidDef {
            reason: "frame pixel buffer length != width * height",
        });
    }

    let body = match encoding {
        0 => frame.pixels.clone(),
        1 => encode_mode1(&frame.pixels, frame.width as usize, frame.height as usize),
        2 => encode_mode2(&frame.pixels, frame.width as usize, frame.height as usize),
        3 => encode_mode3(&frame.pixels, frame.width as usize, frame.height as usize),
        _ => {
            return Err(Error::InvalidDef {
                reason: "unsupported encoding mode requested",
            })
        }
    };

    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&encoding.to_le_bytes());
    out.extend_from_slice(&frame.full_width.to_le_bytes());
    out.extend_from_slice(&frame.full_height.to_le_bytes());
    out.extend_from_slice(&frame.width.to_le_bytes());
    out.extend_from_slice(&frame.height.to_le_bytes());
    out.extend_from_slice(&frame.left.to_le_bytes());
    out.extend_from_slice(&frame.top.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// `0xFF` is the only reserved code (raw-segment marker); any other byte
/// value may be run-length encoded directly.
fn encode_row_mode1(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < row.len() {
        let value = row[i];
        let mut len = 1usize;
        while i + len < row.len() && row[i + len] == value && len < 255 {
            len += 1;
        }

        if value == 0xFF {
            out.push(0xFF);
            out.push(len as u8);
            out.extend_from_slice(&row[i..i + len]);
        } else {
            out.push(value);
            out.push(len as u8);
        }
        i += len;
    }
    out
}

fn encode_mode1(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let rows: Vec<Vec<u8>> = (0..height)
        .map(|r| encode_row_mode1(&pixels[r * width..(r + 1) * width]))
        .collect();

    let mut out = vec![0u8; height * 2];
    let mut cursor = out.len();
    for (r, row) in rows.iter().enumerate() {
        out[r * 2..r * 2 + 2].copy_from_slice(&(cursor as u16).to_le_bytes());
        cursor += row.len();
    }
    for row in rows {
        out.extend_from_slice(&row);
    }
    out
}

/// Packed code/length segments shared by modes 2 and 3: palette indices
/// `0..=6` may be run-length encoded (`code` = the index); code `7` is
/// reserved to mean "raw segment follows", so any other index value must
/// always be sent raw, even if repeated.
fn encode_segments_mode2(values: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < values.len() {
        let value = values[i];
        if value <= 6 {
            let mut len = 1usize;
            while i + len < values.len() && values[i + len] == value && len < 32 {
                len += 1;
            }
            out.push((value << 5) | (len - 1) as u8);
            i += len;
        } else {
            let mut len = 1usize;
            while i + len < values.len() && len < 32 && values[i + len] > 6 {
                len += 1;
            }
            out.push((7u8 << 5) | (len - 1) as u8);
            out.extend_from_slice(&values[i..i + len]);
            i += len;
        }
    }
    out
}

fn encode_mode2(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let rows: Vec<Vec<u8>> = (0..height)
        .map(|r| encode_segments_mode2(&pixels[r * width..(r + 1) * width]))
        .collect();

    let mut out = vec![0u8; height * 4];
    let mut cursor = out.len();
    for (r, row) in rows.iter().enumerate() {
        out[r * 4..r * 4 + 4].copy_from_slice(&(cursor as u32).to_le_bytes());
        cursor += row.len();
    }
    for row in rows {
        out.extend_from_slice(&row);
    }
    out
}

fn encode_mode3(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let blocks_per_row = width.div_ceil(32);
    let mut blocks = Vec::with_capacity(height * blocks_per_row);

    for r in 0..height {
        for b in 0..blocks_per_row {
            let start = r * width + b * 32;
            let block_width = (width - b * 32).min(32);
            blocks.push(encode_segments_mode2(&pixels[start..start + block_width]));
        }
    }

    let mut out = vec![0u8; blocks.len() * 2];
    let mut cursor = out.len();
    for (i, block) in blocks.iter().enumerate() {
        out[i * 2..i * 2 + 2].copy_from_slice(&(cursor as u16).to_le_bytes());
        cursor += block.len();
    }
    for block in blocks {
        out.extend_from_slice(&block);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{encode_def, EncodeGroup, EncodedFrame};
    use crate::def::{DefHeader, Def};
    use bstr::ByteSlice as _;

    fn frame(width: u32, height: u32, pixels: Vec<u8>, encoding: u32) -> EncodedFrame {
        EncodedFrame {
            full_width: width,
            full_height: height,
            width,
            height,
            left: 0,
            top: 0,
            pixels,
            encoding: Some(encoding),
        }
    }

    #[test]
    fn round_trips_every_mode() {
        let palette = [(0u8, 0u8, 0u8); 256];
        let header = DefHeader {
            def_type: 0x42,
            full_width: 4,
            full_height: 2,
            group_count: 1,
        };

        for mode in 0..=3u32 {
            let pixels = vec![0u8, 1, 9, 200, 3, 3, 6, 250];
            let groups = vec![EncodeGroup {
                group_index: 0,
                unknown1: 0,
                unknown2: 0,
                frames: vec![(b"walk0000".as_bstr(), frame(4, 2, pixels.clone(), mode))],
            }];

            let bytes = encode_def(header, &palette, &groups).unwrap();
            let mut def = Def::read(&bytes).unwrap();
            let decoded = def.decode_frame(0, 0).unwrap();
            assert_eq!(&*decoded.pixels, pixels.as_slice(), "mode {mode} round-trip");
        }
    }

    #[test]
    fn round_trips_through_anyhow_helper() -> anyhow::Result<()> {
        use crate::test_support::roundtrip;

        let palette = [(0u8, 0u8, 0u8); 256];
        let header = DefHeader {
            def_type: 7,
            full_width: 2,
            full_height: 2,
            group_count: 1,
        };
        let pixels = vec![1u8, 2, 3, 4];

        let decoded_pixels = roundtrip(
            "def encode",
            || {
                let groups = vec![EncodeGroup {
                    group_index: 0,
                    unknown1: 0,
                    unknown2: 0,
                    frames: vec![(b"idle0000".as_bstr(), frame(2, 2, pixels.clone(), 0))],
                }];
                Ok(encode_def(header, &palette, &groups)?)
            },
            |bytes| {
                let mut def = Def::read(bytes)?;
                Ok(def.decode_frame(0, 0)?.pixels.to_vec())
            },
        )?;

        assert_eq!(decoded_pixels, pixels);
        Ok(())
    }
}
