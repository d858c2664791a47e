use super::{DecodedImage, Error, Palette, Result};

const FILE_HEADER_LEN: usize = 14;
const BI_RGB: u32 = 0;

/// Decodes a BMP file. Only 8-bit paletted and 24-bit RGB, uncompressed
/// (`BI_RGB`) images are supported. `RLE8`/`BITFIELDS` are rejected rather
/// than approximated.
pub fn decode_bmp(bytes: &[u8]) -> Result<DecodedImage> {
    if bytes.len() < FILE_HEADER_LEN + 40 {
        return Err(Error::Truncated);
    }
    if &bytes[0..2] != b"BM" {
        return Err(Error::NotBmp);
    }

    let data_offset = u32::from_le_bytes(bytes[10..14].try_into().unwrap()) as usize;
    let info = &bytes[FILE_HEADER_LEN..];

    let width = i32::from_le_bytes(info[4..8].try_into().unwrap());
    let raw_height = i32::from_le_bytes(info[8..12].try_into().unwrap());
    let bits_per_pixel = u16::from_le_bytes(info[14..16].try_into().unwrap());
    let compression = u32::from_le_bytes(info[16..20].try_into().unwrap());

    if compression != BI_RGB {
        return Err(Error::UnsupportedCompression(compression));
    }
    if width <= 0 {
        return Err(Error::Truncated);
    }

    let width = width as usize;
    let bottom_up = raw_height > 0;
    let height = raw_height.unsigned_abs() as usize;

    match bits_per_pixel {
        8 => {
            let colors_used = u32::from_le_bytes(info[32..36].try_into().unwrap());
            let palette_entries = if colors_used == 0 { 256 } else { colors_used as usize };
            let palette_start = FILE_HEADER_LEN + 40;
            let palette_bytes = bytes
                .get(palette_start..palette_start + palette_entries * 4)
                .ok_or(Error::Truncated)?;

            let mut palette: Palette = [(0, 0, 0); 256];
            for (i, chunk) in palette_bytes.chunks_exact(4).enumerate() {
                palette[i] = (chunk[2], chunk[1], chunk[0]);
            }

            let row_stride = (width + 3) & !3;
            let mut indices = vec![0u8; width * height];
            for row in 0..height {
                let src_row = if bottom_up { height - 1 - row } else { row };
                let start = data_offset + src_row * row_stride;
                let line = bytes.get(start..start + width).ok_or(Error::Truncated)?;
                indices[row * width..(row + 1) * width].copy_from_slice(line);
            }

            Ok(DecodedImage::Indexed {
                width: width as u32,
                height: height as u32,
                palette: Box::new(palette),
                indices,
            })
        }
        24 => {
            let row_stride = (width * 3 + 3) & !3;
            let mut rgb = vec![0u8; width * height * 3];
            for row in 0..height {
                let src_row = if bottom_up { height - 1 - row } else { row };
                let start = data_offset + src_row * row_stride;
                let line = bytes.get(start..start + width * 3).ok_or(Error::Truncated)?;
                for (px, bgr) in line.chunks_exact(3).enumerate() {
                    let dst = (row * width + px) * 3;
                    rgb[dst] = bgr[2];
                    rgb[dst + 1] = bgr[1];
                    rgb[dst + 2] = bgr[0];
                }
            }

            Ok(DecodedImage::Rgb {
                width: width as u32,
                height: height as u32,
                rgb,
            })
        }
        other => Err(Error::UnsupportedDepth(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::decode_bmp;
    use crate::pixels::{DecodedImage, Error};

    fn synth_bmp_8bit(width: u32, height: u32, rows_bottom_up: &[Vec<u8>]) -> Vec<u8> {
        let row_stride = ((width as usize) + 3) & !3;
        let palette_len = 256 * 4;
        let data_offset = 14 + 40 + palette_len;
        let mut out = vec![0u8; data_offset];
        out[0..2].copy_from_slice(b"BM");
        out[10..14].copy_from_slice(&(data_offset as u32).to_le_bytes());

        let info = &mut out[14..14 + 40];
        info[0..4].copy_from_slice(&40u32.to_le_bytes());
        info[4..8].copy_from_slice(&(width as i32).to_le_bytes());
        info[8..12].copy_from_slice(&(height as i32).to_le_bytes());
        info[14..16].copy_from_slice(&8u16.to_le_bytes());

        for i in 0..256u32 {
            let base = 14 + 40 + i as usize * 4;
            out[base] = i as u8;
            out[base + 1] = i as u8;
            out[base + 2] = i as u8;
        }

        for row in rows_bottom_up {
            let mut padded = row.clone();
            padded.resize(row_stride, 0);
            out.extend_from_slice(&padded);
        }

        out
    }

    #[test]
    fn decodes_8bit_paletted_bottom_up() {
        let bytes = synth_bmp_8bit(3, 2, &[vec![10, 11, 12], vec![1, 2, 3]]);
        let DecodedImage::Indexed { width, height, indices, palette } = decode_bmp(&bytes).unwrap() else {
            panic!("expected indexed image");
        };
        assert_eq!((width, height), (3, 2));
        // row 0 of the output is the *last* row stored on disk (bottom-up).
        assert_eq!(indices, vec![1, 2, 3, 10, 11, 12]);
        assert_eq!(palette[5], (5, 5, 5));
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = synth_bmp_8bit(2, 1, &[vec![0, 0]]);
        bytes[0] = b'X';
        assert!(matches!(decode_bmp(&bytes), Err(Error::NotBmp)));
    }
}
