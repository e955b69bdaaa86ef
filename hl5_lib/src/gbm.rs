//! Palette-indexed images in `.gbm` files.
//!
//! | Offset | Field |
//! | --- | --- |
//! | 0x00 | color byte: bits per pixel in the low nibble (4 or 8) |
//! | 0x01 | palette entry count |
//! | 0x02 | width (u16) |
//! | 0x04 | height (u16) |
//! | 0x06 | palette entries (u16 each) |
//! | .... | pixel indices |
//!
//! Palette entries are RGB565 words; the word `0xF81F` marks a fully
//! transparent entry. At 8 bpp each pixel index is one byte. At 4 bpp each
//! byte packs two indices high nibble first, and every row is padded to a
//! whole byte, so an odd-width row carries one unused index at its end.
use std::io::{Cursor, Read, Seek, Write};

use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use image::RgbaImage;
use indexmap::IndexSet;

use crate::{
    error::{CreateGbmError, DecodeError},
    read_exact,
};

/// Palette word for a fully transparent pixel.
const TRANSPARENT: u16 = 0xF81F;

#[derive(Debug, BinRead, BinWrite, PartialEq, Eq, Clone, Copy)]
struct GbmHeader {
    color: u8,
    palette_size: u8,
    width: u16,
    height: u16,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Gbm {
    /// High nibble of the color byte. Purpose unknown; preserved verbatim.
    pub unk0: u8,
    /// Bits per pixel index, 4 or 8.
    pub color_bit: u8,
    pub width: u16,
    pub height: u16,
    /// RGB565 palette words in file order.
    pub palette: Vec<u16>,
    /// One palette index per pixel, row major. Always `width * height`
    /// entries, each below the palette length.
    pub pixels: Vec<u8>,
}

impl Gbm {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, DecodeError> {
        let header: GbmHeader = reader.read_le()?;
        let color_bit = header.color & 0xF;
        let unk0 = header.color >> 4;
        if color_bit != 4 && color_bit != 8 {
            return Err(DecodeError::UnsupportedBitDepth(color_bit));
        }

        let palette_bytes = read_exact::<DecodeError>(reader, usize::from(header.palette_size) * 2)?;
        let palette: Vec<u16> = palette_bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();

        let width = usize::from(header.width);
        let height = usize::from(header.height);
        let pixels = if color_bit == 8 {
            read_exact::<DecodeError>(reader, width * height)?
        } else {
            read_4bpp(reader, width, height)?
        };

        if let Some(&index) = pixels.iter().find(|&&i| usize::from(i) >= palette.len()) {
            return Err(DecodeError::PaletteIndex {
                index,
                palette_size: palette.len(),
            });
        }

        Ok(Self {
            unk0,
            color_bit,
            width: header.width,
            height: header.height,
            palette,
            pixels,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut Cursor::new(bytes))
    }

    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<(), CreateGbmError> {
        let palette_size = u8::try_from(self.palette.len()).map_err(|_| {
            CreateGbmError::PaletteOverflow {
                colors: self.palette.len(),
                max: 255,
            }
        })?;
        writer.write_le(&GbmHeader {
            color: self.unk0 << 4 | self.color_bit & 0xF,
            palette_size,
            width: self.width,
            height: self.height,
        })?;
        for word in &self.palette {
            writer.write_all(&word.to_le_bytes())?;
        }

        if self.color_bit == 8 {
            writer.write_all(&self.pixels)?;
        } else {
            for row in self.pixels.chunks(usize::from(self.width).max(1)) {
                let mut packed = Vec::with_capacity(row.len() / 2 + 1);
                for pair in row.chunks(2) {
                    let high = pair[0] & 0xF;
                    let low = pair.get(1).copied().unwrap_or(0) & 0xF;
                    packed.push(high << 4 | low);
                }
                writer.write_all(&packed)?;
            }
        }
        Ok(())
    }

    /// Expand the palette indices to an RGBA raster.
    pub fn to_image(&self) -> RgbaImage {
        let palette: Vec<[u8; 4]> = self.palette.iter().map(|&w| rgba_from_word(w)).collect();
        let width = usize::from(self.width);
        RgbaImage::from_fn(self.width.into(), self.height.into(), |x, y| {
            let index = self.pixels[y as usize * width + x as usize];
            image::Rgba(palette[usize::from(index)])
        })
    }

    /// Quantise an RGBA raster to a palette image.
    ///
    /// The palette holds the distinct quantised words in first-seen order.
    pub fn from_image(image: &RgbaImage, color_bit: u8, unk0: u8) -> Result<Self, CreateGbmError> {
        if color_bit != 4 && color_bit != 8 {
            return Err(CreateGbmError::UnsupportedBitDepth(color_bit));
        }
        let (width, height) = image.dimensions();
        if width > u16::MAX.into() || height > u16::MAX.into() {
            return Err(CreateGbmError::ImageTooLarge { width, height });
        }

        let mut palette = IndexSet::new();
        let words: Vec<u16> = image.pixels().map(|p| word_from_rgba(p.0)).collect();
        for &word in &words {
            palette.insert(word);
        }
        // The palette count must fit its header byte, so 256 entries are one
        // too many even at 8 bpp.
        let max = if color_bit == 4 { 16 } else { 255 };
        if palette.len() > max {
            return Err(CreateGbmError::PaletteOverflow {
                colors: palette.len(),
                max,
            });
        }

        let pixels = words
            .iter()
            .map(|w| palette.get_index_of(w).unwrap_or_default() as u8)
            .collect();
        Ok(Self {
            unk0,
            color_bit,
            width: width as u16,
            height: height as u16,
            palette: palette.into_iter().collect(),
            pixels,
        })
    }
}

fn read_4bpp<R: Read>(reader: &mut R, width: usize, height: usize) -> Result<Vec<u8>, DecodeError> {
    let row_bytes = width.div_ceil(2);
    let mut pixels = Vec::with_capacity(width * height);
    for _ in 0..height {
        let row = read_exact::<DecodeError>(reader, row_bytes)?;
        for byte in row {
            pixels.push(byte >> 4);
            pixels.push(byte & 0xF);
        }
        // Odd widths pad each row with one unused index.
        pixels.truncate(pixels.len() - (width % 2));
    }
    Ok(pixels)
}

fn rgba_from_word(word: u16) -> [u8; 4] {
    let r = u32::from(word >> 11 & 0x1F);
    let g = u32::from(word >> 5 & 0x3F);
    let b = u32::from(word & 0x1F);
    let a = if word == TRANSPARENT { 0 } else { 255 };

    // Scale each channel up to the full 8-bit range, rounding to nearest.
    [
        ((r * 255 + 15) / 31) as u8,
        ((g * 255 + 31) / 63) as u8,
        ((b * 255 + 15) / 31) as u8,
        a,
    ]
}

fn word_from_rgba([r, g, b, a]: [u8; 4]) -> u16 {
    if a == 0 {
        return TRANSPARENT;
    }
    let r = (u32::from(r) * 31 + 127) / 255;
    let g = (u32::from(g) * 63 + 127) / 255;
    let b = (u32::from(b) * 31 + 127) / 255;
    (r << 11 | g << 5 | b) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    use hexlit::hex;

    fn gbm_4bpp_5x2() -> Vec<u8> {
        // color 0x14 (unk0 = 1), 11 palette entries, 5x2 pixels.
        let mut data = hex!(140B 0500 0200).to_vec();
        for word in 0..11u16 {
            data.extend_from_slice(&word.to_le_bytes());
        }
        data.extend_from_slice(&hex!(1234 50 6789 A0));
        data
    }

    #[test]
    fn odd_width_4bpp_packing() {
        let gbm = Gbm::from_bytes(&gbm_4bpp_5x2()).unwrap();
        assert_eq!(1, gbm.unk0);
        assert_eq!(4, gbm.color_bit);
        assert_eq!(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10], gbm.pixels);

        let mut out = Cursor::new(Vec::new());
        gbm.write(&mut out).unwrap();
        assert_eq!(gbm_4bpp_5x2(), out.into_inner());
    }

    #[test]
    fn unsupported_bit_depth() {
        let data = hex!(02 01 0100 0100 1FF8 00);
        assert!(matches!(
            Gbm::from_bytes(&data),
            Err(DecodeError::UnsupportedBitDepth(2))
        ));
    }

    #[test]
    fn index_out_of_palette() {
        // 8 bpp, one palette entry, single pixel index 5.
        let data = hex!(08 01 0100 0100 0000 05);
        assert!(matches!(
            Gbm::from_bytes(&data),
            Err(DecodeError::PaletteIndex { index: 5, palette_size: 1 })
        ));
    }

    #[test]
    fn transparent_sentinel() {
        let data = hex!(08 02 0200 0100 1FF8 0000 00 01);
        let image = Gbm::from_bytes(&data).unwrap().to_image();
        assert_eq!(0, image.get_pixel(0, 0).0[3]);
        assert_eq!([0, 0, 0, 255], image.get_pixel(1, 0).0);

        let gbm = Gbm::from_image(&image, 8, 0).unwrap();
        assert_eq!(vec![TRANSPARENT, 0x0000], gbm.palette);
    }

    #[test]
    fn image_round_trip_is_stable() {
        // 3x3 at 4 bpp with a palette in first-seen order, so conversion to
        // an image and back reproduces the exact bytes.
        let mut data = hex!(04 09 0300 0300).to_vec();
        for word in [0x0000u16, 0x1234, 0xF81F, 0x8000, 0x0400, 0x001F, 0xFFFF, 0x07E0, 0xF800] {
            data.extend_from_slice(&word.to_le_bytes());
        }
        data.extend_from_slice(&hex!(0120 3450 6780));

        let gbm = Gbm::from_bytes(&data).unwrap();
        assert_eq!((0..9).collect::<Vec<u8>>(), gbm.pixels);

        let round = Gbm::from_image(&gbm.to_image(), gbm.color_bit, gbm.unk0).unwrap();
        assert_eq!(gbm, round);

        let mut out = Cursor::new(Vec::new());
        round.write(&mut out).unwrap();
        assert_eq!(data, out.into_inner());
    }

    #[test]
    fn quantisation_is_idempotent() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgba([200, 100, 50, 255]));
        image.put_pixel(1, 0, image::Rgba([1, 2, 3, 0]));

        let once = Gbm::from_image(&image, 8, 0).unwrap().to_image();
        let twice = Gbm::from_image(&once, 8, 0).unwrap().to_image();
        assert_eq!(once, twice);
    }

    #[test]
    fn palette_overflow() {
        let mut image = RgbaImage::new(17, 1);
        for x in 0..17 {
            image.put_pixel(x, 0, image::Rgba([(x * 8) as u8, 0, 0, 255]));
        }
        assert!(matches!(
            Gbm::from_image(&image, 4, 0),
            Err(CreateGbmError::PaletteOverflow { colors: 17, max: 16 })
        ));
    }
}
