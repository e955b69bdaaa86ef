//! Sprite sheets in `.mgr` files.
//!
//! A sheet is a Pascal array with 32-bit count and length words whose
//! elements are complete [Gbm](crate::gbm::Gbm) images. Sprites are
//! addressed by their position in the sheet.
use std::io::{Cursor, Read, Seek, Write};

use crate::{
    error::{CreateGbmError, DecodeError},
    gbm::Gbm,
    record::read_pascal_array,
};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Mgr {
    pub images: Vec<Gbm>,
}

impl Mgr {
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, DecodeError> {
        let images = read_pascal_array(reader, true, |bytes, _| Gbm::from_bytes(bytes))?;
        Ok(Self { images })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::read(&mut Cursor::new(bytes))
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), CreateGbmError> {
        writer.write_all(&(self.images.len() as u32).to_le_bytes())?;
        for image in &self.images {
            let mut payload = Cursor::new(Vec::new());
            image.write(&mut payload)?;
            let payload = payload.into_inner();
            writer.write_all(&(payload.len() as u32).to_le_bytes())?;
            writer.write_all(&payload)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hexlit::hex;

    #[test]
    fn sheet_round_trip() {
        // Two single-pixel 8 bpp images.
        let sprite_a = hex!(08 01 0100 0100 0000 00);
        let sprite_b = hex!(18 01 0100 0100 1FF8 00);
        let mut data = 2u32.to_le_bytes().to_vec();
        for sprite in [&sprite_a[..], &sprite_b[..]] {
            data.extend_from_slice(&(sprite.len() as u32).to_le_bytes());
            data.extend_from_slice(sprite);
        }

        let mgr = Mgr::from_bytes(&data).unwrap();
        assert_eq!(2, mgr.images.len());
        assert_eq!(0, mgr.images[0].unk0);
        assert_eq!(1, mgr.images[1].unk0);

        let mut out = Vec::new();
        mgr.write(&mut out).unwrap();
        assert_eq!(data, out);
    }
}
