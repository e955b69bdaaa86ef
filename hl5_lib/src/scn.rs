//! Scene definitions in `.scn` files.
//!
//! A scene is a 15-byte header followed by three extended arrays. Header
//! bytes 0..3 hold the length-vector width of each array in turn: 2 selects
//! 16-bit lengths, anything else 8-bit. The first two arrays are opaque;
//! the third holds NUL-terminated dialogue strings. The first string is the
//! scene name, `"0"` when the scene is unnamed.
use std::io::{Cursor, Read, Write};

use serde::{Deserialize, Serialize};

use crate::{
    error::{DecodeError, RecordError},
    read_exact,
    record::{read_ext_array, write_ext_array},
    strings, Diagnostics,
};

const HEADER_LEN: usize = 15;

/// Field order here is the editing order; the header trails the strings in
/// the document even though it leads the binary layout.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Scn {
    pub strings: Vec<String>,
    pub header: Vec<u8>,
    pub arr1: Vec<Vec<u8>>,
    pub arr2: Vec<Vec<u8>>,
}

impl Scn {
    pub fn read<R: Read>(reader: &mut R, diag: &mut Diagnostics) -> Result<Self, DecodeError> {
        let header = read_exact::<DecodeError>(reader, HEADER_LEN)?;
        let arr1 = read_ext_array(reader, header[0] == 2, |bytes, _| {
            Ok::<_, DecodeError>(bytes.to_vec())
        })?;
        let arr2 = read_ext_array(reader, header[1] == 2, |bytes, _| {
            Ok::<_, DecodeError>(bytes.to_vec())
        })?;
        let strings = read_ext_array(reader, header[2] == 2, |bytes, _| {
            strings::read_cstring(&mut Cursor::new(bytes), diag)
        })?;
        Ok(Self {
            strings,
            header,
            arr1,
            arr2,
        })
    }

    pub fn write<W: Write>(
        &self,
        writer: &mut W,
        diag: &mut Diagnostics,
    ) -> Result<(), RecordError> {
        if self.header.len() != HEADER_LEN {
            return Err(RecordError::ByteCount {
                expected: HEADER_LEN,
                actual: self.header.len(),
            });
        }
        writer.write_all(&self.header)?;
        write_ext_array(writer, self.header[0] == 2, &self.arr1, |bytes, _| {
            Ok::<_, RecordError>(bytes.clone())
        })?;
        write_ext_array(writer, self.header[1] == 2, &self.arr2, |bytes, _| {
            Ok::<_, RecordError>(bytes.clone())
        })?;
        write_ext_array(writer, self.header[2] == 2, &self.strings, |text, _| {
            let mut bytes = Vec::new();
            strings::write_cstring(&mut bytes, text, diag)?;
            Ok::<_, RecordError>(bytes)
        })?;
        Ok(())
    }

    /// The scene name, i.e. the first dialogue string.
    pub fn name(&self) -> Option<&str> {
        self.strings.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_selects_length_widths() {
        let mut data = vec![2u8, 1, 2];
        data.extend_from_slice(&[0; 12]);
        // arr1: one element, 16-bit lengths.
        data.extend_from_slice(&[1, 3, 0, 0xAA, 0xBB, 0xCC]);
        // arr2: two elements, 8-bit lengths.
        data.extend_from_slice(&[2, 1, 1, 0xDD, 0xEE]);
        // strings: one element, 16-bit lengths.
        data.extend_from_slice(&[1, 2, 0, b'0', 0]);

        let mut diag = Diagnostics::new();
        let scn = Scn::read(&mut Cursor::new(&data[..]), &mut diag).unwrap();
        assert_eq!(vec![vec![0xAA, 0xBB, 0xCC]], scn.arr1);
        assert_eq!(vec![vec![0xDD], vec![0xEE]], scn.arr2);
        assert_eq!(Some("0"), scn.name());

        let mut out = Vec::new();
        scn.write(&mut out, &mut diag).unwrap();
        assert_eq!(data, out);
        assert_eq!(0, diag.warning_count());
    }
}
