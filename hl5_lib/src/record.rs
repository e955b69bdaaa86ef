//! Schema-driven codecs for the table records in `c/csv/*.dat`.
//!
//! A record file is an array of length-prefixed elements. Each element is
//! parsed against a [Schema], an ordered list of named field codecs, into a
//! JSON document for editing. Writing reads the fields back by name in
//! schema order, so the on-disk key order of an edited document never
//! affects the binary layout.
//!
//! Two array containers appear in the game data:
//!
//! * *Pascal arrays*: `count, (length, payload) * count` with 16-bit or
//!   32-bit count and length words.
//! * *Extended arrays*: `u8 count`, a vector of `count` lengths (8-bit or
//!   16-bit, chosen by the caller), then the concatenated payloads.
use std::io::{Cursor, Read, Write};

use binrw::Endian;
use serde_json::Value;

use crate::{
    error::{RecordError, Truncated},
    read_exact, strings, Diagnostics,
};

/// An editable record, keyed by field name in display order.
pub type Document = serde_json::Map<String, Value>;

#[derive(Debug, Clone)]
pub enum Codec {
    Int {
        bits: u8,
        endian: Endian,
        signed: bool,
    },
    /// Pascal string in the legacy encoding.
    LegacyString,
    /// Opaque bytes, either a fixed count or the remainder of the element.
    Bytes(Option<usize>),
    /// A nested fixed struct.
    Struct(Schema),
}

impl Codec {
    /// An unsigned little-endian integer of `bits` width.
    pub fn int(bits: u8) -> Self {
        Codec::Int {
            bits,
            endian: Endian::Little,
            signed: false,
        }
    }

    fn read(
        &self,
        reader: &mut Cursor<&[u8]>,
        diag: &mut Diagnostics,
    ) -> Result<Value, RecordError> {
        match self {
            Codec::Int {
                bits,
                endian,
                signed,
            } => {
                let bytes = read_exact::<RecordError>(reader, usize::from(bits / 8))?;
                Ok(int_value(&bytes, *endian, *signed))
            }
            Codec::LegacyString => Ok(Value::String(
                strings::read_pascal_string(reader, diag).map_err(record_read_err)?,
            )),
            Codec::Bytes(size) => {
                let bytes = match size {
                    Some(size) => read_exact::<RecordError>(reader, *size)?,
                    None => {
                        let mut bytes = Vec::new();
                        reader.read_to_end(&mut bytes)?;
                        bytes
                    }
                };
                Ok(Value::Array(bytes.iter().map(|&b| Value::from(b)).collect()))
            }
            Codec::Struct(schema) => {
                let mut doc = Document::new();
                for (name, codec) in &schema.fields {
                    doc.insert((*name).to_string(), codec.read(reader, diag)?);
                }
                Ok(Value::Object(schema.apply_display_order(doc)))
            }
        }
    }

    fn write(
        &self,
        writer: &mut impl Write,
        value: &Value,
        diag: &mut Diagnostics,
    ) -> Result<(), RecordError> {
        match self {
            Codec::Int {
                bits,
                endian,
                signed,
            } => {
                let n = value.as_i64().ok_or(RecordError::UnexpectedType {
                    expected: "number",
                })?;
                write_int(writer, n, *bits, *endian, *signed)
            }
            Codec::LegacyString => {
                let text = value.as_str().ok_or(RecordError::UnexpectedType {
                    expected: "string",
                })?;
                strings::write_pascal_string(writer, text, diag)
            }
            Codec::Bytes(size) => {
                let values = value.as_array().ok_or(RecordError::UnexpectedType {
                    expected: "array of bytes",
                })?;
                if let Some(size) = size {
                    if values.len() != *size {
                        return Err(RecordError::ByteCount {
                            expected: *size,
                            actual: values.len(),
                        });
                    }
                }
                let bytes = values
                    .iter()
                    .map(|v| {
                        v.as_u64()
                            .and_then(|n| u8::try_from(n).ok())
                            .ok_or(RecordError::UnexpectedType {
                                expected: "array of bytes",
                            })
                    })
                    .collect::<Result<Vec<u8>, _>>()?;
                writer.write_all(&bytes)?;
                Ok(())
            }
            Codec::Struct(schema) => {
                let doc = value.as_object().ok_or(RecordError::UnexpectedType {
                    expected: "object",
                })?;
                schema.write_fields(writer, doc, diag)
            }
        }
    }
}

fn int_value(bytes: &[u8], endian: Endian, signed: bool) -> Value {
    let mut raw: u64 = 0;
    match endian {
        Endian::Little => {
            for &b in bytes.iter().rev() {
                raw = raw << 8 | u64::from(b);
            }
        }
        Endian::Big => {
            for &b in bytes {
                raw = raw << 8 | u64::from(b);
            }
        }
    }
    if signed {
        let shift = 64 - bytes.len() * 8;
        Value::from((raw << shift) as i64 >> shift)
    } else {
        Value::from(raw)
    }
}

fn write_int(
    writer: &mut impl Write,
    value: i64,
    bits: u8,
    endian: Endian,
    signed: bool,
) -> Result<(), RecordError> {
    let (min, max): (i128, i128) = if signed {
        (-(1 << (bits - 1)), (1 << (bits - 1)) - 1)
    } else {
        (0, (1 << bits) - 1)
    };
    if i128::from(value) < min || i128::from(value) > max {
        return Err(RecordError::IntRange { value, bits });
    }
    let len = usize::from(bits / 8);
    let bytes = match endian {
        Endian::Little => value.to_le_bytes()[..len].to_vec(),
        Endian::Big => value.to_be_bytes()[8 - len..].to_vec(),
    };
    writer.write_all(&bytes)?;
    Ok(())
}

// Pascal strings only ever fail with truncation or I/O; decoding itself is
// lossy with a warning, never an error.
fn record_read_err(e: crate::error::DecodeError) -> RecordError {
    use crate::error::DecodeError;
    match e {
        DecodeError::Truncated(t) => RecordError::Truncated(t),
        DecodeError::Io(e) => RecordError::Io(e),
        e => RecordError::Io(std::io::Error::other(e.to_string())),
    }
}

/// The field layout of one record element.
///
/// Field order is binary order. An optional display order re-keys the
/// document emitted for editing without affecting the binary layout.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<(&'static str, Codec)>,
    display_order: Option<&'static [&'static str]>,
}

impl Schema {
    pub fn new(fields: Vec<(&'static str, Codec)>) -> Self {
        Self {
            fields,
            display_order: None,
        }
    }

    pub fn with_display_order(mut self, order: &'static [&'static str]) -> Self {
        self.display_order = Some(order);
        self
    }

    /// Parse one element from its exact byte slice.
    pub fn read_element(
        &self,
        bytes: &[u8],
        diag: &mut Diagnostics,
    ) -> Result<Document, RecordError> {
        let mut reader = Cursor::new(bytes);
        let mut doc = Document::new();
        for (name, codec) in &self.fields {
            doc.insert((*name).to_string(), codec.read(&mut reader, diag)?);
        }
        let remaining = bytes.len() as u64 - reader.position();
        if remaining > 0 {
            diag.warn(format!("{remaining} trailing bytes after record fields"));
        }
        Ok(self.apply_display_order(doc))
    }

    /// Serialise one document back to element bytes in schema order.
    pub fn write_element(
        &self,
        doc: &Document,
        diag: &mut Diagnostics,
    ) -> Result<Vec<u8>, RecordError> {
        let mut bytes = Vec::new();
        self.write_fields(&mut bytes, doc, diag)?;
        Ok(bytes)
    }

    fn write_fields(
        &self,
        writer: &mut impl Write,
        doc: &Document,
        diag: &mut Diagnostics,
    ) -> Result<(), RecordError> {
        for (name, codec) in &self.fields {
            let value = doc
                .get(*name)
                .ok_or_else(|| RecordError::MissingField((*name).to_string()))?;
            codec.write(writer, value, diag)?;
        }
        Ok(())
    }

    fn apply_display_order(&self, mut doc: Document) -> Document {
        let Some(order) = self.display_order else {
            return doc;
        };
        let mut out = Document::new();
        for key in order {
            if let Some(value) = doc.remove(*key) {
                out.insert((*key).to_string(), value);
            }
        }
        debug_assert!(doc.is_empty(), "display order does not cover {doc:?}");
        out
    }
}

fn read_u8<E>(reader: &mut impl Read) -> Result<usize, E>
where
    E: From<std::io::Error> + From<Truncated>,
{
    Ok(usize::from(read_exact::<E>(reader, 1)?[0]))
}

fn read_u16<E>(reader: &mut impl Read) -> Result<usize, E>
where
    E: From<std::io::Error> + From<Truncated>,
{
    let b = read_exact::<E>(reader, 2)?;
    Ok(usize::from(u16::from_le_bytes([b[0], b[1]])))
}

fn read_u32<E>(reader: &mut impl Read) -> Result<usize, E>
where
    E: From<std::io::Error> + From<Truncated>,
{
    let b = read_exact::<E>(reader, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
}

/// Read a Pascal array, handing each element's exact slice to `read_elem`.
///
/// `wide` selects 32-bit count and length words over the default 16-bit.
pub fn read_pascal_array<T, E, F>(
    reader: &mut impl Read,
    wide: bool,
    mut read_elem: F,
) -> Result<Vec<T>, E>
where
    E: From<std::io::Error> + From<Truncated>,
    F: FnMut(&[u8], usize) -> Result<T, E>,
{
    let count = if wide {
        read_u32::<E>(reader)?
    } else {
        read_u16::<E>(reader)?
    };
    let mut items = Vec::new();
    for index in 0..count {
        let len = if wide {
            read_u32::<E>(reader)?
        } else {
            read_u16::<E>(reader)?
        };
        let bytes = read_exact::<E>(reader, len)?;
        items.push(read_elem(&bytes, index)?);
    }
    Ok(items)
}

/// Write a Pascal array. Each element is buffered so its length word can be
/// emitted first; the output never needs to seek.
pub fn write_pascal_array<T, E, F>(
    writer: &mut impl Write,
    wide: bool,
    items: &[T],
    mut write_elem: F,
) -> Result<(), E>
where
    E: From<std::io::Error> + From<RecordError>,
    F: FnMut(&T, usize) -> Result<Vec<u8>, E>,
{
    let bits = if wide { 32 } else { 16 };
    write_len::<E>(writer, items.len(), bits, true)?;
    for (index, item) in items.iter().enumerate() {
        let payload = write_elem(item, index)?;
        write_len::<E>(writer, payload.len(), bits, false)?;
        writer.write_all(&payload).map_err(E::from)?;
    }
    Ok(())
}

/// Read an extended array: `u8` count, a length vector, then the payloads.
///
/// `wide_lengths` selects 16-bit length entries over 8-bit ones.
pub fn read_ext_array<T, E, F>(
    reader: &mut impl Read,
    wide_lengths: bool,
    mut read_elem: F,
) -> Result<Vec<T>, E>
where
    E: From<std::io::Error> + From<Truncated>,
    F: FnMut(&[u8], usize) -> Result<T, E>,
{
    let count = read_u8::<E>(reader)?;
    let mut lengths = Vec::with_capacity(count);
    for _ in 0..count {
        lengths.push(if wide_lengths {
            read_u16::<E>(reader)?
        } else {
            read_u8::<E>(reader)?
        });
    }
    let mut items = Vec::with_capacity(count);
    for (index, len) in lengths.into_iter().enumerate() {
        let bytes = read_exact::<E>(reader, len)?;
        items.push(read_elem(&bytes, index)?);
    }
    Ok(items)
}

/// Write an extended array. All payloads are buffered up front because the
/// length vector precedes them.
pub fn write_ext_array<T, E, F>(
    writer: &mut impl Write,
    wide_lengths: bool,
    items: &[T],
    mut write_elem: F,
) -> Result<(), E>
where
    E: From<std::io::Error> + From<RecordError>,
    F: FnMut(&T, usize) -> Result<Vec<u8>, E>,
{
    write_len::<E>(writer, items.len(), 8, true)?;
    let mut payloads = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        payloads.push(write_elem(item, index)?);
    }
    let bits = if wide_lengths { 16 } else { 8 };
    for payload in &payloads {
        write_len::<E>(writer, payload.len(), bits, false)?;
    }
    for payload in &payloads {
        writer.write_all(payload).map_err(E::from)?;
    }
    Ok(())
}

fn write_len<E>(writer: &mut impl Write, len: usize, bits: u8, count: bool) -> Result<(), E>
where
    E: From<std::io::Error> + From<RecordError>,
{
    if bits < 64 && len >= 1usize << bits {
        return Err(if count {
            RecordError::CountOverflow { count: len, bits }
        } else {
            RecordError::LengthOverflow { len, bits }
        }
        .into());
    }
    let bytes = (len as u64).to_le_bytes();
    writer
        .write_all(&bytes[..usize::from(bits / 8)])
        .map_err(E::from)
}
