//! Game strings in the EUC-KR legacy encoding.
//!
//! Table records use Pascal strings (a `u8` byte length followed by the
//! encoded bytes); scene dialogue uses NUL-terminated strings. Both decode
//! through EUC-KR. A byte sequence that does not decode cleanly, or a string
//! that does not encode cleanly, raises a warning and proceeds with a
//! best-effort substitution.
use std::io::Read;

use encoding_rs::EUC_KR;

use crate::{
    error::{DecodeError, RecordError},
    read_exact, read_exact_or_eof, Diagnostics,
};

pub fn decode(bytes: &[u8], diag: &mut Diagnostics) -> String {
    let (text, _, had_errors) = EUC_KR.decode(bytes);
    if had_errors {
        diag.warn(format!(
            "unable to fully decode {bytes:02x?} as EUC-KR, the result may look malformed"
        ));
    }
    text.into_owned()
}

pub fn encode(text: &str, diag: &mut Diagnostics) -> Vec<u8> {
    let (bytes, _, had_errors) = EUC_KR.encode(text);
    if had_errors {
        diag.warn(format!(
            "unable to fully encode {text:?} as EUC-KR, the result may look malformed"
        ));
    }
    bytes.into_owned()
}

/// Read a string prefixed with its encoded byte length.
pub fn read_pascal_string(
    reader: &mut impl Read,
    diag: &mut Diagnostics,
) -> Result<String, DecodeError> {
    let len = read_exact::<DecodeError>(reader, 1)?[0] as usize;
    let bytes = read_exact::<DecodeError>(reader, len)?;
    Ok(decode(&bytes, diag))
}

/// Write a string as a `u8` byte length followed by the encoded bytes.
///
/// The length prefix counts encoded bytes, not characters.
pub fn write_pascal_string(
    writer: &mut impl std::io::Write,
    text: &str,
    diag: &mut Diagnostics,
) -> Result<(), RecordError> {
    let bytes = encode(text, diag);
    let len = u8::try_from(bytes.len()).map_err(|_| RecordError::StringTooLong(bytes.len()))?;
    writer.write_all(&[len])?;
    writer.write_all(&bytes)?;
    Ok(())
}

/// Read bytes up to a NUL terminator (or the end of the source) and decode.
pub fn read_cstring(
    reader: &mut impl Read,
    diag: &mut Diagnostics,
) -> Result<String, DecodeError> {
    let mut bytes = Vec::new();
    while let Some(byte) = read_exact_or_eof(reader, 1)? {
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    Ok(decode(&bytes, diag))
}

/// Write a string as encoded bytes followed by a NUL terminator.
pub fn write_cstring(
    writer: &mut impl std::io::Write,
    text: &str,
    diag: &mut Diagnostics,
) -> Result<(), RecordError> {
    let bytes = encode(text, diag);
    writer.write_all(&bytes)?;
    writer.write_all(&[0])?;
    Ok(())
}
