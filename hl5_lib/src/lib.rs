//! A library for reading and writing the file formats of Heroes Lore 5.
//!
//! The game ships its content as a single VFS archive (see [vfs]) of many
//! small files: schema-driven tables in `c/csv/*.dat` (see [record] and
//! [proc]), scene definitions in `c/map/*.scn` (see [scn]), palette-indexed
//! images in `c/map/*.gbm` (see [gbm]) and sprite sheets in `*.mgr`
//! (see [mgr]). All formats round-trip byte for byte.
use std::io::Read;

use crate::error::Truncated;

pub mod error;
pub mod gbm;
pub mod mgr;
pub mod proc;
pub mod record;
pub mod scn;
pub mod strings;
pub mod vfs;

/// Collects warnings raised while converting game data.
///
/// Warnings do not stop a conversion; the caller reports the final count.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl std::fmt::Display) {
        log::warn!("{message}");
        self.warnings += 1;
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }
}

/// Read exactly `len` bytes or fail with [Truncated].
pub(crate) fn read_exact<E>(reader: &mut impl Read, len: usize) -> Result<Vec<u8>, E>
where
    E: From<std::io::Error> + From<Truncated>,
{
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Truncated {
                    expected: len,
                    actual: filled,
                }
                .into())
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}

/// Lenient variant of [read_exact] that reports end-of-stream as `None`.
///
/// A partial read before the end also counts as end-of-stream; only the
/// archive scan loop wants this behavior.
pub(crate) fn read_exact_or_eof(
    reader: &mut impl Read,
    len: usize,
) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(None),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Some(buf))
}
