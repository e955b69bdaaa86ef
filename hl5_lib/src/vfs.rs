//! The VFS archive that bundles all game content into one file.
//!
//! The archive is a flat sequence of entries with no index block:
//!
//! | Offset | Field |
//! | --- | --- |
//! | 0x00 | path hash (u32) |
//! | 0x04 | payload size (u32) |
//! | 0x08 | payload |
//! | .... | next entry |
//!
//! Entries are addressed by a rolling hash of their archive path. One
//! well-known entry, the manifest at [MANIFEST_HASH], is a string table of
//! every other entry's path in packing order; extraction walks the manifest
//! and resolves each path back to an entry through its hash.
use std::{
    collections::HashMap,
    fs,
    io::{Cursor, Read, Seek, SeekFrom, Write},
    path::Path,
};

use binrw::{BinRead, BinReaderExt, BinWrite};
use indexmap::IndexMap;
use log::info;

use crate::{error::ArchiveError, read_exact, read_exact_or_eof};

/// Hash of the manifest string table entry.
pub const MANIFEST_HASH: u32 = 0xBC90_9D54;

#[derive(Debug, BinRead, BinWrite, PartialEq, Eq, Clone, Copy)]
struct EntryHeader {
    hash: u32,
    size: u32,
}

/// Location of one entry's payload inside the archive.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Entry {
    pub offset: u64,
    pub size: u32,
}

/// Hash an archive path to its entry tag.
///
/// Paths are hashed over their ASCII bytes; the archive format has no
/// escape hatch for anything else.
pub fn hash_path(path: &str) -> Result<u32, ArchiveError> {
    if !path.is_ascii() {
        return Err(ArchiveError::NonAsciiPath(path.to_string()));
    }
    let mut acc = 0x1505u32;
    for byte in path.bytes() {
        acc = acc
            .wrapping_add(u32::from(byte))
            .wrapping_add(acc.wrapping_shl(5));
    }
    Ok(acc)
}

/// Scan the archive and record where every entry's payload lives.
///
/// The scan stops at the first header that cannot be read in full, so
/// trailing garbage shorter than a header is treated as end of archive.
pub fn read_index<R: Read + Seek>(reader: &mut R) -> Result<IndexMap<u32, Entry>, ArchiveError> {
    let mut entries = IndexMap::new();
    while let Some(bytes) = read_exact_or_eof(reader, 8)? {
        let header: EntryHeader = Cursor::new(bytes).read_le()?;
        let offset = reader.stream_position()?;
        entries.insert(
            header.hash,
            Entry {
                offset,
                size: header.size,
            },
        );
        reader.seek(SeekFrom::Current(i64::from(header.size)))?;
    }
    Ok(entries)
}

/// Extract every manifest path into `out_dir`, returning the manifest.
pub fn extract<R: Read + Seek>(
    reader: &mut R,
    out_dir: &Path,
) -> Result<Vec<String>, ArchiveError> {
    let index = read_index(reader)?;
    let manifest = index
        .get(&MANIFEST_HASH)
        .copied()
        .ok_or(ArchiveError::MissingManifest)?;
    reader.seek(SeekFrom::Start(manifest.offset))?;
    let paths = read_manifest(&read_exact::<ArchiveError>(
        reader,
        manifest.size as usize,
    )?)?;

    let mut extracted = std::collections::HashSet::new();
    for path in &paths {
        info!(target: "vfsproc", "Extracting: {path}");

        let hash = hash_path(path)?;
        let entry = index
            .get(&hash)
            .copied()
            .ok_or_else(|| ArchiveError::ManifestMismatch {
                path: path.clone(),
                hash,
            })?;
        reader.seek(SeekFrom::Start(entry.offset))?;
        let data = read_exact::<ArchiveError>(reader, entry.size as usize)?;

        let dest = out_dir.join(path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, data)?;
        extracted.insert(hash);
    }

    // Every entry apart from the manifest itself must be reachable through
    // a manifest path.
    let unlisted = index
        .keys()
        .filter(|hash| **hash != MANIFEST_HASH && !extracted.contains(*hash))
        .count();
    if unlisted > 0 {
        return Err(ArchiveError::NotInManifest { count: unlisted });
    }
    Ok(paths)
}

/// Pack every file under `src_dir` into a new archive, manifest last.
///
/// The output is written strictly front to back, so any append-only sink
/// works. Entries appear in sorted directory-traversal order.
pub fn create<W: Write>(writer: &mut W, src_dir: &Path) -> Result<(), ArchiveError> {
    let paths = walk_files(src_dir)?;

    let mut seen: HashMap<u32, &str> = HashMap::new();
    seen.insert(MANIFEST_HASH, "<manifest>");
    for path in &paths {
        info!(target: "vfsproc", "Packing: {path}");

        let hash = hash_path(path)?;
        if let Some(other) = seen.insert(hash, path.as_str()) {
            return Err(ArchiveError::HashCollision {
                path: path.clone(),
                other: other.to_string(),
                hash,
            });
        }

        let data = fs::read(src_dir.join(path))?;
        let size = u32::try_from(data.len()).map_err(|_| ArchiveError::FileTooLarge {
            path: path.clone(),
            size: data.len() as u64,
        })?;
        write_entry_header(writer, hash, size)?;
        writer.write_all(&data)?;
    }

    let manifest = write_manifest(&paths);
    write_entry_header(writer, MANIFEST_HASH, manifest.len() as u32)?;
    writer.write_all(&manifest)?;
    Ok(())
}

fn write_entry_header(writer: &mut impl Write, hash: u32, size: u32) -> Result<(), ArchiveError> {
    writer.write_all(&hash.to_le_bytes())?;
    writer.write_all(&size.to_le_bytes())?;
    Ok(())
}

/// Parse the manifest string table: a u32 path count followed by that many
/// NUL-terminated ASCII paths.
fn read_manifest(bytes: &[u8]) -> Result<Vec<String>, ArchiveError> {
    let mut reader = Cursor::new(bytes);
    let count = read_exact::<ArchiveError>(&mut reader, 4)?;
    let count = u32::from_le_bytes([count[0], count[1], count[2], count[3]]);

    let mut paths = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut path = Vec::new();
        loop {
            let byte = read_exact::<ArchiveError>(&mut reader, 1)?[0];
            if byte == 0 {
                break;
            }
            path.push(byte);
        }
        let path = String::from_utf8(path.clone())
            .ok()
            .filter(|p| p.is_ascii())
            .ok_or_else(|| ArchiveError::NonAsciiPath(String::from_utf8_lossy(&path).into_owned()))?;
        paths.push(path);
    }
    Ok(paths)
}

fn write_manifest(paths: &[String]) -> Vec<u8> {
    let mut bytes = (paths.len() as u32).to_le_bytes().to_vec();
    for path in paths {
        bytes.extend_from_slice(path.as_bytes());
        bytes.push(0);
    }
    bytes
}

/// List every file under `dir` as a forward-slash relative path, in sorted
/// depth-first order.
fn walk_files(dir: &Path) -> Result<Vec<String>, ArchiveError> {
    fn visit(dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<(), ArchiveError> {
        let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let name = entry.file_name();
            let name = name
                .to_str()
                .ok_or_else(|| ArchiveError::NonAsciiPath(name.to_string_lossy().into_owned()))?;
            let path = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}/{name}")
            };
            if entry.file_type()?.is_dir() {
                visit(&entry.path(), &path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }

    let mut out = Vec::new();
    visit(dir, "", &mut out)?;
    Ok(out)
}
