//! Drives a full extract or create over a base directory.
//!
//! An extracted tree looks like:
//!
//! ```text
//! base_dir/
//!   vfs.json      tool version and extraction mode
//!   raw/          every archive file, byte for byte
//!   quest/ ...    one editable subdirectory per processor
//! ```
//!
//! Creation stages a copy of `raw/` under `.tmp/`, lets every processor
//! overwrite its targets from the editable files, and packs the staging
//! tree. Files no processor claims are thereby preserved bit-identically.
use std::{
    fs,
    io::{Read, Seek, Write},
    path::Path,
};

use anyhow::{bail, Context};
use hl5_lib::{proc::processors, vfs, Diagnostics};
use serde::{Deserialize, Serialize};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Marks a staging tree as ours. A `.tmp/` without it is never deleted.
const STAGING_MARKER: &str = ".hl5_tool_staging";

#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    version: String,
    raw_only: bool,
}

pub fn extract<R: Read + Seek>(
    archive: &mut R,
    base_dir: &Path,
    raw_only: bool,
    diag: &mut Diagnostics,
) -> anyhow::Result<()> {
    fs::create_dir_all(base_dir)?;
    let meta = Meta {
        version: VERSION.to_string(),
        raw_only,
    };
    serde_json::to_writer(fs::File::create(base_dir.join("vfs.json"))?, &meta)?;

    let raw_dir = base_dir.join("raw");
    fs::create_dir_all(&raw_dir)?;
    vfs::extract(archive, &raw_dir)?;

    if raw_only {
        return Ok(());
    }
    for processor in processors() {
        processor.disassemble_all(base_dir, diag)?;
    }
    Ok(())
}

pub fn create<W: Write>(
    archive: &mut W,
    base_dir: &Path,
    diag: &mut Diagnostics,
) -> anyhow::Result<()> {
    let meta_path = base_dir.join("vfs.json");
    let meta: Meta = serde_json::from_reader(
        fs::File::open(&meta_path)
            .with_context(|| format!("cannot open {}", meta_path.display()))?,
    )?;
    if meta.version != VERSION {
        bail!(
            "incompatible version number in the extracted archive, expected {VERSION} but got {}",
            meta.version
        );
    }

    let raw_dir = base_dir.join("raw");
    if meta.raw_only {
        vfs::create(archive, &raw_dir)?;
        return Ok(());
    }

    let staging = base_dir.join(".tmp");
    if staging.exists() {
        if !staging.join(STAGING_MARKER).exists() {
            bail!(
                "{} exists but is not a staging tree from a previous run, refusing to delete it",
                staging.display()
            );
        }
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;
    fs::write(staging.join(STAGING_MARKER), [])?;
    copy_tree(&raw_dir, &staging)?;

    for processor in processors() {
        processor.assemble_all(base_dir, &staging, diag)?;
    }

    // The marker must not end up inside the archive.
    fs::remove_file(staging.join(STAGING_MARKER))?;
    vfs::create(archive, &staging)?;
    Ok(())
}

fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&target)?;
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
