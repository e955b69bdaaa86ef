use std::{fs, io::Cursor};

use hl5_lib::{
    error::ArchiveError,
    vfs::{self, MANIFEST_HASH},
};

fn push_entry(archive: &mut Vec<u8>, hash: u32, data: &[u8]) {
    archive.extend_from_slice(&hash.to_le_bytes());
    archive.extend_from_slice(&(data.len() as u32).to_le_bytes());
    archive.extend_from_slice(data);
}

fn manifest_bytes(paths: &[&str]) -> Vec<u8> {
    let mut bytes = (paths.len() as u32).to_le_bytes().to_vec();
    for path in paths {
        bytes.extend_from_slice(path.as_bytes());
        bytes.push(0);
    }
    bytes
}

#[test]
fn single_file_round_trip() {
    let mut archive = Vec::new();
    push_entry(
        &mut archive,
        vfs::hash_path("foo/bar.txt").unwrap(),
        b"ABCD",
    );
    push_entry(&mut archive, MANIFEST_HASH, &manifest_bytes(&["foo/bar.txt"]));

    let dir = tempfile::tempdir().unwrap();
    let paths = vfs::extract(&mut Cursor::new(&archive), dir.path()).unwrap();
    assert_eq!(vec!["foo/bar.txt".to_string()], paths);
    assert_eq!(b"ABCD".to_vec(), fs::read(dir.path().join("foo/bar.txt")).unwrap());

    let mut rebuilt = Vec::new();
    vfs::create(&mut rebuilt, dir.path()).unwrap();
    assert_eq!(archive, rebuilt);
}

#[test]
fn extracted_tree_matches_manifest() {
    let mut archive = Vec::new();
    push_entry(&mut archive, vfs::hash_path("a.dat").unwrap(), b"a");
    push_entry(&mut archive, vfs::hash_path("c/b.dat").unwrap(), b"bb");
    push_entry(
        &mut archive,
        MANIFEST_HASH,
        &manifest_bytes(&["a.dat", "c/b.dat"]),
    );

    let dir = tempfile::tempdir().unwrap();
    let paths = vfs::extract(&mut Cursor::new(&archive), dir.path()).unwrap();

    let mut on_disk = Vec::new();
    for entry in walkdir(dir.path()) {
        on_disk.push(entry);
    }
    on_disk.sort();
    let mut expected = paths;
    expected.sort();
    assert_eq!(expected, on_disk);
}

fn walkdir(root: &std::path::Path) -> Vec<String> {
    fn visit(dir: &std::path::Path, prefix: &str, out: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let name = entry.file_name().into_string().unwrap();
            let path = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            if entry.file_type().unwrap().is_dir() {
                visit(&entry.path(), &path, out);
            } else {
                out.push(path);
            }
        }
    }
    let mut out = Vec::new();
    visit(root, "", &mut out);
    out
}

#[test]
fn create_detects_hash_collision() {
    // "ab" and "bA" fold to the same 32-bit hash.
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("ab"), b"one").unwrap();
    fs::write(dir.path().join("bA"), b"two").unwrap();

    let result = vfs::create(&mut Vec::new(), dir.path());
    assert!(matches!(
        result,
        Err(ArchiveError::HashCollision { .. })
    ));
}

#[test]
fn extract_without_manifest_fails() {
    let mut archive = Vec::new();
    push_entry(&mut archive, 0x12345678, b"data");

    let dir = tempfile::tempdir().unwrap();
    let result = vfs::extract(&mut Cursor::new(&archive), dir.path());
    assert!(matches!(result, Err(ArchiveError::MissingManifest)));
}

#[test]
fn extract_detects_missing_entry() {
    let mut archive = Vec::new();
    push_entry(&mut archive, MANIFEST_HASH, &manifest_bytes(&["ghost.dat"]));

    let dir = tempfile::tempdir().unwrap();
    let result = vfs::extract(&mut Cursor::new(&archive), dir.path());
    assert!(matches!(
        result,
        Err(ArchiveError::ManifestMismatch { .. })
    ));
}

#[test]
fn extract_detects_unlisted_entries() {
    let mut archive = Vec::new();
    push_entry(&mut archive, vfs::hash_path("a.dat").unwrap(), b"a");
    push_entry(&mut archive, 0xDEADBEEF, b"stray");
    push_entry(&mut archive, MANIFEST_HASH, &manifest_bytes(&["a.dat"]));

    let dir = tempfile::tempdir().unwrap();
    let result = vfs::extract(&mut Cursor::new(&archive), dir.path());
    assert!(matches!(
        result,
        Err(ArchiveError::NotInManifest { count: 1 })
    ));
}
