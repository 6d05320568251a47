//! Shared helpers for building package fixtures in integration tests.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

/// Builds an in-memory zip from `(path, bytes)` pairs. Paths ending in `/`
/// become directory entries.
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in files {
        if name.ends_with('/') {
            writer
                .add_directory(*name, SimpleFileOptions::default())
                .expect("add directory");
        } else {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start file");
            writer.write_all(bytes).expect("write entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Writes a package fixture to disk and returns its path.
pub fn write_package(
    dir: &std::path::Path,
    name: &str,
    files: &[(&str, &[u8])],
) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, zip_bytes(files)).expect("write package");
    path
}
