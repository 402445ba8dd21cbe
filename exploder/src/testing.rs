//! Archive builders shared by the unit tests.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::write::FileOptions;
use zip::ZipWriter;

use crate::manifest::MANIFEST_PATH;

pub(crate) enum Entry<'a> {
    Dir(&'a str),
    File(&'a str, &'a [u8]),
    Manifest(&'a str),
}

/// Writes `prefix` followed by a zip holding `entries` in the given order.
pub(crate) fn write_archive(path: &Path, prefix: &[u8], entries: &[Entry<'_>]) {
    let mut file = File::create(path).unwrap();
    file.write_all(prefix).unwrap();

    let mut zip = ZipWriter::new(file);
    for entry in entries {
        match entry {
            Entry::Dir(name) => zip.add_directory(*name, FileOptions::default()).unwrap(),
            Entry::File(name, data) => {
                zip.start_file(*name, FileOptions::default()).unwrap();
                zip.write_all(data).unwrap();
            }
            Entry::Manifest(text) => {
                zip.start_file(MANIFEST_PATH, FileOptions::default()).unwrap();
                zip.write_all(text.as_bytes()).unwrap();
            }
        }
    }
    zip.finish().unwrap();
}
