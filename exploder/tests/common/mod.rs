use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::ZipWriter;

pub const SUFFIX: &str = ".arc";

/// Builds an application archive entry by entry, in stored order.
#[derive(Default)]
pub struct ArchiveBuilder {
    prefix: Vec<u8>,
    entries: Vec<(String, Option<Vec<u8>>)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written before the zip, standing in for the bootstrap binary.
    pub fn stub(mut self, prefix: &[u8]) -> Self {
        self.prefix = prefix.to_vec();
        self
    }

    pub fn manifest(self, text: &str) -> Self {
        self.file("META-INF/MANIFEST.MF", text.as_bytes())
    }

    pub fn start_class(self, name: &str) -> Self {
        self.manifest(&format!("Manifest-Version: 1.0\r\nStart-Class: {}\r\n\r\n", name))
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push((name.to_string(), None));
        self
    }

    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        self.entries.push((name.to_string(), Some(data.to_vec())));
        self
    }

    /// A nested library; its contents are irrelevant to `StaticLoader`.
    pub fn library(self, name: &str) -> Self {
        self.file(name, b"\0library\0")
    }

    pub fn write(self, path: &Path) -> PathBuf {
        let mut file = File::create(path).unwrap();
        file.write_all(&self.prefix).unwrap();

        let mut zip = ZipWriter::new(file);
        for (name, data) in self.entries {
            match data {
                None => zip.add_directory(name, FileOptions::default()).unwrap(),
                Some(data) => {
                    zip.start_file(name, FileOptions::default()).unwrap();
                    zip.write_all(&data).unwrap();
                }
            }
        }
        zip.finish().unwrap();
        path.to_path_buf()
    }
}

pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
