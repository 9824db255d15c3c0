//! Read-only asset access for shader sources and includes.
//!
//! The renderer only ever needs "give me the complete contents of a named
//! file, or tell me it is missing". Names use `/` separators regardless of
//! platform so the same names work for a directory tree or an in-memory
//! table.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

pub trait AssetSource {
    /// Returns the complete content of the named file. Partial reads do not
    /// exist at this interface; any failure is reported as the error.
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;

    fn read_to_string(&self, name: &str) -> io::Result<String> {
        let bytes = self.read(name)?;
        String::from_utf8(bytes)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

/// Assets rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DirSource {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        let mut path = self.root.clone();
        path.extend(name.split('/'));
        std::fs::read(path)
    }
}

/// In-memory assets, used by tests and embedding experiments.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), content.into());
    }
}

impl AssetSource for MemorySource {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_source_reads_nested_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("shaders")).unwrap();
        std::fs::write(dir.path().join("shaders/a.glsl"), "float x;").unwrap();

        let source = DirSource::new(dir.path());
        assert_eq!(source.read_to_string("shaders/a.glsl").unwrap(), "float x;");
        assert!(source.read("shaders/missing.glsl").is_err());
    }

    #[test]
    fn memory_source_signals_missing() {
        let mut source = MemorySource::new();
        source.insert("a", "hello");
        assert_eq!(source.read("a").unwrap(), b"hello");
        let err = source.read("b").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
