//! Collaborator traits: local ROM access and image rendering.
//!
//! The catalog application implements these. `RomSource` hides whether a
//! ROM sits loose on disk or inside an archive; `ImageRenderer` hides
//! where artwork comes from and how it is resized.

use std::io;
use std::path::{Path, PathBuf};

use romhoard_device::ImageKind;

use crate::types::RomFile;

/// A ROM materialized on the local filesystem for the duration of one
/// upload. Dropping the handle releases any temporary extraction.
pub trait LocalRom: std::fmt::Debug {
    /// Path to the readable file.
    fn path(&self) -> &Path;
    /// Display filename, which may differ from the catalog name when the
    /// ROM was extracted from an archive.
    fn file_name(&self) -> &str;
}

/// Resolves catalog ROMs to locally readable files.
pub trait RomSource {
    /// Materializes `rom`, extracting from an archive if needed.
    ///
    /// Errors mean the local file is missing or unreadable; the batch
    /// records such files as failed and moves on.
    fn open_rom(&self, rom: &RomFile) -> io::Result<Box<dyn LocalRom + '_>>;
}

/// A ROM that already sits unarchived on the local filesystem.
#[derive(Debug)]
pub struct LooseRom {
    path: PathBuf,
    file_name: String,
}

impl LooseRom {
    pub fn new(path: PathBuf, file_name: String) -> Self {
        Self { path, file_name }
    }
}

impl LocalRom for LooseRom {
    fn path(&self) -> &Path {
        &self.path
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Serves loose ROM files out of a single directory, keyed by file name.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RomSource for DirectorySource {
    fn open_rom(&self, rom: &RomFile) -> io::Result<Box<dyn LocalRom + '_>> {
        let path = self.root.join(&rom.file_name);
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ));
        }
        Ok(Box::new(LooseRom::new(path, rom.file_name.clone())))
    }
}

/// Encoded image bytes ready to upload.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub data: Vec<u8>,
    pub extension: String,
}

/// Produces the companion image for a ROM's game.
pub trait ImageRenderer {
    /// Returns the encoded image, resized to `max_width` when set, or
    /// `None` when the game has no suitable image.
    fn render(&self, rom: &RomFile, kind: ImageKind, max_width: Option<u32>)
    -> Option<RenderedImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom(file_name: &str) -> RomFile {
        RomFile {
            game_id: 1,
            game_name: "Test".into(),
            system_slug: "gba".into(),
            file_name: file_name.into(),
            file_size: 4,
        }
    }

    #[test]
    fn directory_source_serves_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mario.gba"), b"ROM!").unwrap();

        let source = DirectorySource::new(dir.path());
        let local = source.open_rom(&rom("mario.gba")).unwrap();
        assert_eq!(local.file_name(), "mario.gba");
        assert_eq!(std::fs::read(local.path()).unwrap(), b"ROM!");
    }

    #[test]
    fn directory_source_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        let err = source.open_rom(&rom("absent.gba")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
