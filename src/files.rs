//! Local file reads for history text and portraits, and JSON downloads.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

use crate::repository::ExportSink;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("{path:?} is not {expected}")]
    TypeRejected {
        path: PathBuf,
        expected: &'static str,
    },
    #[error("error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Media type for the image formats a portrait may use.
pub fn image_media_type(path: &Path) -> Option<&'static str> {
    match extension(path)?.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Reads a plain-text (`.txt`) history file.
pub fn read_text_file<P: AsRef<Path>>(path: P) -> Result<String, FileError> {
    let path = path.as_ref();
    if extension(path).as_deref() != Some("txt") {
        return Err(FileError::TypeRejected {
            path: path.to_path_buf(),
            expected: "a plain text (.txt) file",
        });
    }
    fs::read_to_string(path).map_err(|source| FileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads an image and encodes it as a `data:` URL.
pub fn read_image_as_data_url<P: AsRef<Path>>(path: P) -> Result<String, FileError> {
    let path = path.as_ref();
    let media_type = image_media_type(path).ok_or_else(|| FileError::TypeRejected {
        path: path.to_path_buf(),
        expected: "an image",
    })?;
    let bytes = fs::read(path).map_err(|source| FileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(format!("data:{};base64,{}", media_type, BASE64.encode(bytes)))
}

/// Writes each exported character to `<dir>/<file name>`.
#[derive(Debug, Clone)]
pub struct DirectoryExporter {
    dir: PathBuf,
}

impl DirectoryExporter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExportSink for DirectoryExporter {
    fn export(&self, file_name: &str, json: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("error creating export directory {:?}", self.dir))?;
        let path = self.dir.join(file_name);
        fs::write(&path, json).with_context(|| format!("error writing {:?}", path))?;
        log::info!("Exported {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_only_text_files() {
        let dir = tempfile::tempdir().unwrap();
        let history = dir.path().join("kael.TXT");
        fs::write(&history, "Born under a red sky.").unwrap();
        let markdown = dir.path().join("kael.md");
        fs::write(&markdown, "# Kael").unwrap();

        assert_eq!(read_text_file(&history).unwrap(), "Born under a red sky.");
        assert!(matches!(
            read_text_file(&markdown),
            Err(FileError::TypeRejected { .. })
        ));
        assert!(matches!(
            read_text_file(dir.path().join("missing.txt")),
            Err(FileError::Io { .. })
        ));
    }

    #[test]
    fn encodes_images_as_data_urls() {
        let dir = tempfile::tempdir().unwrap();
        let portrait = dir.path().join("kael.png");
        fs::write(&portrait, [0x89, b'P', b'N', b'G']).unwrap();

        assert_eq!(
            read_image_as_data_url(&portrait).unwrap(),
            "data:image/png;base64,iVBORw=="
        );

        let text = dir.path().join("kael.txt");
        fs::write(&text, "not a picture").unwrap();
        assert!(matches!(
            read_image_as_data_url(&text),
            Err(FileError::TypeRejected { .. })
        ));
    }

    #[test]
    fn recognises_image_media_types() {
        let cases = [
            ("a.png", Some("image/png")),
            ("a.JPG", Some("image/jpeg")),
            ("a.jpeg", Some("image/jpeg")),
            ("a.svg", Some("image/svg+xml")),
            ("a.tiff", None),
            ("noext", None),
        ];
        for (input, expected) in cases {
            assert_eq!(expected, image_media_type(Path::new(input)));
        }
    }

    #[test]
    fn exporter_writes_into_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = DirectoryExporter::new(dir.path().join("exports"));

        exporter.export("Kael.json", "{}").unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("exports").join("Kael.json")).unwrap(),
            "{}"
        );
    }
}
