//! Blob storage for uploaded document bytes.
//!
//! Content lives on disk under a two-level directory layout keyed by the
//! content hash prefix: `{root}/{hash[0..2]}/{hash[0..8]}.{extension}`.
//! The analysis core never interprets the bytes itself.

use std::fs;
use std::path::{Path, PathBuf};

/// On-disk store for raw document content.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Path a blob with this hash and extension is stored at.
    pub fn blob_path(&self, content_hash: &str, extension: &str) -> PathBuf {
        content_storage_path(&self.root, content_hash, extension)
    }

    /// Write content to its hash-derived path. Returns the path.
    ///
    /// Identical content maps to the same path, so a re-upload of the
    /// same bytes is a no-op overwrite.
    pub fn save(&self, content: &[u8], content_hash: &str, extension: &str) -> std::io::Result<PathBuf> {
        let path = self.blob_path(content_hash, extension);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        fs::read(path)
    }

    /// Delete a stored blob. Missing files are treated as already deleted.
    pub fn delete(&self, path: &Path) -> std::io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Construct the storage path for document content.
///
/// Uses a two-level directory structure based on hash prefix for
/// filesystem efficiency.
pub fn content_storage_path(root: &Path, content_hash: &str, extension: &str) -> PathBuf {
    root.join(&content_hash[..2])
        .join(format!("{}.{}", &content_hash[..8], extension))
}

/// Map MIME type to file extension.
pub fn mime_to_extension(mime: &str) -> &'static str {
    match mime {
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/markdown" => "md",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/rtf" => "rtf",
        _ => "bin",
    }
}

/// Detect the MIME type of uploaded content.
///
/// Magic-byte detection first, then the filename extension, then
/// text/plain for valid UTF-8, else octet-stream.
pub fn detect_mime(content: &[u8], filename: &str) -> String {
    if let Some(kind) = infer::get(content) {
        return kind.mime_type().to_string();
    }
    if let Some(mime) = mime_guess::from_path(filename).first_raw() {
        return mime.to_string();
    }
    if std::str::from_utf8(content).is_ok() {
        return "text/plain".to_string();
    }
    "application/octet-stream".to_string()
}
