//! Directory-backed document store.
//!
//! Every supported file under the root directory is one document. Its id is
//! the `/`-separated path relative to the root; image files get an `image`
//! blob field and text files a `text` field.

use std::path::{Component, Path, PathBuf};

use vindex_core::document::DocumentSource;
use vindex_types::document::{Document, DocumentId, FieldValue};
use vindex_types::error::IndexError;

/// Field holding the raw bytes of an image file.
pub const IMAGE_FIELD: &str = "image";

/// Field holding the contents of a text file.
pub const TEXT_FIELD: &str = "text";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Which field a file populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Text,
}

impl FileKind {
    /// Classify a path by extension (case-insensitive). `None` for files
    /// that are not documents.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Image)
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Text)
        } else {
            None
        }
    }
}

pub struct DirectoryDocumentStore {
    root: PathBuf,
}

impl DirectoryDocumentStore {
    /// Open a store rooted at `root`. The root is canonicalized so ids stay
    /// stable no matter how the path was spelled.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, IndexError> {
        let root = root.as_ref();
        let root = tokio::fs::canonicalize(root).await.map_err(|e| {
            IndexError::Source(format!("cannot open document root {}: {e}", root.display()))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Document id for a path under the root, or `None` if the path lies
    /// outside it.
    pub fn document_id(&self, path: &Path) -> Option<DocumentId> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(DocumentId::new(parts.join("/")))
    }

    /// Absolute path of a document id.
    pub fn document_path(&self, id: &DocumentId) -> PathBuf {
        id.as_str()
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Load the document stored at `path`.
    ///
    /// Returns `Ok(None)` for unsupported files, paths outside the root and
    /// files that no longer exist.
    pub async fn load_path(&self, path: &Path) -> Result<Option<Document>, IndexError> {
        let (Some(kind), Some(id)) = (FileKind::from_path(path), self.document_id(path)) else {
            return Ok(None);
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(IndexError::Source(format!(
                    "failed to read {}: {err}",
                    path.display()
                )));
            }
        };

        let document = match kind {
            FileKind::Image => Document::new(id).with_field(IMAGE_FIELD, FieldValue::Blob(bytes)),
            FileKind::Text => {
                let text = String::from_utf8(bytes).map_err(|_| {
                    IndexError::Source(format!("{} is not valid UTF-8", path.display()))
                })?;
                Document::new(id).with_field(TEXT_FIELD, FieldValue::Text(text))
            }
        };
        Ok(Some(document))
    }

    /// Every supported file under the root, depth first. Hidden entries are
    /// skipped.
    async fn scan(&self) -> Result<Vec<PathBuf>, IndexError> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if dir == self.root => {
                    return Err(IndexError::Source(format!(
                        "failed to list {}: {err}",
                        dir.display()
                    )));
                }
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "skipping unreadable directory");
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(path = %dir.display(), error = %err, "directory listing interrupted");
                        break;
                    }
                };

                let path = entry.path();
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                match entry.file_type().await {
                    Ok(ft) if ft.is_dir() => pending.push(path),
                    Ok(ft) if ft.is_file() && FileKind::from_path(&path).is_some() => {
                        files.push(path);
                    }
                    Ok(_) => tracing::debug!(path = %path.display(), "skipping non-document entry"),
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                    }
                }
            }
        }

        Ok(files)
    }
}

impl DocumentSource for DirectoryDocumentStore {
    async fn list(&self) -> Result<Vec<Document>, IndexError> {
        let mut documents = Vec::new();
        for path in self.scan().await? {
            match self.load_path(&path).await {
                Ok(Some(document)) => documents.push(document),
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "skipping unreadable document"),
            }
        }
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        tracing::debug!(
            root = %self.root.display(),
            documents = documents.len(),
            "scanned document directory"
        );
        Ok(documents)
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, IndexError> {
        self.load_path(&self.document_path(id)).await
    }
}
