//! Local storage for uploaded posters and actor photos, plus multipart form reading.

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
};

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

/// Public prefix under which stored files are referenced and served.
pub const PUBLIC_PREFIX: &str = "uploads/";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UploadKind {
    Poster,
    ActorPhoto,
}

impl UploadKind {
    fn dir(self) -> &'static str {
        match self {
            UploadKind::Poster => "movies",
            UploadKind::ActorPhoto => "actors",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImageFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()));

        match from_name {
            Some(ext) => ext.to_ascii_lowercase(),
            None => match self.content_type.trim_start_matches("image/") {
                "jpeg" => "jpg".to_string(),
                "svg+xml" => "svg".to_string(),
                other if other.chars().all(|c| c.is_ascii_alphanumeric()) && !other.is_empty() => {
                    other.to_string()
                },
                _ => "bin".to_string(),
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn prepare(&self) -> std::io::Result<()> {
        for kind in [UploadKind::Poster, UploadKind::ActorPhoto] {
            tokio::fs::create_dir_all(self.root.join(kind.dir())).await?;
        }
        Ok(())
    }

    /// Writes the file and returns its public path, e.g. `uploads/movies/1718000000000-3f2a.jpg`.
    pub async fn save(&self, kind: UploadKind, file: &ImageFile) -> AppResult<String> {
        let dir = self.root.join(kind.dir());
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!(
            "{}-{}.{}",
            jiff::Timestamp::now().as_millisecond(),
            uuid::Uuid::new_v4().simple(),
            file.extension()
        );
        tokio::fs::write(dir.join(&name), &file.bytes).await?;

        let public = format!("{PUBLIC_PREFIX}{}/{name}", kind.dir());
        debug!(path = %public, bytes = file.bytes.len(), "stored upload");
        Ok(public)
    }

    /// Best-effort delete of a file this kind owns. Anything else, including external URLs and
    /// files of the other kind, is left alone; failures are only logged.
    pub async fn remove(&self, kind: UploadKind, public_path: &str) {
        let Some(path) = self.resolve(kind, public_path) else {
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "removed upload"),
            Err(err) => warn!(path = %path.display(), error = %err, "failed to remove upload"),
        }
    }

    /// On-disk location of `uploads/<kind dir>/<file>`; `None` for any other shape.
    pub fn resolve(&self, kind: UploadKind, public_path: &str) -> Option<PathBuf> {
        let file = public_path.strip_prefix(PUBLIC_PREFIX)?.strip_prefix(kind.dir())?.strip_prefix('/')?;
        let mut components = Path::new(file).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Some(self.root.join(kind.dir()).join(name)),
            _ => None,
        }
    }
}

/// Whether `path` points into the local upload area rather than at an external URL.
pub fn is_local(path: &str) -> bool {
    path.starts_with(PUBLIC_PREFIX)
}

/// Text fields and file parts of a multipart body, keyed by field name.
#[derive(Debug, Default)]
pub struct FormFields {
    pub text: HashMap<String, String>,
    pub files: HashMap<String, ImageFile>,
}

impl FormFields {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut out = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::validation(format!("Malformed form data: {}", e.body_text())))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::validation(format!("Malformed form data: {}", e.body_text())))?;

            match file_name {
                // Browsers send an empty part when no file was chosen.
                Some(f) if f.is_empty() && bytes.is_empty() => {},
                Some(f) => {
                    let content_type =
                        content_type.unwrap_or_else(|| "application/octet-stream".to_string());
                    out.files.insert(name, ImageFile { file_name: Some(f), content_type, bytes });
                },
                None => {
                    let value = String::from_utf8(bytes.to_vec()).map_err(|_| {
                        AppError::validation(format!("Field {name} is not valid UTF-8"))
                    })?;
                    out.text.insert(name, value);
                },
            }
        }
        Ok(out)
    }

    /// Trimmed, non-empty text value.
    pub fn text(&self, key: &str) -> Option<String> {
        self.text.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
    }

    pub fn take_file(&mut self, key: &str) -> Option<ImageFile> {
        self.files.remove(key)
    }
}

/// Reads the whole multipart body; a missing or wrong content type is a 400 with the API's error body.
impl<S: Send + Sync> FromRequest<S> for FormFields {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        Self::read(multipart).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: Option<&str>, ct: &str) -> ImageFile {
        ImageFile {
            file_name: name.map(str::to_string),
            content_type: ct.to_string(),
            bytes: Bytes::from_static(b"\x89PNG"),
        }
    }

    #[test]
    fn extension_prefers_file_name() {
        assert_eq!(image(Some("poster.PNG"), "image/png").extension(), "png");
        assert_eq!(image(Some("poster"), "image/jpeg").extension(), "jpg");
        assert_eq!(image(None, "image/webp").extension(), "webp");
    }

    #[test]
    fn only_image_mime_types_pass() {
        assert!(image(None, "image/gif").is_image());
        assert!(!image(None, "application/pdf").is_image());
    }

    #[test]
    fn resolve_rejects_traversal_and_urls() {
        let store = UploadStore::new(PathBuf::from("/srv/uploads"));
        assert_eq!(
            store.resolve(UploadKind::Poster, "uploads/movies/a.jpg"),
            Some(PathBuf::from("/srv/uploads/movies/a.jpg"))
        );
        assert_eq!(store.resolve(UploadKind::Poster, "uploads/../etc/passwd"), None);
        assert_eq!(store.resolve(UploadKind::Poster, "uploads/movies/../actors/a.jpg"), None);
        assert_eq!(store.resolve(UploadKind::Poster, "uploads/movies/nested/a.jpg"), None);
        assert_eq!(store.resolve(UploadKind::ActorPhoto, "https://image.example/t/p/w500/x.jpg"), None);
    }

    #[test]
    fn resolve_is_scoped_to_kind() {
        let store = UploadStore::new(PathBuf::from("/srv/uploads"));
        assert_eq!(store.resolve(UploadKind::ActorPhoto, "uploads/movies/a.jpg"), None);
        assert_eq!(store.resolve(UploadKind::Poster, "uploads/actors/a.jpg"), None);
        assert_eq!(store.resolve(UploadKind::Poster, "uploads/moviesx/a.jpg"), None);
        assert_eq!(
            store.resolve(UploadKind::ActorPhoto, "uploads/actors/a.jpg"),
            Some(PathBuf::from("/srv/uploads/actors/a.jpg"))
        );
    }

    #[tokio::test]
    async fn save_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf());
        let path = store.save(UploadKind::Poster, &image(Some("p.png"), "image/png")).await.unwrap();
        assert!(path.starts_with("uploads/movies/"));
        let on_disk = store.resolve(UploadKind::Poster, &path).unwrap();
        assert!(on_disk.exists());

        // The actor side never touches posters.
        store.remove(UploadKind::ActorPhoto, &path).await;
        assert!(on_disk.exists());

        store.remove(UploadKind::Poster, &path).await;
        assert!(!on_disk.exists());
    }
}
