//! Local storage for contestant photos.
//!
//! Files live flat in a single directory and are served back under
//! `/images/<file>`. A photo's public reference is its full URL.

use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::Utc;
use rocket::{fs::TempFile, tokio::fs};

use crate::error::{Error, Result};

/// Photos are stored and referenced through this store.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    base_url: String,
}

impl ImageStore {
    /// A store writing into `dir` and publishing under `base_url`.
    pub fn new(dir: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create the storage directory if it does not exist yet.
    pub async fn prepare(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an uploaded photo and return its public URL.
    pub async fn store(&self, upload: &mut TempFile<'_>) -> Result<String> {
        if upload.len() == 0 {
            return Err(Error::Validation("Image file is empty".to_string()));
        }
        let extension = match upload.content_type() {
            Some(content_type) if !content_type.top().as_str().eq_ignore_ascii_case("image") => {
                return Err(Error::Validation(format!(
                    "Expected an image upload, got {content_type}"
                )))
            }
            Some(content_type) => content_type
                .extension()
                .map(|ext| ext.to_string())
                .unwrap_or_else(|| "img".to_string()),
            None => "img".to_string(),
        };

        let file_name = format!(
            "{}-{:08x}.{extension}",
            Utc::now().timestamp_millis(),
            rand::random::<u32>()
        );
        upload.move_copy_to(self.dir.join(&file_name)).await?;
        debug!("Stored image {file_name}");

        Ok(format!("{}/{file_name}", self.base_url))
    }

    /// Delete the photo behind a public URL. URLs this store did not issue,
    /// and files that are already gone, are ignored.
    pub async fn remove(&self, url: &str) -> Result<()> {
        let Some(file_name) = self.file_name(url) else {
            warn!("Not removing foreign image reference {url}");
            return Ok(());
        };
        match fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => {
                debug!("Removed image {file_name}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a requested file under the storage directory.
    pub fn path_for(&self, file: &Path) -> std::io::Result<PathBuf> {
        match file.file_name() {
            Some(name) if Path::new(name) == file => Ok(self.dir.join(name)),
            _ => Err(IoError::new(ErrorKind::NotFound, "not a stored image")),
        }
    }

    /// The stored file name behind one of our public URLs.
    fn file_name<'a>(&self, url: &'a str) -> Option<&'a str> {
        let name = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        let valid = !name.is_empty() && !name.contains(['/', '\\']) && !name.starts_with('.');
        valid.then_some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_from_urls() {
        let store = ImageStore::new("/tmp/images", "http://localhost:8000/images/");

        assert_eq!(
            store.file_name("http://localhost:8000/images/1700000000000-0badf00d.png"),
            Some("1700000000000-0badf00d.png")
        );
        assert_eq!(store.file_name("http://elsewhere/images/a.png"), None);
        assert_eq!(store.file_name("http://localhost:8000/images/"), None);
        assert_eq!(store.file_name("http://localhost:8000/images/../secret"), None);
        assert_eq!(store.file_name("http://localhost:8000/images/a/b.png"), None);
        assert_eq!(store.file_name("http://localhost:8000/imagesX.png"), None);
    }

    #[test]
    fn paths_stay_inside_store() {
        let store = ImageStore::new("/tmp/images", "http://localhost:8000/images");

        assert_eq!(
            store.path_for(Path::new("a.png")).unwrap(),
            PathBuf::from("/tmp/images/a.png")
        );
        assert!(store.path_for(Path::new("nested/a.png")).is_err());
        assert!(store.path_for(Path::new("")).is_err());
    }

    #[rocket::async_test]
    async fn remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "http://localhost:8000/images");
        std::fs::write(dir.path().join("present.png"), b"png").unwrap();

        store
            .remove("http://localhost:8000/images/present.png")
            .await
            .unwrap();
        assert!(!dir.path().join("present.png").exists());

        store
            .remove("http://localhost:8000/images/absent.png")
            .await
            .unwrap();
        store.remove("https://cdn.example.com/other.png").await.unwrap();
    }
}
