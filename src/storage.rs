use std::{
    io,
    path::{Path, PathBuf},
};

use uuid::Uuid;

use crate::{constants::RECIPE_IMAGE_DIR, error::TypeError};

const IMAGE_SIGNATURES: &[&[u8]] = &[
    b"\x89PNG\r\n\x1a\n",
    b"\xff\xd8\xff",
    b"GIF87a",
    b"GIF89a",
    b"BM",
];

/// Whether the payload starts with a known image signature.
pub fn is_image(data: &[u8]) -> bool {
    let webp = data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP";
    webp || IMAGE_SIGNATURES
        .iter()
        .any(|signature| data.starts_with(signature))
}

/// Relative path for a new recipe image, `uploads/recipe/<uuid>.<ext>`.
pub fn recipe_image_file_path(filename: &str) -> Result<String, TypeError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| TypeError::new("Uploaded file has no extension"))?;

    let is_image_type = mime_guess::from_ext(&extension)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE);
    if !is_image_type {
        return Err(TypeError::new("Upload a valid image"));
    }

    Ok(format!("{RECIPE_IMAGE_DIR}/{}.{extension}", Uuid::new_v4()))
}

/// Files stored on local disk under a media root.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub async fn store(&self, relative: &str, data: &[u8]) -> io::Result<()> {
        let path = self.resolve(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await
    }

    /// Removes a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, relative: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.resolve(relative)).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result,
        }
    }
}
