//! Local filesystem storage for uploaded recipe images.
//!
//! Files live under the configured media root and are referenced by a path relative to it,
//! e.g. `recipe/3f0c....png`. The router serves the same directory read-only under the
//! media URL prefix.

use anyhow::Context;
use std::path::{Component, Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::errors::Result;

/// Subdirectory for recipe images
const RECIPE_DIR: &str = "recipe";

/// Image formats accepted for upload, recognized by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl ImageFormat {
    /// Identify the format from the start of the file, ignoring any client-supplied type.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

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

    /// Write a recipe image under a fresh name and return its relative path
    pub async fn store_recipe_image(&self, content: &[u8], format: ImageFormat) -> Result<String> {
        let relative_path = format!("{RECIPE_DIR}/{}.{}", Uuid::new_v4(), format.extension());
        let full_path = self.root.join(&relative_path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create media directory {}", parent.display()))?;
        }

        let mut file = fs::File::create(&full_path)
            .await
            .with_context(|| format!("create media file {}", full_path.display()))?;
        file.write_all(content).await.context("write media file")?;
        file.sync_all().await.context("sync media file")?;

        tracing::debug!(path = %relative_path, size = content.len(), "Stored recipe image");
        Ok(relative_path)
    }

    /// Remove a previously stored file. Missing files and paths that would escape the
    /// media root are ignored.
    pub async fn delete(&self, relative_path: &str) -> Result<()> {
        let relative = Path::new(relative_path);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            tracing::warn!(path = relative_path, "Refusing to delete media path outside the media root");
            return Ok(());
        }

        match fs::remove_file(self.root.join(relative)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context(format!("remove media file {relative_path}")).into()),
        }
    }
}
