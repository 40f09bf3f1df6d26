//! Font acquisition backends.
//!
//! A provider makes a font family usable for measurement and drawing by
//! loading its bytes into the shared [`FontBook`]. The remote provider
//! downloads TTF files over HTTP; the directory provider reads them from
//! disk. Callers never see where the bytes came from — the
//! [`FontService`](super::FontService) wraps every acquisition in a timeout
//! and concurrency bound.

use ab_glyph::FontArc;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use super::FontBook;
use crate::error::SelloError;

/// Default remote font root (Google Fonts OFL mirror layout:
/// `<base>/<slug>/<Family>-Regular.ttf`).
pub const DEFAULT_FONT_BASE_URL: &str = "https://raw.githubusercontent.com/google/fonts/main/ofl";

/// Makes one font family usable, or fails.
#[async_trait]
pub trait FontProvider: Send + Sync {
    async fn acquire(&self, family: &str) -> Result<(), SelloError>;
}

/// Downloads font files over HTTP and registers them in the font book.
pub struct RemoteFontProvider {
    client: reqwest::Client,
    base_url: String,
    book: Arc<FontBook>,
}

impl RemoteFontProvider {
    pub fn new(book: Arc<FontBook>) -> Result<Self, SelloError> {
        Self::with_base_url(book, DEFAULT_FONT_BASE_URL)
    }

    pub fn with_base_url(book: Arc<FontBook>, base_url: &str) -> Result<Self, SelloError> {
        let client = reqwest::Client::builder()
            .user_agent("sello/0.1")
            .build()
            .map_err(|e| SelloError::Font(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            book,
        })
    }

    fn family_url(&self, family: &str) -> String {
        let slug = family.to_lowercase().replace(' ', "");
        let file = family.replace(' ', "");
        format!("{}/{}/{}-Regular.ttf", self.base_url, slug, file)
    }
}

#[async_trait]
impl FontProvider for RemoteFontProvider {
    async fn acquire(&self, family: &str) -> Result<(), SelloError> {
        if self.book.contains(family) {
            return Ok(());
        }

        let url = self.family_url(family);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SelloError::Font(format!("Failed to download {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(SelloError::Font(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SelloError::Font(format!("Failed to read font data: {}", e)))?;

        let font = FontArc::try_from_vec(bytes.to_vec())
            .map_err(|e| SelloError::Font(format!("Invalid font file for '{}': {}", family, e)))?;
        self.book.insert(family, font);
        Ok(())
    }
}

/// Reads `<dir>/<family-slug>.ttf` files from a local directory.
pub struct DirFontProvider {
    dir: PathBuf,
    book: Arc<FontBook>,
}

impl DirFontProvider {
    pub fn new(dir: impl Into<PathBuf>, book: Arc<FontBook>) -> Self {
        Self {
            dir: dir.into(),
            book,
        }
    }
}

#[async_trait]
impl FontProvider for DirFontProvider {
    async fn acquire(&self, family: &str) -> Result<(), SelloError> {
        if self.book.contains(family) {
            return Ok(());
        }

        let slug = family.to_lowercase().replace(' ', "-");
        let path = self.dir.join(format!("{}.ttf", slug));
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| SelloError::Font(format!("Failed to read {}: {}", path.display(), e)))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| SelloError::Font(format!("Invalid font file for '{}': {}", family, e)))?;
        self.book.insert(family, font);
        Ok(())
    }
}
