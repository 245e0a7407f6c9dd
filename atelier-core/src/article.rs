//! Articles as the REST API stores them, and the payload the editor submits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ArticleDraft;
use crate::error::{ApiError, ValidationError};
use crate::ids::ArticleId;

/// Maximum title length accepted before submission
const MAX_TITLE_LEN: usize = 200;

/// Maximum excerpt length accepted before submission
const MAX_EXCERPT_LEN: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
}

/// An article as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub status: ArticleStatus,
    #[serde(default)]
    pub author: Option<String>,
    /// Legacy body or block envelope, see [`crate::content::codec`]
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Editor view of the body
    pub fn draft(&self) -> ArticleDraft {
        ArticleDraft::from_content(&self.content)
    }
}

/// Body of create/update requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticlePayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub status: ArticleStatus,
    pub content: String,
}

impl ArticlePayload {
    /// Build a payload from a draft, encoding its blocks into `content`
    pub fn from_draft(title: impl Into<String>, draft: &ArticleDraft) -> Self {
        Self {
            title: title.into(),
            content: draft.to_content(),
            ..Default::default()
        }
    }

    /// Required-field checks run before any request is sent
    pub fn validate(&self) -> Result<(), ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::Empty { field: "title" });
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ValidationError::TooLong {
                field: "title",
                max: MAX_TITLE_LEN,
            });
        }
        if let Some(excerpt) = &self.excerpt {
            if excerpt.chars().count() > MAX_EXCERPT_LEN {
                return Err(ValidationError::TooLong {
                    field: "excerpt",
                    max: MAX_EXCERPT_LEN,
                });
            }
        }
        if ArticleDraft::from_content(&self.content).is_empty() {
            return Err(ValidationError::Empty { field: "content" });
        }
        Ok(())
    }
}

/// A file to send to the image upload endpoint
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// URLs the API returns for one uploaded image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrls {
    #[serde(default)]
    pub featured: Option<String>,
    #[serde(default)]
    pub original: Option<String>,
}

impl ImageUrls {
    /// URL placed into an image block: the original, else the featured crop
    pub fn preferred(&self) -> Option<&str> {
        self.original
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.featured.as_deref().filter(|url| !url.trim().is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub urls: ImageUrls,
}

/// Article endpoints of the REST API
#[async_trait]
pub trait ArticleApi: Send + Sync {
    async fn get_article(&self, id: &ArticleId) -> Result<Article, ApiError>;

    async fn create_article(&self, payload: &ArticlePayload) -> Result<Article, ApiError>;

    async fn update_article(&self, id: &ArticleId, payload: &ArticlePayload) -> Result<Article, ApiError>;

    async fn upload_images(&self, files: Vec<ImageUpload>) -> Result<Vec<UploadedImage>, ApiError>;
}
