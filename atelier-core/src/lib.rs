pub mod article;
pub mod chat;
pub mod config;
pub mod content;
pub mod error;
pub mod ids;

pub use article::{Article, ArticleApi, ArticlePayload, ArticleStatus, ImageUpload, ImageUrls, UploadedImage};
pub use chat::{ChatApi, ChatConversation, ChatDesk, ChatError, ChatMessage, ConversationFilter, ConversationStatus, Notice};
pub use config::AtelierConfig;
pub use content::{ArticleDraft, ContentBlock, DecodedContent, SourceCitation};
pub use error::{ApiError, AtelierError, ValidationError};
pub use ids::{ArticleId, ConversationId, MessageId};
