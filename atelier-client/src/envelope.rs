//! Response shapes. Every endpoint answers either with the bare value or with
//! the value wrapped under a single key; both are accepted.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use atelier_core::article::{Article, UploadedImage};
use atelier_core::chat::{ChatConversation, ChatMessage};
use atelier_core::error::ApiError;

#[derive(Deserialize)]
#[serde(untagged)]
enum ArticleEnvelope {
    Wrapped { article: Article },
    Bare(Article),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConversationsEnvelope {
    Wrapped { conversations: Vec<ChatConversation> },
    Bare(Vec<ChatConversation>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessagesEnvelope {
    Wrapped { messages: Vec<ChatMessage> },
    Bare(Vec<ChatMessage>),
}

// A bare message also has a "message" key, but a string one, so the wrapped
// variant cannot match it
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageEnvelope {
    Wrapped { message: ChatMessage },
    Bare(ChatMessage),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImagesEnvelope {
    Wrapped { images: Vec<UploadedImage> },
    Bare(Vec<UploadedImage>),
}

fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|err| ApiError::Decode(format!("{what}: {err}")))
}

pub fn parse_article(body: &str) -> Result<Article, ApiError> {
    Ok(match decode(body, "article")? {
        ArticleEnvelope::Wrapped { article } => article,
        ArticleEnvelope::Bare(article) => article,
    })
}

pub fn parse_conversations(body: &str) -> Result<Vec<ChatConversation>, ApiError> {
    Ok(match decode(body, "conversations")? {
        ConversationsEnvelope::Wrapped { conversations } => conversations,
        ConversationsEnvelope::Bare(conversations) => conversations,
    })
}

pub fn parse_messages(body: &str) -> Result<Vec<ChatMessage>, ApiError> {
    Ok(match decode(body, "messages")? {
        MessagesEnvelope::Wrapped { messages } => messages,
        MessagesEnvelope::Bare(messages) => messages,
    })
}

pub fn parse_message(body: &str) -> Result<ChatMessage, ApiError> {
    Ok(match decode(body, "message")? {
        MessageEnvelope::Wrapped { message } => message,
        MessageEnvelope::Bare(message) => message,
    })
}

pub fn parse_images(body: &str) -> Result<Vec<UploadedImage>, ApiError> {
    Ok(match decode(body, "images")? {
        ImagesEnvelope::Wrapped { images } => images,
        ImagesEnvelope::Bare(images) => images,
    })
}

/// Human-readable part of an error body: its "error" or "message" string if
/// it is JSON, the raw body otherwise
pub fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error.or(parsed.message))
        .unwrap_or_else(|| body.trim().to_owned())
}
