use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::ids::{ConversationId, MessageId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    /// Terminal. A closed conversation never becomes active again.
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Who wrote a message. Anything that isn't site staff is a visitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Admin,
    Staff,
    #[default]
    #[serde(other)]
    Visitor,
}

impl SenderRole {
    /// True for roles answering from the admin console
    pub fn is_operator(&self) -> bool {
        matches!(self, SenderRole::Admin | SenderRole::Staff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConversation {
    pub id: ConversationId,
    #[serde(default)]
    pub status: ConversationStatus,
    #[serde(default)]
    pub visitor_name: Option<String>,
    #[serde(default)]
    pub visitor_email: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    /// Visitor messages the admin side has not seen yet
    #[serde(default)]
    pub unread_admin: u32,
}

impl ChatConversation {
    pub fn is_closed(&self) -> bool {
        self.status == ConversationStatus::Closed
    }

    pub fn display_name(&self) -> &str {
        self.visitor_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Visitor")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub sender_role: SenderRole,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

/// Query for the admin conversation list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    pub search: Option<String>,
}

impl ConversationFilter {
    /// Query-string pairs, skipping unset and blank values
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_owned()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_owned()));
        }
        pairs
    }
}

/// Chat endpoints of the REST API
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_conversations(&self, filter: &ConversationFilter) -> Result<Vec<ChatConversation>, ApiError>;

    async fn fetch_messages(&self, id: &ConversationId) -> Result<Vec<ChatMessage>, ApiError>;

    async fn send_message(&self, id: &ConversationId, text: &str) -> Result<ChatMessage, ApiError>;

    async fn mark_read(&self, id: &ConversationId) -> Result<(), ApiError>;

    async fn close_conversation(&self, id: &ConversationId) -> Result<(), ApiError>;
}

/// Most recent activity first; conversations without messages sink to the bottom
pub fn sort_by_recent_activity(conversations: &mut [ChatConversation]) {
    conversations.sort_by(|a, b| match (a.last_message_at, b.last_message_at) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Reconcile a fetched message list with the local one.
///
/// The fetched list wins. Local messages it doesn't contain yet are kept only
/// if they are at least as new as its last message (an optimistic send the
/// server hadn't returned at fetch time). Duplicate ids are dropped.
pub fn merge_messages(local: &[ChatMessage], fetched: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut merged: Vec<ChatMessage> = Vec::with_capacity(fetched.len());
    for message in fetched {
        if !merged.iter().any(|m| m.id == message.id) {
            merged.push(message);
        }
    }

    let newest = merged.iter().map(|m| m.created_at).max();
    for message in local {
        let pending = newest.map_or(true, |newest| message.created_at >= newest);
        if pending && !merged.iter().any(|m| m.id == message.id) {
            merged.push(message.clone());
        }
    }
    merged
}
