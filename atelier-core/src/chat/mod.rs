//! Visitor chat as seen from the admin console.

pub mod desk;
pub mod model;

pub use desk::{ChatDesk, ChatError, Notice, NoticeLevel, Selection, DEFAULT_POLL_INTERVAL};
pub use model::{
    merge_messages, sort_by_recent_activity, ChatApi, ChatConversation, ChatMessage,
    ConversationFilter, ConversationStatus, SenderRole,
};
