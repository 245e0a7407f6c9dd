//! Admin chat console state with background message polling.
//!
//! ```text
//!   Idle ──select(A)──▶ Selected(A): foreground fetch, then poll every tick
//!    ▲                      │  select(B): abort A's poller, start over for B
//!    └──────deselect────────┘  drop: poller aborted
//! ```
//!
//! Every successful fetch zeroes the local unread badge and marks the
//! conversation read on the server. Failures are logged and published as
//! [`Notice`]s; they never stop the poller and never undo optimistic updates.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use super::model::{
    merge_messages, sort_by_recent_activity, ChatApi, ChatConversation, ChatMessage,
    ConversationFilter, ConversationStatus,
};
use crate::error::{ApiError, ValidationError};
use crate::ids::ConversationId;

/// Poll period used when none is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
const NOTICE_CAPACITY: usize = 32;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("no conversation selected")]
    NoSelection,

    #[error("conversation {0} is closed")]
    Closed(ConversationId),

    #[error("conversation {0} is not in the conversation list")]
    Unlisted(ConversationId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient, dismissible message for the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// The open conversation and its cached messages
#[derive(Debug, Clone)]
pub struct Selection {
    pub conversation_id: ConversationId,
    /// `None` until the conversation shows up in the list
    pub status: Option<ConversationStatus>,
    pub messages: Vec<ChatMessage>,
    /// Set only while the foreground load after selection is in flight
    pub loading: bool,
}

#[derive(Debug, Default)]
struct DeskState {
    conversations: Vec<ChatConversation>,
    selection: Option<Selection>,
}

impl DeskState {
    fn conversation_mut(&mut self, id: &ConversationId) -> Option<&mut ChatConversation> {
        self.conversations.iter_mut().find(|c| &c.id == id)
    }

    fn selected_mut(&mut self, id: &ConversationId) -> Option<&mut Selection> {
        self.selection
            .as_mut()
            .filter(|selection| &selection.conversation_id == id)
    }

    /// Selected id and its status. Closed on either copy wins.
    fn selected_status(&self) -> Result<(ConversationId, Option<ConversationStatus>), ChatError> {
        let selection = self.selection.as_ref().ok_or(ChatError::NoSelection)?;
        let listed = self
            .conversations
            .iter()
            .find(|c| c.id == selection.conversation_id)
            .map(|c| c.status);
        let status = if selection.status == Some(ConversationStatus::Closed)
            || listed == Some(ConversationStatus::Closed)
        {
            Some(ConversationStatus::Closed)
        } else {
            listed.or(selection.status)
        };
        Ok((selection.conversation_id.clone(), status))
    }
}

/// Background poll task. Aborted when dropped.
struct PollTask {
    conversation_id: ConversationId,
    handle: JoinHandle<()>,
}

impl Drop for PollTask {
    fn drop(&mut self) {
        debug!(conversation = %self.conversation_id, "stopping message poll");
        self.handle.abort();
    }
}

/// Admin view over the chat API: conversation list, one selected
/// conversation, and the poller keeping it fresh.
pub struct ChatDesk {
    api: Arc<dyn ChatApi>,
    state: Arc<RwLock<DeskState>>,
    notices: broadcast::Sender<Notice>,
    poll_interval: Duration,
    poller: Option<PollTask>,
}

impl ChatDesk {
    pub fn new(api: Arc<dyn ChatApi>, poll_interval: Duration) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            api,
            state: Arc::new(RwLock::new(DeskState::default())),
            notices,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            poller: None,
        }
    }

    /// Receive notices published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// True while a poller is running for the selected conversation
    pub fn is_polling(&self) -> bool {
        self.poller
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    pub async fn conversations(&self) -> Vec<ChatConversation> {
        self.state.read().await.conversations.clone()
    }

    pub async fn selection(&self) -> Option<Selection> {
        self.state.read().await.selection.clone()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state
            .read()
            .await
            .selection
            .as_ref()
            .map(|selection| selection.messages.clone())
            .unwrap_or_default()
    }

    /// Reload the conversation list.
    ///
    /// The selected conversation keeps a zero unread count, and a locally
    /// closed conversation stays closed even if the list is older than the
    /// close. A close reported by the server carries over to the selection.
    #[instrument(skip(self))]
    pub async fn refresh_conversations(
        &mut self,
        filter: &ConversationFilter,
    ) -> Result<Vec<ChatConversation>, ChatError> {
        let mut fetched = match self.api.list_conversations(filter).await {
            Ok(list) => list,
            Err(err) => {
                report(&self.notices, "Failed to load conversations", &err);
                return Err(err.into());
            }
        };

        let mut state = self.state.write().await;
        let selected = state
            .selection
            .as_ref()
            .map(|selection| selection.conversation_id.clone());
        for conversation in &mut fetched {
            if selected.as_ref() == Some(&conversation.id) {
                conversation.unread_admin = 0;
            }
            let closed_locally = state
                .conversations
                .iter()
                .any(|local| local.id == conversation.id && local.is_closed());
            if closed_locally {
                conversation.status = ConversationStatus::Closed;
            }
        }
        if let Some(id) = &selected {
            let listed = fetched.iter().find(|c| &c.id == id).map(|c| c.status);
            if let (Some(status), Some(selection)) = (listed, state.selection.as_mut()) {
                if selection.status != Some(ConversationStatus::Closed) {
                    selection.status = Some(status);
                }
            }
        }
        sort_by_recent_activity(&mut fetched);
        state.conversations = fetched;
        debug!(count = state.conversations.len(), "conversation list refreshed");
        Ok(state.conversations.clone())
    }

    /// Open a conversation: load its messages now, then keep polling.
    ///
    /// Any previous poller is torn down before anything else happens. The
    /// poller is started even if the first load fails; its next tick retries.
    #[instrument(skip(self), fields(conversation = %id))]
    pub async fn select(&mut self, id: ConversationId) -> Result<(), ChatError> {
        self.cancel_poll();

        {
            let mut state = self.state.write().await;
            let status = state.conversation_mut(&id).map(|c| c.status);
            state.selection = Some(Selection {
                conversation_id: id.clone(),
                status,
                messages: Vec::new(),
                loading: true,
            });
        }

        let result = sync_messages(self.api.as_ref(), &self.state, &self.notices, &id).await;
        self.poller = Some(self.spawn_poller(id));
        result
    }

    /// Close the selection and stop polling
    pub async fn deselect(&mut self) {
        self.cancel_poll();
        self.state.write().await.selection = None;
    }

    /// Fetch the selected conversation's messages immediately
    pub async fn refresh_messages(&self) -> Result<(), ChatError> {
        let id = self.selected_id().await.ok_or(ChatError::NoSelection)?;
        sync_messages(self.api.as_ref(), &self.state, &self.notices, &id).await
    }

    pub async fn selected_id(&self) -> Option<ConversationId> {
        self.state
            .read()
            .await
            .selection
            .as_ref()
            .map(|selection| selection.conversation_id.clone())
    }

    /// Send a reply in the selected conversation.
    ///
    /// Refused without a network call when nothing is selected, the
    /// conversation is closed or missing from the list, or the text is
    /// blank. On success the returned message is appended locally and the
    /// list re-sorted right away.
    #[instrument(skip(self, text))]
    pub async fn send(&mut self, text: &str) -> Result<ChatMessage, ChatError> {
        let (id, status) = self.state.read().await.selected_status()?;
        match status {
            Some(ConversationStatus::Active) => {}
            Some(ConversationStatus::Closed) => return Err(ChatError::Closed(id)),
            None => return Err(ChatError::Unlisted(id)),
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::Empty { field: "message" }.into());
        }

        let message = match self.api.send_message(&id, text).await {
            Ok(message) => message,
            Err(err) => {
                report(&self.notices, "Failed to send message", &err);
                return Err(err.into());
            }
        };

        let mut state = self.state.write().await;
        if let Some(selection) = state.selected_mut(&id) {
            if !selection.messages.iter().any(|m| m.id == message.id) {
                selection.messages.push(message.clone());
            }
        }
        if let Some(conversation) = state.conversation_mut(&id) {
            conversation.last_message = Some(message.message.clone());
            conversation.last_message_at = Some(message.created_at);
        }
        sort_by_recent_activity(&mut state.conversations);
        info!(conversation = %id, message = %message.id, "reply sent");
        Ok(message)
    }

    /// Close the selected conversation.
    ///
    /// Callers are expected to have confirmed with the operator. Closing an
    /// already closed conversation is a no-op.
    #[instrument(skip(self))]
    pub async fn close_selected(&mut self) -> Result<(), ChatError> {
        let (id, status) = self.state.read().await.selected_status()?;
        if status == Some(ConversationStatus::Closed) {
            return Ok(());
        }

        if let Err(err) = self.api.close_conversation(&id).await {
            report(&self.notices, "Failed to close conversation", &err);
            return Err(err.into());
        }

        let mut state = self.state.write().await;
        if let Some(selection) = state.selected_mut(&id) {
            selection.status = Some(ConversationStatus::Closed);
        }
        if let Some(conversation) = state.conversation_mut(&id) {
            conversation.status = ConversationStatus::Closed;
        }
        info!(conversation = %id, "conversation closed");
        let _ = self.notices.send(Notice::info(format!("Conversation {id} closed")));
        Ok(())
    }

    fn cancel_poll(&mut self) {
        // PollTask aborts on drop
        self.poller = None;
    }

    fn spawn_poller(&self, id: ConversationId) -> PollTask {
        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        let notices = self.notices.clone();
        let period = self.poll_interval;
        let span = info_span!("chat_poll", conversation = %id);
        let conversation_id = id.clone();

        let handle = tokio::spawn(
            async move {
                // The foreground load already covered t=0
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    debug!("polling messages");
                    // Errors are already reported; the next tick retries
                    let _ = sync_messages(api.as_ref(), &state, &notices, &id).await;
                }
            }
            .instrument(span),
        );

        PollTask {
            conversation_id,
            handle,
        }
    }
}

/// One fetch-apply-acknowledge pass for `id`.
///
/// Results for a conversation that is no longer selected are discarded.
async fn sync_messages(
    api: &dyn ChatApi,
    state: &RwLock<DeskState>,
    notices: &broadcast::Sender<Notice>,
    id: &ConversationId,
) -> Result<(), ChatError> {
    let fetched = match api.fetch_messages(id).await {
        Ok(messages) => messages,
        Err(err) => {
            if let Some(selection) = state.write().await.selected_mut(id) {
                selection.loading = false;
            }
            report(notices, "Failed to load messages", &err);
            return Err(err.into());
        }
    };

    {
        let mut guard = state.write().await;
        let Some(selection) = guard.selected_mut(id) else {
            debug!(conversation = %id, "selection changed during fetch, discarding result");
            return Ok(());
        };
        selection.messages = merge_messages(&selection.messages, fetched);
        selection.loading = false;
        if let Some(conversation) = guard.conversation_mut(id) {
            conversation.unread_admin = 0;
        }
    }

    if let Err(err) = api.mark_read(id).await {
        report(notices, "Failed to mark conversation as read", &err);
    }
    Ok(())
}

fn report(notices: &broadcast::Sender<Notice>, action: &str, err: &ApiError) {
    warn!(error = %err, "{action}");
    // No subscribers is fine; the warning above is the record
    let _ = notices.send(Notice::error(format!("{action}: {err}")));
}
