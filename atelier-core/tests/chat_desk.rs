use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atelier_core::chat::{
    ChatApi, ChatConversation, ChatDesk, ChatError, ChatMessage, ConversationFilter,
    ConversationStatus, NoticeLevel, SenderRole,
};
use atelier_core::error::{ApiError, ValidationError};
use atelier_core::ids::{ConversationId, MessageId};
use chrono::{DateTime, TimeZone, Utc};

const INTERVAL: Duration = Duration::from_secs(5);

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn conversation(id: &str, last: i64, status: ConversationStatus) -> ChatConversation {
    ChatConversation {
        id: ConversationId::new(id),
        status,
        visitor_name: Some(format!("Visitor {id}")),
        visitor_email: None,
        last_message: Some("hello".into()),
        last_message_at: Some(at(last)),
        unread_admin: 2,
    }
}

fn message(id: &str, conversation: &str, secs: i64, role: SenderRole) -> ChatMessage {
    ChatMessage {
        id: MessageId::new(id),
        conversation_id: Some(ConversationId::new(conversation)),
        sender_role: role,
        sender_name: None,
        message: format!("message {id}"),
        created_at: at(secs),
        is_read: false,
    }
}

#[derive(Default)]
struct MockState {
    conversations: Vec<ChatConversation>,
    messages: HashMap<String, Vec<ChatMessage>>,
    fetch_calls: HashMap<String, usize>,
    mark_read_calls: HashMap<String, usize>,
    send_calls: usize,
    close_calls: usize,
    fail_fetch: bool,
    fetch_delay: Option<Duration>,
}

/// In-memory chat API that counts calls
#[derive(Default)]
struct MockChatApi {
    state: Mutex<MockState>,
}

impl MockChatApi {
    fn with_conversations(conversations: Vec<ChatConversation>) -> Self {
        let mut messages = HashMap::new();
        for conv in &conversations {
            let id = conv.id.as_str();
            messages.insert(
                id.to_owned(),
                vec![
                    message(&format!("{id}-1"), id, 0, SenderRole::Visitor),
                    message(&format!("{id}-2"), id, 1, SenderRole::Visitor),
                ],
            );
        }
        Self {
            state: Mutex::new(MockState {
                conversations,
                messages,
                ..Default::default()
            }),
        }
    }

    fn fetch_calls(&self, id: &str) -> usize {
        self.state.lock().unwrap().fetch_calls.get(id).copied().unwrap_or(0)
    }

    fn mark_read_calls(&self, id: &str) -> usize {
        self.state.lock().unwrap().mark_read_calls.get(id).copied().unwrap_or(0)
    }

    fn send_calls(&self) -> usize {
        self.state.lock().unwrap().send_calls
    }

    fn close_calls(&self) -> usize {
        self.state.lock().unwrap().close_calls
    }

    fn set_fail_fetch(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch = fail;
    }

    fn set_fetch_delay(&self, delay: Duration) {
        self.state.lock().unwrap().fetch_delay = Some(delay);
    }

    /// Change a conversation server-side; the desk sees it on the next list refresh
    fn update_conversation(&self, id: &str, update: impl FnOnce(&mut ChatConversation)) {
        let mut state = self.state.lock().unwrap();
        if let Some(conversation) = state.conversations.iter_mut().find(|c| c.id.as_str() == id) {
            update(conversation);
        }
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn list_conversations(&self, _filter: &ConversationFilter) -> Result<Vec<ChatConversation>, ApiError> {
        Ok(self.state.lock().unwrap().conversations.clone())
    }

    async fn fetch_messages(&self, id: &ConversationId) -> Result<Vec<ChatMessage>, ApiError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            *state.fetch_calls.entry(id.to_string()).or_default() += 1;
            state.fetch_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        if state.fail_fetch {
            return Err(ApiError::status(503, "unavailable"));
        }
        Ok(state.messages.get(id.as_str()).cloned().unwrap_or_default())
    }

    async fn send_message(&self, id: &ConversationId, text: &str) -> Result<ChatMessage, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.send_calls += 1;
        let sent = ChatMessage {
            id: MessageId::new(format!("sent-{}", state.send_calls)),
            conversation_id: Some(id.clone()),
            sender_role: SenderRole::Admin,
            sender_name: Some("Operator".into()),
            message: text.to_owned(),
            created_at: at(1_000 + state.send_calls as i64),
            is_read: true,
        };
        state
            .messages
            .entry(id.to_string())
            .or_default()
            .push(sent.clone());
        Ok(sent)
    }

    async fn mark_read(&self, id: &ConversationId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        *state.mark_read_calls.entry(id.to_string()).or_default() += 1;
        Ok(())
    }

    async fn close_conversation(&self, _id: &ConversationId) -> Result<(), ApiError> {
        self.state.lock().unwrap().close_calls += 1;
        Ok(())
    }
}

async fn desk_with(conversations: Vec<ChatConversation>) -> (Arc<MockChatApi>, ChatDesk) {
    let api = Arc::new(MockChatApi::with_conversations(conversations));
    let mut desk = ChatDesk::new(api.clone(), INTERVAL);
    desk.refresh_conversations(&ConversationFilter::default())
        .await
        .unwrap();
    (api, desk)
}

async fn advance(periods: u32) {
    tokio::time::sleep(INTERVAL * periods + Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn select_loads_messages_and_marks_read() {
    let (api, mut desk) = desk_with(vec![
        conversation("a", 10, ConversationStatus::Active),
        conversation("b", 20, ConversationStatus::Active),
    ])
    .await;

    desk.select(ConversationId::new("a")).await.unwrap();

    assert_eq!(api.fetch_calls("a"), 1);
    assert_eq!(api.mark_read_calls("a"), 1);
    assert_eq!(desk.messages().await.len(), 2);
    assert!(desk.is_polling());

    let selection = desk.selection().await.unwrap();
    assert!(!selection.loading);

    let conversations = desk.conversations().await;
    let a = conversations.iter().find(|c| c.id.as_str() == "a").unwrap();
    let b = conversations.iter().find(|c| c.id.as_str() == "b").unwrap();
    assert_eq!(a.unread_admin, 0);
    assert_eq!(b.unread_admin, 2);
}

#[tokio::test(start_paused = true)]
async fn poller_fetches_once_per_interval() {
    let (api, mut desk) = desk_with(vec![conversation("a", 10, ConversationStatus::Active)]).await;
    desk.select(ConversationId::new("a")).await.unwrap();

    tokio::time::sleep(INTERVAL / 2).await;
    assert_eq!(api.fetch_calls("a"), 1);

    advance(1).await;
    assert_eq!(api.fetch_calls("a"), 2);
    assert_eq!(api.mark_read_calls("a"), 2);

    advance(2).await;
    assert_eq!(api.fetch_calls("a"), 4);
}

#[tokio::test(start_paused = true)]
async fn switching_selection_stops_previous_poller() {
    let (api, mut desk) = desk_with(vec![
        conversation("a", 10, ConversationStatus::Active),
        conversation("b", 20, ConversationStatus::Active),
    ])
    .await;

    desk.select(ConversationId::new("a")).await.unwrap();
    advance(1).await;
    assert_eq!(api.fetch_calls("a"), 2);

    desk.select(ConversationId::new("b")).await.unwrap();
    advance(3).await;

    assert_eq!(api.fetch_calls("a"), 2);
    assert_eq!(api.fetch_calls("b"), 4);
    let messages = desk.messages().await;
    assert!(messages.iter().all(|m| m.id.as_str().starts_with("b-")));
}

#[tokio::test(start_paused = true)]
async fn deselect_and_drop_stop_polling() {
    let (api, mut desk) = desk_with(vec![conversation("a", 10, ConversationStatus::Active)]).await;

    desk.select(ConversationId::new("a")).await.unwrap();
    desk.deselect().await;
    assert!(!desk.is_polling());
    assert!(desk.selection().await.is_none());
    advance(2).await;
    assert_eq!(api.fetch_calls("a"), 1);

    desk.select(ConversationId::new("a")).await.unwrap();
    drop(desk);
    advance(3).await;
    assert_eq!(api.fetch_calls("a"), 2);
}

#[tokio::test(start_paused = true)]
async fn send_is_refused_without_network_call() {
    let (api, mut desk) = desk_with(vec![
        conversation("open", 10, ConversationStatus::Active),
        conversation("done", 20, ConversationStatus::Closed),
    ])
    .await;

    assert!(matches!(desk.send("hi").await, Err(ChatError::NoSelection)));

    desk.select(ConversationId::new("open")).await.unwrap();
    assert!(matches!(
        desk.send("   ").await,
        Err(ChatError::Validation(ValidationError::Empty { field: "message" }))
    ));

    desk.select(ConversationId::new("done")).await.unwrap();
    assert!(matches!(desk.send("hi").await, Err(ChatError::Closed(_))));

    assert_eq!(api.send_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn send_appends_message_and_resorts_list() {
    let (api, mut desk) = desk_with(vec![
        conversation("a", 10, ConversationStatus::Active),
        conversation("b", 20, ConversationStatus::Active),
    ])
    .await;
    assert_eq!(desk.conversations().await[0].id.as_str(), "b");

    desk.select(ConversationId::new("a")).await.unwrap();
    let sent = desk.send("  We open at ten.  ").await.unwrap();
    assert_eq!(sent.message, "We open at ten.");
    assert_eq!(api.send_calls(), 1);

    let messages = desk.messages().await;
    assert_eq!(messages.last().map(|m| m.id.clone()), Some(sent.id.clone()));

    let conversations = desk.conversations().await;
    assert_eq!(conversations[0].id.as_str(), "a");
    assert_eq!(conversations[0].last_message.as_deref(), Some("We open at ten."));

    // The next poll returns the same message; it must not be duplicated
    advance(1).await;
    let messages = desk.messages().await;
    assert_eq!(messages.iter().filter(|m| m.id == sent.id).count(), 1);
    assert_eq!(messages.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_publishes_notice_and_polling_continues() {
    let (api, mut desk) = desk_with(vec![conversation("a", 10, ConversationStatus::Active)]).await;
    let mut notices = desk.subscribe();

    desk.select(ConversationId::new("a")).await.unwrap();
    api.set_fail_fetch(true);
    advance(1).await;

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("503"));
    // Messages loaded before the failure are kept
    assert_eq!(desk.messages().await.len(), 2);
    assert_eq!(api.mark_read_calls("a"), 1);

    api.set_fail_fetch(false);
    advance(1).await;
    assert_eq!(api.fetch_calls("a"), 3);
    assert_eq!(api.mark_read_calls("a"), 2);
    assert!(desk.is_polling());
}

#[tokio::test(start_paused = true)]
async fn failed_initial_load_still_starts_poller() {
    let api = Arc::new(MockChatApi::with_conversations(vec![conversation(
        "a",
        10,
        ConversationStatus::Active,
    )]));
    api.set_fail_fetch(true);
    let mut desk = ChatDesk::new(api.clone(), INTERVAL);

    assert!(matches!(
        desk.select(ConversationId::new("a")).await,
        Err(ChatError::Api(ApiError::Status { status: 503, .. }))
    ));
    assert!(!desk.selection().await.unwrap().loading);
    assert!(desk.is_polling());

    api.set_fail_fetch(false);
    advance(1).await;
    assert_eq!(desk.messages().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn close_marks_conversation_closed_once() {
    let (api, mut desk) = desk_with(vec![conversation("a", 10, ConversationStatus::Active)]).await;
    let mut notices = desk.subscribe();

    desk.select(ConversationId::new("a")).await.unwrap();
    desk.close_selected().await.unwrap();
    desk.close_selected().await.unwrap();
    assert_eq!(api.close_calls(), 1);

    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);
    assert_eq!(
        desk.selection().await.and_then(|s| s.status),
        Some(ConversationStatus::Closed)
    );

    // A list that predates the close does not reopen it
    desk.refresh_conversations(&ConversationFilter::default())
        .await
        .unwrap();
    assert!(desk.conversations().await[0].is_closed());
    assert!(matches!(desk.send("hi").await, Err(ChatError::Closed(_))));
}

#[tokio::test(start_paused = true)]
async fn server_side_close_blocks_send_after_list_refresh() {
    let (api, mut desk) = desk_with(vec![conversation("a", 10, ConversationStatus::Active)]).await;
    desk.select(ConversationId::new("a")).await.unwrap();

    api.update_conversation("a", |c| c.status = ConversationStatus::Closed);
    desk.refresh_conversations(&ConversationFilter::default())
        .await
        .unwrap();

    assert_eq!(
        desk.selection().await.and_then(|s| s.status),
        Some(ConversationStatus::Closed)
    );
    assert!(matches!(desk.send("hi").await, Err(ChatError::Closed(_))));
    assert_eq!(api.send_calls(), 0);

    // Closed is terminal even if a later list claims otherwise
    api.update_conversation("a", |c| c.status = ConversationStatus::Active);
    desk.refresh_conversations(&ConversationFilter::default())
        .await
        .unwrap();
    assert!(matches!(desk.send("hi").await, Err(ChatError::Closed(_))));
    assert_eq!(api.send_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn send_to_unlisted_conversation_is_refused() {
    let (api, mut desk) = desk_with(vec![conversation("a", 10, ConversationStatus::Active)]).await;

    desk.select(ConversationId::new("ghost")).await.unwrap();
    assert_eq!(desk.selection().await.and_then(|s| s.status), None);
    assert!(matches!(desk.send("hi").await, Err(ChatError::Unlisted(_))));
    assert_eq!(api.send_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn background_poll_zeroes_unread_badge() {
    let (api, mut desk) = desk_with(vec![conversation("a", 10, ConversationStatus::Active)]).await;
    let unread = |conversations: Vec<ChatConversation>| {
        conversations
            .iter()
            .find(|c| c.id.as_str() == "a")
            .map(|c| c.unread_admin)
    };
    assert_eq!(unread(desk.conversations().await), Some(2));

    // The foreground load fails, so only the poller can clear the badge
    api.set_fail_fetch(true);
    assert!(desk.select(ConversationId::new("a")).await.is_err());
    assert_eq!(unread(desk.conversations().await), Some(2));

    api.set_fail_fetch(false);
    advance(1).await;
    assert_eq!(unread(desk.conversations().await), Some(0));
    assert_eq!(api.mark_read_calls("a"), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_for_previous_selection_never_lands() {
    let (api, mut desk) = desk_with(vec![
        conversation("a", 10, ConversationStatus::Active),
        conversation("b", 20, ConversationStatus::Active),
    ])
    .await;
    desk.select(ConversationId::new("a")).await.unwrap();
    assert_eq!(api.mark_read_calls("a"), 1);

    // A's first poll starts at one interval and is still in flight when B is selected
    api.set_fetch_delay(INTERVAL / 2);
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(api.fetch_calls("a"), 2);
    desk.select(ConversationId::new("b")).await.unwrap();
    tokio::time::sleep(INTERVAL / 2).await;

    assert_eq!(api.mark_read_calls("a"), 1);
    assert_eq!(api.mark_read_calls("b"), 1);
    let messages = desk.messages().await;
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.id.as_str().starts_with("b-")));
}
