//! Visitor chat commands
//!
//! ```bash
//! atelier chat list --status active
//! atelier chat watch 42        # live view; type to reply, /close, /refresh, /quit
//! atelier chat send 42 "We open at ten tomorrow."
//! atelier chat close 42 --yes
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use atelier_core::chat::{
    ChatConversation, ChatDesk, ChatError, ChatMessage, ConversationFilter, ConversationStatus,
    Notice, NoticeLevel,
};
use atelier_core::ids::{ConversationId, MessageId};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

/// How often `watch` checks the desk for messages to print
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
pub struct ChatArgs {
    #[command(subcommand)]
    pub command: ChatCommands,
}

#[derive(Subcommand, Debug)]
pub enum ChatCommands {
    /// List conversations, most recent activity first
    List(ListArgs),
    /// Follow a conversation live and reply from stdin
    Watch(WatchArgs),
    /// Send one reply
    Send(SendArgs),
    /// Close a conversation
    Close(CloseArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum StatusFilter {
    Active,
    Closed,
}

impl From<StatusFilter> for ConversationStatus {
    fn from(status: StatusFilter) -> Self {
        match status {
            StatusFilter::Active => ConversationStatus::Active,
            StatusFilter::Closed => ConversationStatus::Closed,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only conversations with this status
    #[arg(long, value_enum)]
    pub status: Option<StatusFilter>,

    /// Search visitor name, email or message text
    #[arg(long)]
    pub search: Option<String>,

    /// Output JSON (for piping to jq)
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Conversation ID
    pub id: String,

    /// Poll interval in seconds (default: [chat] poll_interval_secs)
    #[arg(long)]
    pub interval: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Conversation ID
    pub id: String,

    /// Reply text
    pub text: String,
}

#[derive(Parser, Debug)]
pub struct CloseArgs {
    /// Conversation ID
    pub id: String,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

pub async fn run_chat(args: ChatArgs) -> Result<()> {
    match args.command {
        ChatCommands::List(args) => run_list(args).await,
        ChatCommands::Watch(args) => run_watch(args).await,
        ChatCommands::Send(args) => run_send(args).await,
        ChatCommands::Close(args) => run_close(args).await,
    }
}

/// Desk with the conversation list loaded and `id` selected
async fn open_desk(id: &str) -> Result<ChatDesk> {
    let (config, client) = super::connect()?;
    let mut desk = ChatDesk::new(Arc::new(client), config.poll_interval());
    desk.refresh_conversations(&ConversationFilter::default())
        .await
        .context("Failed to load conversations")?;
    desk.select(ConversationId::new(id))
        .await
        .with_context(|| format!("Failed to load conversation {id}"))?;
    Ok(desk)
}

fn truncate(text: &str, max: usize) -> String {
    let text = text.replace('\n', " ");
    if text.chars().count() <= max {
        return text;
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

fn format_conversation(conversation: &ChatConversation) -> String {
    let when = conversation
        .last_message_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let unread = if conversation.unread_admin > 0 {
        format!(" ({} new)", conversation.unread_admin)
    } else {
        String::new()
    };
    format!(
        "{:>6}  {:<6}  {}  {}{}  {}",
        conversation.id,
        conversation.status,
        when,
        conversation.display_name(),
        unread,
        truncate(conversation.last_message.as_deref().unwrap_or(""), 60)
    )
}

fn format_message(message: &ChatMessage, visitor: &str) -> String {
    let who = if message.sender_role.is_operator() {
        message.sender_name.as_deref().unwrap_or("staff")
    } else {
        message.sender_name.as_deref().unwrap_or(visitor)
    };
    format!("[{}] {}: {}", message.created_at.format("%H:%M"), who, message.message)
}

fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Info => eprintln!("ℹ {}", notice.message),
        NoticeLevel::Error => eprintln!("⚠ {}", notice.message),
    }
}

async fn run_list(args: ListArgs) -> Result<()> {
    let (config, client) = super::connect()?;
    let mut desk = ChatDesk::new(Arc::new(client), config.poll_interval());
    let filter = ConversationFilter {
        status: args.status.map(Into::into),
        search: args.search,
    };
    let conversations = desk
        .refresh_conversations(&filter)
        .await
        .context("Failed to load conversations")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&conversations).context("Failed to serialize conversations")?
        );
        return Ok(());
    }

    if conversations.is_empty() {
        println!("No conversations");
        return Ok(());
    }
    for conversation in &conversations {
        println!("{}", format_conversation(conversation));
    }
    Ok(())
}

async fn confirm_close(id: &str) -> Result<bool> {
    let prompt = format!("Close conversation {id}? The visitor will not be able to reply.");
    tokio::task::spawn_blocking(move || {
        inquire::Confirm::new(&prompt)
            .with_default(false)
            .prompt()
            .context("Confirmation prompt failed")
    })
    .await
    .context("Confirmation prompt panicked")?
}

async fn run_send(args: SendArgs) -> Result<()> {
    let mut desk = open_desk(&args.id).await?;
    let message = desk.send(&args.text).await.map_err(describe)?;
    println!("✅ Sent message {}", message.id);
    Ok(())
}

async fn run_close(args: CloseArgs) -> Result<()> {
    if !args.yes && !confirm_close(&args.id).await? {
        println!("Cancelled");
        return Ok(());
    }
    let mut desk = open_desk(&args.id).await?;
    desk.close_selected().await.map_err(describe)?;
    println!("✅ Closed conversation {}", args.id);
    Ok(())
}

fn describe(err: ChatError) -> anyhow::Error {
    match err {
        ChatError::Closed(id) => anyhow::anyhow!("Conversation {id} is closed; replies are disabled"),
        ChatError::Unlisted(id) => {
            anyhow::anyhow!("Conversation {id} was not found; check the id with `atelier chat list`")
        }
        other => anyhow::Error::new(other),
    }
}

/// Print messages not printed yet, in order
fn print_new(messages: &[ChatMessage], printed: &mut HashSet<MessageId>, visitor: &str) {
    for message in messages {
        if printed.insert(message.id.clone()) {
            println!("{}", format_message(message, visitor));
        }
    }
}

async fn run_watch(args: WatchArgs) -> Result<()> {
    let interval = args.interval.map(Duration::from_secs);
    let (config, client) = super::connect()?;
    let mut desk = ChatDesk::new(
        Arc::new(client),
        interval.unwrap_or_else(|| config.poll_interval()),
    );
    let mut notices = desk.subscribe();

    desk.refresh_conversations(&ConversationFilter::default())
        .await
        .context("Failed to load conversations")?;
    let id = ConversationId::new(args.id);
    let visitor = desk
        .conversations()
        .await
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.display_name().to_string())
        .unwrap_or_else(|| "visitor".to_string());

    // A failed first load is reported as a notice; the poller retries
    let _ = desk.select(id.clone()).await;
    info!(conversation = %id, interval = ?desk.poll_interval(), "watching conversation");
    eprintln!("Watching {id} ({visitor}). Type to reply; /close, /refresh, /quit.");

    let mut printed = HashSet::new();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = redraw.tick() => {
                print_new(&desk.messages().await, &mut printed, &visitor);
            }
            notice = notices.recv() => match notice {
                Ok(notice) => print_notice(&notice),
                Err(RecvError::Lagged(skipped)) => eprintln!("⚠ {skipped} notices dropped"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/refresh" => {
                        let _ = desk.refresh_messages().await;
                    }
                    "/close" => {
                        if confirm_close(id.as_str()).await? {
                            let _ = desk.close_selected().await;
                        }
                    }
                    text => {
                        if let Err(err) = desk.send(text).await {
                            // API failures already arrived as notices
                            if !matches!(err, ChatError::Api(_)) {
                                eprintln!("⚠ {}", describe(err));
                            }
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    desk.deselect().await;
    Ok(())
}
