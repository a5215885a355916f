//! Canvas chat feed.

use crate::autosave::Ticker;
use crate::backend::{Backend, BackendResult, ChatMessage, NewChatMessage};
use crate::config::UserIdentity;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Default interval between message polls.
pub const CHAT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Messages for one canvas plus the unread badge.
pub struct ChatFeed {
    canvas_id: String,
    me: UserIdentity,
    messages: Vec<ChatMessage>,
    seen: HashSet<u64>,
    open: bool,
    unread: usize,
    poll: Ticker,
}

impl ChatFeed {
    pub fn new(canvas_id: impl Into<String>, me: UserIdentity) -> Self {
        Self::with_poll_interval(canvas_id, me, CHAT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(canvas_id: impl Into<String>, me: UserIdentity, interval: Duration) -> Self {
        Self {
            canvas_id: canvas_id.into(),
            me,
            messages: Vec::new(),
            seen: HashSet::new(),
            open: false,
            unread: 0,
            poll: Ticker::new(interval),
        }
    }

    /// Add messages not seen before, in arrival order.
    ///
    /// Returns how many were new. Messages from other users count as
    /// unread while the panel is closed.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = ChatMessage>) -> usize {
        let mut added = 0;
        for message in incoming {
            if !self.seen.insert(message.id) {
                continue;
            }
            if !self.open && !self.is_own(&message) {
                self.unread += 1;
            }
            self.messages.push(message);
            added += 1;
        }
        added
    }

    /// Fetch the history and merge anything new.
    pub async fn refresh<B: Backend + ?Sized>(&mut self, backend: &B) -> BackendResult<usize> {
        let messages = backend.list_messages(&self.canvas_id).await?;
        let added = self.merge(messages);
        if added > 0 {
            log::debug!("{} new chat messages", added);
        }
        Ok(added)
    }

    /// Post `text` as the current user. Blank input is ignored.
    pub async fn send<B: Backend + ?Sized>(&mut self, backend: &B, text: &str) -> BackendResult<Option<ChatMessage>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let stored = backend
            .post_message(&self.canvas_id, &NewChatMessage::text(text))
            .await
            .inspect_err(|e| log::error!("Failed to send message: {}", e))?;
        self.merge([stored.clone()]);
        Ok(Some(stored))
    }

    /// Whether a poll should run at `now`.
    pub fn poll_due(&mut self, now: Instant) -> bool {
        self.poll.tick(now)
    }

    /// Open or close the panel. Opening clears the unread count.
    pub fn toggle(&mut self) -> bool {
        self.open = !self.open;
        if self.open {
            self.unread = 0;
        }
        self.open
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    /// Badge text, or `None` when there is nothing unread.
    pub fn badge(&self) -> Option<String> {
        match self.unread {
            0 => None,
            n if n > 99 => Some("99+".to_string()),
            n => Some(n.to_string()),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_own(&self, message: &ChatMessage) -> bool {
        message.user_id == self.me.user_id
    }
}

/// Short label for when a message was sent.
pub fn relative_time(created_at: NaiveDateTime, now: NaiveDateTime) -> String {
    let secs = (now - created_at).num_seconds().max(0);
    if secs < 60 {
        "Just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        created_at.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryBackend, MessageType};
    use chrono::NaiveDate;
    use futures::executor::block_on;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    fn message(id: u64, user_id: &str) -> ChatMessage {
        ChatMessage {
            id,
            user_id: user_id.into(),
            user_name: format!("user {user_id}"),
            message: format!("message {id}"),
            message_type: MessageType::Text,
            file_path: None,
            created_at: at(12, 0, 0),
        }
    }

    fn feed() -> ChatFeed {
        ChatFeed::new("1", UserIdentity::new("me", "Me"))
    }

    #[test]
    fn test_merge_skips_duplicates() {
        let mut chat = feed();
        assert_eq!(chat.merge([message(1, "a"), message(2, "a")]), 2);
        assert_eq!(chat.merge([message(1, "a"), message(2, "a"), message(3, "a")]), 1);
        assert_eq!(chat.messages().len(), 3);
    }

    #[test]
    fn test_unread_counts_others_while_closed() {
        let mut chat = feed();
        chat.merge([message(1, "a"), message(2, "me"), message(3, "b")]);
        assert_eq!(chat.unread(), 2);
        assert_eq!(chat.badge().as_deref(), Some("2"));

        assert!(chat.toggle());
        assert_eq!(chat.unread(), 0);
        assert_eq!(chat.badge(), None);

        chat.merge([message(4, "a")]);
        assert_eq!(chat.unread(), 0);
    }

    #[test]
    fn test_badge_caps() {
        let mut chat = feed();
        chat.merge((1..=120).map(|id| message(id, "a")));
        assert_eq!(chat.badge().as_deref(), Some("99+"));
    }

    #[test]
    fn test_refresh_and_send() {
        let backend = MemoryBackend::with_user(UserIdentity::new("me", "Me"));
        backend.push_message("1", &UserIdentity::new("b", "Bo"), "hello").unwrap();

        let mut chat = feed();
        assert_eq!(block_on(chat.refresh(&backend)).unwrap(), 1);
        assert_eq!(block_on(chat.refresh(&backend)).unwrap(), 0);

        assert_eq!(block_on(chat.send(&backend, "   ")).unwrap(), None);
        let sent = block_on(chat.send(&backend, "  hi there ")).unwrap().unwrap();
        assert_eq!(sent.message, "hi there");
        assert!(chat.is_own(&sent));
        assert_eq!(chat.messages().len(), 2);
        assert_eq!(chat.unread(), 1);
    }

    #[test]
    fn test_send_failure_keeps_feed() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        let mut chat = feed();
        let result = block_on(chat.send(&backend, "hi"));
        assert!(matches!(result, Err(BackendError::Network(_))));
        assert!(chat.messages().is_empty());
    }

    #[test]
    fn test_relative_time() {
        let sent = at(10, 0, 0);
        assert_eq!(relative_time(sent, at(10, 0, 30)), "Just now");
        assert_eq!(relative_time(sent, at(10, 5, 0)), "5m ago");
        assert_eq!(relative_time(sent, at(13, 0, 0)), "3h ago");
        let next_week = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap().and_hms_opt(10, 0, 0).unwrap();
        assert_eq!(relative_time(sent, next_week), "2024-06-01");
    }

    #[test]
    fn test_poll_interval() {
        let mut chat = feed();
        let start = Instant::now();
        assert!(chat.poll_due(start));
        assert!(!chat.poll_due(start + Duration::from_secs(1)));
        assert!(chat.poll_due(start + Duration::from_secs(5)));
    }
}
