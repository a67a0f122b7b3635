use std::collections::HashMap;

use learnovate_llm::{HistoryEntry, HistoryRole};

use crate::message::{ChatMessage, MessageId, MessageStatus, PendingToken, Role};

/// How a placeholder is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Done,
    Failed,
}

impl From<Resolution> for MessageStatus {
    fn from(value: Resolution) -> Self {
        match value {
            Resolution::Done => MessageStatus::Done,
            Resolution::Failed => MessageStatus::Failed,
        }
    }
}

/// Ordered conversation log.
///
/// Entries are only appended, except that a placeholder is rewritten once
/// when its reply arrives and the whole log is replaced on a greeting reset.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    pending: HashMap<PendingToken, usize>,
    next_message_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.reset_with_greeting(greeting);
        transcript
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, token: PendingToken) -> bool {
        self.pending.contains_key(&token)
    }

    /// Nothing but the greeting has been said yet. Local notices don't count.
    pub fn is_greeting_only(&self) -> bool {
        !self
            .messages
            .iter()
            .any(|message| message.role == Role::User)
    }

    /// Appends the user's message and a pending assistant placeholder together.
    pub fn push_exchange(
        &mut self,
        user_text: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> PendingToken {
        let token = PendingToken::new_v7();
        let user_id = self.alloc_message_id();
        let assistant_id = self.alloc_message_id();

        self.messages.push(ChatMessage::new(
            user_id,
            Role::User,
            user_text,
            MessageStatus::Done,
        ));
        self.pending.insert(token, self.messages.len());
        self.messages.push(ChatMessage::assistant_pending(
            assistant_id,
            token,
            placeholder,
        ));
        token
    }

    /// A local notice shown in the log but never sent upstream.
    pub fn push_notice(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.alloc_message_id();
        self.messages
            .push(ChatMessage::new(id, Role::System, text, MessageStatus::Done));
        id
    }

    /// Rewrites the placeholder for `token`. Returns false for unknown or
    /// already resolved tokens, leaving the log untouched.
    pub fn resolve(
        &mut self,
        token: PendingToken,
        content: impl Into<String>,
        resolution: Resolution,
    ) -> bool {
        let Some(index) = self.pending.remove(&token) else {
            return false;
        };

        match self.messages.get_mut(index) {
            Some(message) if message.pending_token() == Some(token) => {
                message.content = content.into();
                message.status = resolution.into();
                true
            }
            _ => {
                tracing::warn!(%token, index, "pending index no longer points at its placeholder");
                false
            }
        }
    }

    /// Drops the whole log, including unresolved placeholders, and starts over.
    pub fn reset_with_greeting(&mut self, greeting: impl Into<String>) {
        self.messages.clear();
        self.pending.clear();
        let id = self.alloc_message_id();
        self.messages.push(ChatMessage::new(
            id,
            Role::Assistant,
            greeting,
            MessageStatus::Done,
        ));
    }

    /// The last `limit` conversational entries, each cut to `max_chars`
    /// characters. Unresolved placeholders are left out.
    pub fn history_window(&self, limit: usize, max_chars: usize) -> Vec<HistoryEntry> {
        let entries = self
            .messages
            .iter()
            .filter(|message| message.is_conversational() && !message.is_pending())
            .collect::<Vec<_>>();
        let start = entries.len().saturating_sub(limit);

        entries[start..]
            .iter()
            .map(|message| {
                let role = match message.role {
                    Role::User => HistoryRole::User,
                    _ => HistoryRole::Assistant,
                };
                HistoryEntry::new(role, truncate_chars(&message.content, max_chars))
            })
            .collect()
    }

    fn alloc_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = self.next_message_id.saturating_add(1);
        id
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
