use std::fmt;

use uuid::Uuid;

/// Stable identifier for one transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Correlates an in-flight request with its placeholder.
///
/// Minted fresh for every exchange and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingToken(Uuid);

impl PendingToken {
    pub fn new_v7() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for PendingToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Chat speaker role. `System` entries are local notices and never leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// Placeholder waiting for the reply tagged with this token.
    Pending(PendingToken),
    Done,
    /// Resolved through the failure path; content holds the localized notice.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub status: MessageStatus,
}

impl ChatMessage {
    pub fn new(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        status: MessageStatus,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            status,
        }
    }

    pub fn assistant_pending(
        id: MessageId,
        token: PendingToken,
        placeholder: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            Role::Assistant,
            placeholder,
            MessageStatus::Pending(token),
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, MessageStatus::Pending(_))
    }

    pub fn pending_token(&self) -> Option<PendingToken> {
        match self.status {
            MessageStatus::Pending(token) => Some(token),
            MessageStatus::Done | MessageStatus::Failed => None,
        }
    }

    /// Whether this entry is part of the conversation sent upstream.
    pub fn is_conversational(&self) -> bool {
        matches!(self.role, Role::User | Role::Assistant)
    }
}
