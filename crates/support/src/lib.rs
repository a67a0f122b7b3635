#![deny(unsafe_code)]

//! The in-app support assistant: transcript, request correlation and panel state.

pub mod events;
pub mod message;
pub mod session;
pub mod transcript;

pub use events::OpenAssistantSignal;
pub use message::{ChatMessage, MessageId, MessageStatus, PendingToken, Role};
pub use session::{
    DEFAULT_HIDDEN_ROUTES, DEFAULT_HISTORY_LIMIT, DEFAULT_HISTORY_MAX_CHARS,
    DEFAULT_REQUEST_TIMEOUT, RejectReason, SessionConfig, SubmitOutcome, SupportSession,
};
pub use transcript::{Resolution, Transcript};
