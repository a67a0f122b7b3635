#![deny(unsafe_code)]

use std::sync::Arc;

mod http_adapter;
mod provider;

pub use http_adapter::{CHAT_ENDPOINT_PATH, ClientConfig, DEFAULT_CONNECT_TIMEOUT, HttpChatClient};
pub use provider::{
    BoxFuture, ChatCapability, ChatError, ChatReply, ChatRequest, ChatResult, HistoryEntry,
    HistoryRole,
};

pub fn create_chat_client(config: ClientConfig) -> ChatResult<Arc<dyn ChatCapability>> {
    Ok(Arc::new(HttpChatClient::new(config)?))
}
