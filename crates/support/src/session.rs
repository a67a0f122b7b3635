use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use learnovate_i18n::{Language, PreferenceStore, Subscription};
use learnovate_llm::{ChatCapability, ChatError, ChatReply, ChatRequest, ChatResult};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::events::OpenAssistantSignal;
use crate::message::{ChatMessage, MessageId, PendingToken};
use crate::transcript::{Resolution, Transcript};

pub const GREETING_KEY: &str = "support.greeting";
pub const PLACEHOLDER_KEY: &str = "support.placeholder";
pub const TYPING_KEY: &str = "support.typing";
pub const NO_RESPONSE_KEY: &str = "support.noResponse";
pub const UNREACHABLE_KEY: &str = "support.unreachable";
pub const QUICK_TITLE_KEY: &str = "support.quickTitle";
pub const QUICK_QUESTION_KEYS: [&str; 4] = ["support.q1", "support.q2", "support.q3", "support.q4"];

const FALLBACK_GREETING: &str = "Hi! How can I help you with the app?";
const FALLBACK_PLACEHOLDER: &str = "Ask about the app…";
const FALLBACK_TYPING: &str = "Typing…";
const FALLBACK_NO_RESPONSE: &str = "Sorry, I couldn’t generate a response.";
const FALLBACK_UNREACHABLE: &str = "I couldn’t reach the assistant service. Please try again.";
const FALLBACK_QUICK_TITLE: &str = "Quick questions";
const FALLBACK_QUICK_QUESTIONS: [&str; 4] = [
    "How do I start a learning path?",
    "Where can I update my profile?",
    "How do internships work?",
    "How do I change the app language?",
];

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_HISTORY_MAX_CHARS: usize = 1000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HIDDEN_ROUTES: [&str; 2] = ["/", "/auth"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub history_limit: usize,
    pub history_max_chars: usize,
    pub request_timeout: Duration,
    /// Routes on which the assistant is not offered at all.
    pub hidden_routes: Vec<String>,
    pub initial_location: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_max_chars: DEFAULT_HISTORY_MAX_CHARS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            hidden_routes: DEFAULT_HIDDEN_ROUTES
                .iter()
                .map(|route| route.to_string())
                .collect(),
            initial_location: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Nothing but whitespace was submitted.
    Empty,
    /// An earlier exchange is still waiting for its reply.
    Busy,
    /// The quick question does not exist or is no longer offered.
    NoSuchQuestion,
}

/// What became of one submission. Failures are reported here and in the
/// transcript, never as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Answered,
    /// The service answered with nothing usable.
    NoResponse,
    Failed,
    /// The reply arrived after its placeholder was discarded by a reset.
    Discarded,
    Rejected(RejectReason),
}

struct SessionState {
    transcript: Transcript,
    language: Language,
    input: String,
    location: String,
    open: bool,
    in_flight: Option<PendingToken>,
}

struct SessionInner {
    state: Mutex<SessionState>,
    preferences: Arc<PreferenceStore>,
    chat: Arc<dyn ChatCapability>,
    config: SessionConfig,
    revision: watch::Sender<u64>,
    _language_subscription: Subscription,
}

/// The support assistant conversation and its panel state.
///
/// Cheap to clone; clones share one session. The state lock is never held
/// across an await, so replies may resolve while the caller keeps using the
/// session.
#[derive(Clone)]
pub struct SupportSession {
    inner: Arc<SessionInner>,
}

impl SupportSession {
    /// Starts with a greeting in the current language and follows later
    /// language changes from `preferences`.
    pub fn new(
        preferences: Arc<PreferenceStore>,
        chat: Arc<dyn ChatCapability>,
        config: SessionConfig,
    ) -> Self {
        let language = preferences.language();
        let greeting = preferences
            .translate_in(language, GREETING_KEY, Some(FALLBACK_GREETING))
            .to_string();
        let location = normalize_route(&config.initial_location).to_string();
        let (revision, _) = watch::channel(0);

        let inner = Arc::new_cyclic(|weak: &Weak<SessionInner>| {
            let session = weak.clone();
            let subscription = preferences.on_change(move |_| {
                if let Some(inner) = session.upgrade() {
                    inner.apply_language(inner.preferences.language());
                }
            });

            SessionInner {
                state: Mutex::new(SessionState {
                    transcript: Transcript::with_greeting(greeting),
                    language,
                    input: String::new(),
                    location,
                    open: false,
                    in_flight: None,
                }),
                preferences,
                chat,
                config,
                revision,
                _language_subscription: subscription,
            }
        });

        Self { inner }
    }

    pub fn language(&self) -> Language {
        self.inner.lock_state().language
    }

    /// A copy of the transcript for rendering.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.inner.lock_state().transcript.messages().to_vec()
    }

    /// Appends a local notice, such as a sign-in banner, to the transcript.
    /// Notices are shown but never sent as history.
    pub fn push_notice(&self, text: impl Into<String>) -> MessageId {
        let id = self.inner.lock_state().transcript.push_notice(text);
        self.inner.bump();
        id
    }

    pub fn is_busy(&self) -> bool {
        self.inner.lock_state().in_flight.is_some()
    }

    /// Bumped on every observable change; watchers re-read the snapshot.
    pub fn revision(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub async fn send_message(&self, text: &str) -> SubmitOutcome {
        let message = text.trim();
        if message.is_empty() {
            return SubmitOutcome::Rejected(RejectReason::Empty);
        }

        let (token, request) = {
            let mut state = self.inner.lock_state();
            if let Some(active) = state.in_flight {
                tracing::debug!(%active, "support request already in flight, rejecting submit");
                return SubmitOutcome::Rejected(RejectReason::Busy);
            }

            // History is taken before the new exchange is appended.
            let history = state
                .transcript
                .history_window(self.inner.config.history_limit, self.inner.config.history_max_chars);
            let placeholder = self
                .inner
                .text(state.language, TYPING_KEY, FALLBACK_TYPING);
            let token = state.transcript.push_exchange(message, placeholder);
            state.in_flight = Some(token);
            state.input.clear();

            (
                token,
                ChatRequest::new(message, state.location.clone(), history),
            )
        };
        self.inner.bump();

        tracing::debug!(
            %token,
            context_path = %request.context_path,
            history_len = request.history.len(),
            "support message submitted"
        );
        let reply = self.inner.request_reply(request).await;
        self.inner.complete(token, reply)
    }

    /// Sends whatever is in the input buffer.
    pub async fn submit_input(&self) -> SubmitOutcome {
        let text = self.input();
        self.send_message(&text).await
    }

    /// Localized quick questions, offered only before the conversation starts.
    pub fn quick_questions(&self) -> Vec<String> {
        let state = self.inner.lock_state();
        if !state.transcript.is_greeting_only() {
            return Vec::new();
        }

        QUICK_QUESTION_KEYS
            .iter()
            .zip(FALLBACK_QUICK_QUESTIONS)
            .map(|(key, fallback)| self.inner.text(state.language, key, fallback))
            .collect()
    }

    pub async fn ask_quick_question(&self, index: usize) -> SubmitOutcome {
        let Some(label) = self.quick_questions().into_iter().nth(index) else {
            return SubmitOutcome::Rejected(RejectReason::NoSuchQuestion);
        };
        self.send_message(&label).await
    }

    pub fn quick_questions_title(&self) -> String {
        let language = self.language();
        self.inner
            .text(language, QUICK_TITLE_KEY, FALLBACK_QUICK_TITLE)
    }

    pub fn input_placeholder(&self) -> String {
        let language = self.language();
        self.inner
            .text(language, PLACEHOLDER_KEY, FALLBACK_PLACEHOLDER)
    }

    /// Resets to a fresh greeting when `language` differs from the session's.
    ///
    /// Placeholders still waiting are dropped with the old transcript; their
    /// replies are discarded when they arrive.
    pub fn handle_language_change(&self, language: Language) -> bool {
        self.inner.apply_language(language)
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.inner.lock_state().input = text.into();
        self.inner.bump();
    }

    pub fn input(&self) -> String {
        self.inner.lock_state().input.clone()
    }

    /// Records the route the user is on; it is sent as the request context.
    pub fn set_location(&self, path: &str) {
        let path = normalize_route(path).to_string();
        self.inner.lock_state().location = path;
        self.inner.bump();
    }

    pub fn location(&self) -> String {
        self.inner.lock_state().location.clone()
    }

    pub fn is_visible_on(&self, path: &str) -> bool {
        let path = normalize_route(path);
        !self
            .inner
            .config
            .hidden_routes
            .iter()
            .any(|hidden| normalize_route(hidden) == path)
    }

    pub fn is_visible(&self) -> bool {
        let location = self.location();
        self.is_visible_on(&location)
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock_state().open
    }

    pub fn open(&self) {
        self.inner.set_open(true);
    }

    /// Hides the panel. A request in flight keeps running and still resolves.
    pub fn close(&self) {
        self.inner.set_open(false);
    }

    pub fn toggle(&self) -> bool {
        let open = {
            let mut state = self.inner.lock_state();
            state.open = !state.open;
            state.open
        };
        self.inner.bump();
        open
    }

    /// Opens the panel whenever `signal` is raised.
    ///
    /// The task ends when the signal's senders are gone or the session is dropped.
    pub fn listen_for_open_signal(&self, signal: &OpenAssistantSignal) -> JoinHandle<()> {
        let mut receiver = signal.subscribe();
        let session = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        let Some(inner) = session.upgrade() else {
                            break;
                        };
                        inner.set_open(true);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("open assistant listener stopped");
        })
    }
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision
            .send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    fn text(&self, language: Language, key: &str, fallback: &str) -> String {
        self.preferences
            .translate_in(language, key, Some(fallback))
            .to_string()
    }

    async fn request_reply(&self, request: ChatRequest) -> ChatResult<ChatReply> {
        let after = self.config.request_timeout;
        match tokio::time::timeout(after, self.chat.chat(request)).await {
            Ok(reply) => reply,
            Err(_) => Err(ChatError::TimedOut {
                stage: "await-chat-reply",
                after,
            }),
        }
    }

    fn complete(&self, token: PendingToken, reply: ChatResult<ChatReply>) -> SubmitOutcome {
        let outcome = {
            let mut state = self.lock_state();
            if state.in_flight == Some(token) {
                state.in_flight = None;
            }

            let language = state.language;
            let (content, resolution, outcome) = match reply {
                Ok(ChatReply::Answer(text)) => (text, Resolution::Done, SubmitOutcome::Answered),
                Ok(ChatReply::Empty) => (
                    self.text(language, NO_RESPONSE_KEY, FALLBACK_NO_RESPONSE),
                    Resolution::Done,
                    SubmitOutcome::NoResponse,
                ),
                Err(error) => {
                    tracing::warn!(%token, error = %error, "support chat request failed");
                    (
                        self.text(language, UNREACHABLE_KEY, FALLBACK_UNREACHABLE),
                        Resolution::Failed,
                        SubmitOutcome::Failed,
                    )
                }
            };

            if state.transcript.resolve(token, content, resolution) {
                outcome
            } else {
                tracing::debug!(%token, "reply arrived for a discarded placeholder");
                SubmitOutcome::Discarded
            }
        };

        if outcome != SubmitOutcome::Discarded {
            self.bump();
        }
        outcome
    }

    fn apply_language(&self, language: Language) -> bool {
        let changed = {
            let mut state = self.lock_state();
            if state.language == language {
                false
            } else {
                let greeting = self.text(language, GREETING_KEY, FALLBACK_GREETING);
                state.language = language;
                state.transcript.reset_with_greeting(greeting);
                state.in_flight = None;
                true
            }
        };

        if changed {
            tracing::info!(language = %language, "support transcript reset for new language");
            self.bump();
        }
        changed
    }

    fn set_open(&self, open: bool) {
        let changed = {
            let mut state = self.lock_state();
            let changed = state.open != open;
            state.open = open;
            changed
        };
        if changed {
            self.bump();
        }
    }
}

fn normalize_route(path: &str) -> &str {
    let path = path.trim();
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use learnovate_i18n::{TranslationCatalog, UserIdentity};
    use learnovate_llm::{BoxFuture, HistoryEntry, HistoryRole};
    use learnovate_storage::MemoryStore;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::message::{MessageStatus, Role};

    /// Replies from a queue and records every request.
    #[derive(Default)]
    struct ScriptedChat {
        replies: Mutex<VecDeque<ChatResult<ChatReply>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedChat {
        fn replying(replies: Vec<ChatResult<ChatReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl ChatCapability for ScriptedChat {
        fn chat<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, ChatResult<ChatReply>> {
            self.requests.lock().unwrap().push(request);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ChatReply::Answer("ok".into())));
            Box::pin(async move { reply })
        }
    }

    /// Holds every reply until the test adds a permit.
    struct GatedChat {
        gate: Semaphore,
        calls: AtomicUsize,
    }

    impl GatedChat {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                calls: AtomicUsize::new(0),
            })
        }

        fn release(&self) {
            self.gate.add_permits(1);
        }
    }

    impl ChatCapability for GatedChat {
        fn chat<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, ChatResult<ChatReply>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                let permit = self.gate.acquire().await.unwrap();
                permit.forget();
                Ok(ChatReply::Answer(format!("answer to {}", request.message)))
            })
        }
    }

    struct HangingChat;

    impl ChatCapability for HangingChat {
        fn chat<'a>(&'a self, _request: ChatRequest) -> BoxFuture<'a, ChatResult<ChatReply>> {
            Box::pin(std::future::pending())
        }
    }

    fn preferences_with(storage: MemoryStore) -> Arc<PreferenceStore> {
        Arc::new(PreferenceStore::new(
            Arc::new(storage),
            Arc::new(TranslationCatalog::builtin()),
        ))
    }

    fn preferences() -> Arc<PreferenceStore> {
        preferences_with(MemoryStore::new())
    }

    fn session_with(chat: Arc<dyn ChatCapability>) -> (SupportSession, Arc<PreferenceStore>) {
        let preferences = preferences();
        let session = SupportSession::new(preferences.clone(), chat, SessionConfig::default());
        (session, preferences)
    }

    fn server_error() -> ChatResult<ChatReply> {
        Err(ChatError::Status {
            stage: "test",
            status: 500,
            body: "boom".into(),
        })
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn starts_with_a_localized_greeting_and_quick_questions() {
        let (session, preferences) = session_with(ScriptedChat::replying(vec![]));

        let messages = session.snapshot();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(
            messages[0].content,
            preferences.translate_in(Language::En, GREETING_KEY, None)
        );
        assert_eq!(session.quick_questions().len(), 4);
        assert_eq!(session.quick_questions()[0], "How do I start a learning path?");
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn whitespace_submission_changes_nothing() {
        let chat = ScriptedChat::replying(vec![]);
        let (session, _) = session_with(chat.clone());
        let before = session.snapshot();

        let outcome = session.send_message("   \n\t").await;

        assert_eq!(outcome, SubmitOutcome::Rejected(RejectReason::Empty));
        assert_eq!(session.snapshot(), before);
        assert!(chat.requests().is_empty());
    }

    #[tokio::test]
    async fn successful_exchange_resolves_the_placeholder() {
        let chat = ScriptedChat::replying(vec![Ok(ChatReply::Answer(
            "Open Profile from the menu.".into(),
        ))]);
        let (session, _) = session_with(chat.clone());
        session.set_location("/dashboard");

        let outcome = session.send_message("  Where is my profile? ").await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        let messages = session.snapshot();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "Where is my profile?");
        assert_eq!(messages[2].content, "Open Profile from the menu.");
        assert_eq!(messages[2].status, MessageStatus::Done);
        assert!(messages.iter().all(|message| !message.is_pending()));

        let requests = chat.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "Where is my profile?");
        assert_eq!(requests[0].context_path, "/dashboard");
        assert_eq!(
            requests[0].history,
            vec![HistoryEntry::new(HistoryRole::Assistant, messages[0].content.clone())]
        );
        assert!(session.quick_questions().is_empty());
    }

    #[tokio::test]
    async fn notices_are_shown_but_never_sent() {
        let chat = ScriptedChat::replying(vec![Ok(ChatReply::Answer("Sure.".into()))]);
        let (session, _) = session_with(chat.clone());
        let mut revision = session.revision();

        session.push_notice("signed in as asha");

        assert!(revision.has_changed().unwrap());
        let messages = session.snapshot();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::System);
        assert_eq!(messages[1].content, "signed in as asha");
        assert_eq!(session.quick_questions().len(), 4);

        session.send_message("hello").await;

        let requests = chat.requests();
        assert_eq!(
            requests[0].history,
            vec![HistoryEntry::new(HistoryRole::Assistant, messages[0].content.clone())]
        );
    }

    #[tokio::test]
    async fn history_is_bounded_and_excludes_the_new_message() {
        let chat = ScriptedChat::replying(vec![]);
        let preferences = preferences();
        let config = SessionConfig {
            history_limit: 3,
            history_max_chars: 5,
            ..SessionConfig::default()
        };
        let session = SupportSession::new(preferences, chat.clone(), config);

        for turn in 0..3 {
            session.send_message(&format!("question {turn}")).await;
        }

        let last = chat.requests().pop().unwrap();
        assert_eq!(last.message, "question 2");
        assert_eq!(
            last.history,
            vec![
                HistoryEntry::new(HistoryRole::Assistant, "ok"),
                HistoryEntry::new(HistoryRole::User, "quest"),
                HistoryEntry::new(HistoryRole::Assistant, "ok"),
            ]
        );
    }

    #[tokio::test]
    async fn history_after_many_exchanges_uses_default_bounds() {
        let chat = ScriptedChat::replying(vec![]);
        let (session, _) = session_with(chat.clone());
        let long = "x".repeat(1500);

        for _ in 0..25 {
            session.send_message(&long).await;
        }
        session.send_message("last").await;

        let last = chat.requests().pop().unwrap();
        assert_eq!(last.history.len(), DEFAULT_HISTORY_LIMIT);
        assert!(
            last.history
                .iter()
                .all(|entry| entry.content.chars().count() <= DEFAULT_HISTORY_MAX_CHARS)
        );
        assert_eq!(last.history[18].content.chars().count(), DEFAULT_HISTORY_MAX_CHARS);
        assert_eq!(last.history[19], HistoryEntry::new(HistoryRole::Assistant, "ok"));
    }

    #[tokio::test]
    async fn empty_reply_uses_the_no_response_text() {
        let (session, _) = session_with(ScriptedChat::replying(vec![Ok(ChatReply::Empty)]));

        let outcome = session.send_message("hello").await;

        assert_eq!(outcome, SubmitOutcome::NoResponse);
        let last = session.snapshot().pop().unwrap();
        assert_eq!(last.content, FALLBACK_NO_RESPONSE);
        assert_eq!(last.status, MessageStatus::Done);
    }

    #[tokio::test]
    async fn failure_becomes_a_transcript_message() {
        let (session, _) = session_with(ScriptedChat::replying(vec![server_error()]));

        let outcome = session.send_message("hello").await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        let last = session.snapshot().pop().unwrap();
        assert_eq!(last.content, FALLBACK_UNREACHABLE);
        assert_eq!(last.status, MessageStatus::Failed);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn failure_text_follows_the_session_language() {
        let preferences = preferences();
        preferences.write("hi").unwrap();
        let session = SupportSession::new(
            preferences.clone(),
            ScriptedChat::replying(vec![server_error()]),
            SessionConfig::default(),
        );

        session.send_message("नमस्ते").await;

        let last = session.snapshot().pop().unwrap();
        assert_eq!(
            last.content,
            preferences.translate_in(Language::Hi, UNREACHABLE_KEY, None)
        );
    }

    #[tokio::test]
    async fn timeout_takes_the_failure_path() {
        let config = SessionConfig {
            request_timeout: Duration::from_millis(30),
            ..SessionConfig::default()
        };
        let session = SupportSession::new(preferences(), Arc::new(HangingChat), config);

        let outcome = session.send_message("are you there?").await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert_eq!(session.snapshot().pop().unwrap().status, MessageStatus::Failed);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn placeholder_shows_typing_while_waiting_and_second_submit_is_rejected() {
        let chat = GatedChat::new();
        let (session, _) = session_with(chat.clone());
        session.set_input("first");

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.submit_input().await })
        };
        wait_until(|| session.is_busy()).await;

        let messages = session.snapshot();
        assert_eq!(messages.len(), 3);
        assert!(messages[2].is_pending());
        assert_eq!(messages[2].content, FALLBACK_TYPING);
        assert_eq!(session.input(), "");

        let rejected = session.send_message("second").await;
        assert_eq!(rejected, SubmitOutcome::Rejected(RejectReason::Busy));
        assert_eq!(session.snapshot().len(), 3);

        chat.release();
        assert_eq!(pending.await.unwrap(), SubmitOutcome::Answered);
        assert_eq!(session.snapshot()[2].content, "answer to first");
        assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closing_does_not_cancel_the_request() {
        let chat = GatedChat::new();
        let (session, _) = session_with(chat.clone());
        session.open();

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.send_message("question").await })
        };
        wait_until(|| session.is_busy()).await;
        session.close();
        chat.release();

        assert_eq!(pending.await.unwrap(), SubmitOutcome::Answered);
        assert!(!session.is_open());
        assert_eq!(session.snapshot()[2].content, "answer to question");
    }

    #[tokio::test]
    async fn language_change_resets_to_a_fresh_greeting() {
        let (session, preferences) = session_with(ScriptedChat::replying(vec![]));
        session.send_message("hello").await;
        assert_eq!(session.snapshot().len(), 3);

        preferences.write("te").unwrap();

        let messages = session.snapshot();
        assert_eq!(messages.len(), 1);
        assert_eq!(session.language(), Language::Te);
        assert_eq!(
            messages[0].content,
            preferences.translate_in(Language::Te, GREETING_KEY, None)
        );
        assert_eq!(
            session.quick_questions()[0],
            preferences.translate_in(Language::Te, "support.q1", None)
        );
    }

    #[tokio::test]
    async fn same_language_does_not_reset() {
        let (session, preferences) = session_with(ScriptedChat::replying(vec![]));
        session.send_message("hello").await;

        preferences.write("en").unwrap();
        assert!(!session.handle_language_change(Language::En));
        assert_eq!(session.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn sign_in_with_a_different_language_resets_the_transcript() {
        let storage = MemoryStore::from_slots([(
            "userSettings:u-7",
            r#"{"preferences":{"language":"hi"}}"#,
        )]);
        let preferences = preferences_with(storage);
        let session = SupportSession::new(
            preferences.clone(),
            ScriptedChat::replying(vec![]),
            SessionConfig::default(),
        );
        assert_eq!(session.language(), Language::En);

        preferences
            .set_identity(Some(&UserIdentity::with_id("u-7")))
            .unwrap();

        assert_eq!(session.language(), Language::Hi);
        assert_eq!(session.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn late_reply_after_reset_is_discarded() {
        let chat = GatedChat::new();
        let (session, preferences) = session_with(chat.clone());

        let pending = {
            let session = session.clone();
            tokio::spawn(async move { session.send_message("question").await })
        };
        wait_until(|| session.is_busy()).await;

        preferences.write("hi").unwrap();
        assert!(!session.is_busy());
        chat.release();

        assert_eq!(pending.await.unwrap(), SubmitOutcome::Discarded);
        let messages = session.snapshot();
        assert_eq!(messages.len(), 1);
        assert!(messages.iter().all(|message| !message.is_pending()));
    }

    #[tokio::test]
    async fn quick_question_sends_its_label() {
        let chat = ScriptedChat::replying(vec![]);
        let (session, _) = session_with(chat.clone());

        let outcome = session.ask_quick_question(1).await;

        assert_eq!(outcome, SubmitOutcome::Answered);
        assert_eq!(chat.requests()[0].message, "Where can I update my profile?");
        assert_eq!(
            session.ask_quick_question(0).await,
            SubmitOutcome::Rejected(RejectReason::NoSuchQuestion)
        );
    }

    #[tokio::test]
    async fn out_of_range_quick_question_is_rejected() {
        let (session, _) = session_with(ScriptedChat::replying(vec![]));
        assert_eq!(
            session.ask_quick_question(9).await,
            SubmitOutcome::Rejected(RejectReason::NoSuchQuestion)
        );
    }

    #[tokio::test]
    async fn hidden_routes_hide_the_assistant() {
        let (session, _) = session_with(ScriptedChat::replying(vec![]));

        assert!(!session.is_visible_on("/"));
        assert!(!session.is_visible_on("/auth"));
        assert!(!session.is_visible_on("/auth/?next=/home"));
        assert!(session.is_visible_on("/dashboard"));
        assert!(session.is_visible_on("/authors"));

        session.set_location("/roadmap");
        assert!(session.is_visible());
    }

    #[tokio::test]
    async fn open_signal_opens_the_panel() {
        let (session, _) = session_with(ScriptedChat::replying(vec![]));
        let signal = OpenAssistantSignal::new();
        let listener = session.listen_for_open_signal(&signal);

        assert_eq!(signal.raise(), 1);
        wait_until(|| session.is_open()).await;

        // Same state as opening directly.
        session.open();
        assert!(session.is_open());
        assert!(!session.toggle());

        drop(signal);
        listener.await.unwrap();
    }

    #[tokio::test]
    async fn revision_moves_on_every_change() {
        let (session, _) = session_with(ScriptedChat::replying(vec![]));
        let mut revision = session.revision();
        let start = *revision.borrow_and_update();

        session.send_message("hello").await;

        assert!(revision.has_changed().unwrap());
        assert!(*revision.borrow_and_update() >= start + 2);
    }

    #[test]
    fn routes_normalize_trailing_slash_and_query() {
        assert_eq!(normalize_route(""), "/");
        assert_eq!(normalize_route("/"), "/");
        assert_eq!(normalize_route("/auth/"), "/auth");
        assert_eq!(normalize_route(" /jobs?page=2#top "), "/jobs");
    }
}
