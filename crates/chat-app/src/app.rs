use std::sync::Arc;

use learnovate_i18n::{PreferenceStore, TranslationCatalog, UserIdentity};
use learnovate_llm::create_chat_client;
use learnovate_storage::{FileStore, KeyValueStore};
use learnovate_support::{OpenAssistantSignal, SupportSession};
use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::console::{Command, HELP_TEXT, TranscriptPrinter, parse_command};
use crate::error::{AppResult, ChatClientSnafu, LoadTranslationsSnafu, TerminalSnafu};

/// Terminal front-end wiring preferences, the chat client and the session.
pub struct ChatApp {
    preferences: Arc<PreferenceStore>,
    session: SupportSession,
    open_signal: OpenAssistantSignal,
    printer: TranscriptPrinter,
    // Whether the panel was showing at the last render.
    was_showing: bool,
    external_watch: JoinHandle<()>,
    open_listener: JoinHandle<()>,
}

impl ChatApp {
    /// Must be called inside the tokio runtime; it spawns the background watchers.
    pub fn build(config: &AppConfig) -> AppResult<Self> {
        let storage_path = config.storage_path();
        tracing::info!(path = %storage_path.display(), "using preference storage");
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(storage_path));

        let catalog = match &config.translations_dir {
            Some(dir) => TranslationCatalog::load_dir(dir).context(LoadTranslationsSnafu {
                stage: "load-translations-dir",
            })?,
            None => TranslationCatalog::builtin(),
        };

        let preferences = Arc::new(PreferenceStore::with_default_language(
            storage,
            Arc::new(catalog),
            config.default_language,
        ));
        let chat = create_chat_client(config.client_config()).context(ChatClientSnafu {
            stage: "create-chat-client",
        })?;

        let session = SupportSession::new(preferences.clone(), chat, config.session_config());
        let open_signal = OpenAssistantSignal::new();
        let open_listener = session.listen_for_open_signal(&open_signal);
        let external_watch = preferences.spawn_external_watch(config.external_sync_interval());

        Ok(Self {
            preferences,
            session,
            open_signal,
            printer: TranscriptPrinter::default(),
            was_showing: false,
            external_watch,
            open_listener,
        })
    }

    pub async fn run(mut self) -> AppResult<()> {
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut revision = self.session.revision();

        let banner = vec![
            format!(
                "LearnovateX assistant [{}] on {}",
                self.preferences.language().native_name(),
                self.session.location()
            ),
            "type /help for commands, /open to show the assistant".to_string(),
        ];
        emit(&mut stdout, banner).await?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = line.context(TerminalSnafu { stage: "read-stdin" })?;
                    let Some(line) = line else {
                        break;
                    };
                    let Some(command) = parse_command(&line) else {
                        continue;
                    };
                    if command == Command::Quit {
                        break;
                    }
                    let output = self.handle(command);
                    emit(&mut stdout, output).await?;
                }
                changed = revision.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let output = self.render_updates();
                    emit(&mut stdout, output).await?;
                }
            }
        }

        self.external_watch.abort();
        self.open_listener.abort();
        Ok(())
    }

    fn handle(&mut self, command: Command) -> Vec<String> {
        match command {
            Command::Say(text) => {
                if !self.session.is_visible() {
                    return vec![format!(
                        "the assistant is not available on {}",
                        self.session.location()
                    )];
                }
                if self.session.is_busy() {
                    return vec!["still waiting for the previous answer".to_string()];
                }
                self.session.open();
                self.session.set_input(text);

                let session = self.session.clone();
                tokio::spawn(async move {
                    let outcome = session.submit_input().await;
                    tracing::debug!(?outcome, "support exchange finished");
                });
                Vec::new()
            }
            Command::Quick(index) => {
                if self.session.quick_questions().get(index).is_none() {
                    return vec!["no such quick question right now".to_string()];
                }
                self.session.open();

                let session = self.session.clone();
                tokio::spawn(async move {
                    let outcome = session.ask_quick_question(index).await;
                    tracing::debug!(?outcome, "quick question finished");
                });
                Vec::new()
            }
            Command::Language(code) => match self.preferences.write(&code) {
                Ok(language) => vec![format!("language: {}", language.native_name())],
                Err(error) => {
                    tracing::warn!(error = %error, "language preference not persisted");
                    vec![format!(
                        "language: {} (not saved: {error})",
                        self.preferences.language().native_name()
                    )]
                }
            },
            Command::Login(raw) => {
                let identity = if raw.contains('@') {
                    UserIdentity::with_email(raw.as_str())
                } else {
                    UserIdentity::with_id(raw.as_str())
                };
                match self.preferences.set_identity(Some(&identity)) {
                    Ok(language) => {
                        self.session.push_notice(format!("signed in as {raw}"));
                        vec![format!("signed in, language {}", language.native_name())]
                    }
                    Err(error) => vec![format!("sign-in failed: {error}")],
                }
            }
            Command::Logout => match self.preferences.set_identity(None) {
                Ok(language) => {
                    self.session.push_notice("signed out");
                    vec![format!("signed out, language {}", language.native_name())]
                }
                Err(error) => vec![format!("sign-out failed: {error}")],
            },
            Command::Path(route) => {
                self.session.set_location(&route);
                if self.session.is_visible() {
                    vec![format!("now on {}", self.session.location())]
                } else {
                    vec![format!(
                        "now on {}; the assistant is hidden here",
                        self.session.location()
                    )]
                }
            }
            Command::Open => {
                self.session.open();
                Vec::new()
            }
            Command::Close => {
                self.session.close();
                vec!["assistant closed".to_string()]
            }
            Command::Toggle => {
                if !self.session.toggle() {
                    return vec!["assistant closed".to_string()];
                }
                Vec::new()
            }
            Command::Signal => {
                let listeners = self.open_signal.raise();
                tracing::debug!(listeners, "open assistant signal raised");
                Vec::new()
            }
            Command::Show => {
                self.was_showing = false;
                self.render_updates()
            }
            Command::Help => HELP_TEXT.lines().map(str::to_string).collect(),
            Command::Unknown(raw) => vec![format!("unknown command `{raw}`, try /help")],
            Command::Quit => Vec::new(),
        }
    }

    fn render_updates(&mut self) -> Vec<String> {
        let showing = self.session.is_open() && self.session.is_visible();
        if !showing {
            self.was_showing = false;
            return Vec::new();
        }

        let mut lines = Vec::new();
        if !self.was_showing {
            self.was_showing = true;
            self.printer.forget();
            lines.push(format!("── assistant ({}) ──", self.session.input_placeholder()));
        }

        lines.extend(self.printer.updates(&self.session.snapshot()));

        let quick_questions = self.session.quick_questions();
        if !lines.is_empty() && !quick_questions.is_empty() {
            lines.push(self.session.quick_questions_title());
            lines.extend(
                quick_questions
                    .iter()
                    .enumerate()
                    .map(|(index, label)| format!("  /quick {} {label}", index + 1)),
            );
        }
        lines
    }
}

async fn emit(stdout: &mut Stdout, lines: Vec<String>) -> AppResult<()> {
    if lines.is_empty() {
        return Ok(());
    }
    for line in lines {
        stdout
            .write_all(format!("{line}\n").as_bytes())
            .await
            .context(TerminalSnafu {
                stage: "write-stdout",
            })?;
    }
    stdout.flush().await.context(TerminalSnafu {
        stage: "flush-stdout",
    })
}
