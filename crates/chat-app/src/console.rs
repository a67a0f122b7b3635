use std::collections::{HashMap, HashSet};

use learnovate_support::{ChatMessage, MessageId, MessageStatus, Role};

pub const HELP_TEXT: &str = "\
commands:
  <text>            ask the assistant (opens the panel)
  /quick <n>        ask quick question n (only before the first question)
  /lang <code>      switch language (en, te, hi)
  /login <id>       sign in as a user id or email
  /logout           sign out
  /path <route>     move to another page, e.g. /path /dashboard
  /open /close /toggle
  /signal           raise the app-wide open-assistant signal
  /show             print the whole transcript
  /help /quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Quick(usize),
    Language(String),
    Login(String),
    Logout,
    Path(String),
    Open,
    Close,
    Toggle,
    Signal,
    Show,
    Help,
    Quit,
    Unknown(String),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Say(line.to_string()));
    };
    let (name, argument) = rest
        .split_once(char::is_whitespace)
        .map(|(name, argument)| (name, argument.trim()))
        .unwrap_or((rest, ""));

    let command = match name {
        "lang" | "language" if !argument.is_empty() => Command::Language(argument.to_string()),
        // Quick questions are numbered from 1 on screen.
        "quick" => match argument.parse::<usize>() {
            Ok(number) if number >= 1 => Command::Quick(number - 1),
            _ => Command::Unknown(line.to_string()),
        },
        "login" if !argument.is_empty() => Command::Login(argument.to_string()),
        "logout" => Command::Logout,
        "path" if !argument.is_empty() => Command::Path(argument.to_string()),
        "open" => Command::Open,
        "close" => Command::Close,
        "toggle" => Command::Toggle,
        "signal" => Command::Signal,
        "show" => Command::Show,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

pub fn format_message(message: &ChatMessage) -> String {
    match (message.role, message.status) {
        (Role::User, _) => format!("you       > {}", message.content),
        (Role::Assistant, MessageStatus::Pending(_)) => format!("assistant … {}", message.content),
        (Role::Assistant, MessageStatus::Failed) => format!("assistant ! {}", message.content),
        (Role::Assistant, MessageStatus::Done) => format!("assistant > {}", message.content),
        (Role::System, _) => format!("* {}", message.content),
    }
}

/// Tracks what has been printed so only new or re-resolved entries are shown.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    shown: HashMap<MessageId, MessageStatus>,
}

impl TranscriptPrinter {
    pub fn updates(&mut self, messages: &[ChatMessage]) -> Vec<String> {
        let current = messages
            .iter()
            .map(|message| message.id)
            .collect::<HashSet<_>>();
        self.shown.retain(|id, _| current.contains(id));

        let mut lines = Vec::new();
        for message in messages {
            if self.shown.get(&message.id) == Some(&message.status) {
                continue;
            }
            self.shown.insert(message.id, message.status);
            lines.push(format_message(message));
        }
        lines
    }

    pub fn forget(&mut self) {
        self.shown.clear();
    }
}

#[cfg(test)]
mod tests {
    use learnovate_support::Transcript;
    use learnovate_support::Resolution;

    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse_command("  how do I reset?  "),
            Some(Command::Say("how do I reset?".into()))
        );
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn slash_commands_parse_their_argument() {
        assert_eq!(parse_command("/lang te"), Some(Command::Language("te".into())));
        assert_eq!(parse_command("/quick 2"), Some(Command::Quick(1)));
        assert_eq!(parse_command("/path /dashboard"), Some(Command::Path("/dashboard".into())));
        assert_eq!(
            parse_command("/login ana@example.com"),
            Some(Command::Login("ana@example.com".into()))
        );
        assert_eq!(parse_command("/exit"), Some(Command::Quit));
    }

    #[test]
    fn malformed_commands_are_unknown() {
        assert_eq!(parse_command("/quick 0"), Some(Command::Unknown("/quick 0".into())));
        assert_eq!(parse_command("/lang"), Some(Command::Unknown("/lang".into())));
        assert_eq!(parse_command("/dance"), Some(Command::Unknown("/dance".into())));
    }

    #[test]
    fn printer_shows_new_and_resolved_entries_once() {
        let mut transcript = Transcript::with_greeting("Hello!");
        let mut printer = TranscriptPrinter::default();

        assert_eq!(printer.updates(transcript.messages()), vec!["assistant > Hello!"]);

        let token = transcript.push_exchange("question", "Typing…");
        assert_eq!(
            printer.updates(transcript.messages()),
            vec!["you       > question", "assistant … Typing…"]
        );
        assert!(printer.updates(transcript.messages()).is_empty());

        transcript.resolve(token, "answer", Resolution::Failed);
        assert_eq!(printer.updates(transcript.messages()), vec!["assistant ! answer"]);
    }

    #[test]
    fn printer_shows_the_new_greeting_after_reset() {
        let mut transcript = Transcript::with_greeting("Hello!");
        let mut printer = TranscriptPrinter::default();
        printer.updates(transcript.messages());

        transcript.reset_with_greeting("नमस्ते!");
        assert_eq!(printer.updates(transcript.messages()), vec!["assistant > नमस्ते!"]);
    }
}
