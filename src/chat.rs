use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::history::HistoryStore;

/// Fixed marker prepended to assistant messages that report a failed request.
pub const ERROR_PREFIX: &str = "⚠️ Error: ";

/// Quick-prompt topics offered in the UI, bound to keys 1-4.
pub const CATEGORIES: [&str; 4] = ["Health", "Education", "Agriculture", "Technology"];

/// A chat message in the conversation.
///
/// `id` is a runtime-only handle: it is never persisted and is reassigned
/// when a snapshot is restored. The reveal targets its message through it
/// rather than through a position in the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(skip)]
    pub id: u64,
    pub role: ChatRole,
    pub text: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Amharic,
}

impl Language {
    pub fn toggle(self) -> Self {
        match self {
            Language::English => Language::Amharic,
            Language::Amharic => Language::English,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Amharic => "amharic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "english" => Some(Language::English),
            "amharic" => Some(Language::Amharic),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Amharic => "አማርኛ",
        }
    }

    fn prompt_prefix(self) -> &'static str {
        match self {
            Language::English => "Please reply in English: ",
            Language::Amharic => "እባክህ በአማርኛ መልስልኝ: ",
        }
    }

    pub fn input_placeholder(self) -> &'static str {
        match self {
            Language::English => "Type your message here...",
            Language::Amharic => "መልእክትህን እዚህ ጻፍ...",
        }
    }

    pub fn thinking_label(self) -> &'static str {
        match self {
            Language::English => "Thinking",
            Language::Amharic => "በማሰብ ላይ",
        }
    }
}

/// The authoritative holder of conversation state.
///
/// All mutations go through this type; each one rewrites the persisted
/// snapshot (reveal steps excepted, those persist once on completion) and
/// raises the `changed` flag the run loop drains to scroll to the latest
/// message.
pub struct Conversation {
    messages: Vec<ChatMessage>,
    next_id: u64,
    pending: bool,
    language: Language,
    history: Box<dyn HistoryStore>,
    changed: bool,
}

impl Conversation {
    /// Restores the persisted snapshot. Absent or unreadable snapshots
    /// count as an empty conversation.
    pub fn new(history: Box<dyn HistoryStore>, language: Language) -> Self {
        let mut messages = match history.load() {
            Ok(messages) => messages,
            Err(err) => {
                warn!("could not restore chat history: {err:#}");
                Vec::new()
            }
        };

        for (i, message) in messages.iter_mut().enumerate() {
            message.id = i as u64;
        }
        let next_id = messages.len() as u64;

        Self {
            messages,
            next_id,
            pending: false,
            language,
            history,
            changed: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Changes the language mode. Already-sent messages are unaffected.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
        self.changed = true;
    }

    /// Starts a submission cycle: appends the user message, raises
    /// `pending`, persists, and returns the full outgoing prompt.
    ///
    /// Returns `None` without any state change when the trimmed input is
    /// empty or a cycle is already running.
    pub fn begin_submit(&mut self, raw: &str) -> Option<String> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        if self.pending {
            debug!("submission ignored, a request is already in flight");
            return None;
        }

        self.push(ChatRole::User, text.to_string());
        self.pending = true;
        Some(format!("{}{}", self.language.prompt_prefix(), text))
    }

    /// Appends the empty assistant message a reveal will fill in and
    /// returns its id.
    pub fn push_assistant_placeholder(&mut self) -> u64 {
        self.push(ChatRole::Assistant, String::new())
    }

    /// Reveal-step mutation: replaces the text of the message with the
    /// given id. Does not persist; the snapshot is written once when the
    /// reveal finishes.
    pub fn set_message_text(&mut self, id: u64, text: String) {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.text = text;
                self.changed = true;
            }
            None => debug!(id, "reveal target no longer exists"),
        }
    }

    /// Closes a submission cycle after its reveal has completed.
    pub fn finish_reveal(&mut self) {
        self.pending = false;
        self.persist();
        self.changed = true;
    }

    /// Records a failed completion call: one assistant message carrying the
    /// error marker, no reveal, cycle closed immediately.
    pub fn fail(&mut self, description: &str) {
        self.pending = false;
        self.push(ChatRole::Assistant, format!("{ERROR_PREFIX}{description}"));
    }

    /// The language-appropriate quick-prompt for a category label. Pure:
    /// nothing is appended and no call is made.
    pub fn category_prompt(&self, label: &str) -> String {
        match self.language {
            Language::English => format!("Please give me information about {label}."),
            Language::Amharic => format!("እባክህ መረጃ ስጠኝ ስለ {label}."),
        }
    }

    /// Clears the conversation and wipes the persisted snapshot. The
    /// confirmation gate lives in the presentation layer.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.pending = false;
        if let Err(err) = self.history.clear() {
            warn!("could not clear chat history: {err:#}");
        }
        self.changed = true;
    }

    /// Drains the change flag. The run loop uses this to scroll to the
    /// latest message after any mutation.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn push(&mut self, role: ChatRole, text: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage { id, role, text });
        self.persist();
        self.changed = true;
        id
    }

    fn persist(&mut self) {
        // A failed write is not fatal; the conversation stays usable.
        if let Err(err) = self.history.save(&self.messages) {
            warn!("could not persist chat history: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;
    use crate::reveal::Reveal;

    fn conversation(language: Language) -> (Conversation, MemoryHistory) {
        let store = MemoryHistory::new();
        let convo = Conversation::new(Box::new(store.clone()), language);
        (convo, store)
    }

    #[test]
    fn test_submit_appends_user_message_and_sets_pending() {
        let (mut convo, store) = conversation(Language::English);

        let prompt = convo.begin_submit("Hello").unwrap();
        assert_eq!(prompt, "Please reply in English: Hello");
        assert_eq!(convo.messages().len(), 1);
        assert_eq!(convo.messages()[0].role, ChatRole::User);
        assert_eq!(convo.messages()[0].text, "Hello");
        assert!(convo.is_pending());
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_submit_trims_whitespace() {
        let (mut convo, _store) = conversation(Language::English);

        let prompt = convo.begin_submit("  Hello  ").unwrap();
        assert_eq!(prompt, "Please reply in English: Hello");
        assert_eq!(convo.messages()[0].text, "Hello");
    }

    #[test]
    fn test_whitespace_only_submit_is_a_no_op() {
        let (mut convo, store) = conversation(Language::English);

        assert!(convo.begin_submit("  ").is_none());
        assert!(convo.begin_submit("").is_none());
        assert!(convo.messages().is_empty());
        assert!(!convo.is_pending());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_submit_while_pending_is_rejected() {
        let (mut convo, _store) = conversation(Language::English);

        assert!(convo.begin_submit("first").is_some());
        assert!(convo.begin_submit("second").is_none());
        assert_eq!(convo.messages().len(), 1);
    }

    #[test]
    fn test_successful_cycle_grows_by_two_and_clears_pending() {
        let (mut convo, _store) = conversation(Language::English);

        convo.begin_submit("Hello").unwrap();
        let target = convo.push_assistant_placeholder();
        let mut reveal = Reveal::new(target, "Hi there");
        while let Some(prefix) = reveal.step() {
            convo.set_message_text(target, prefix);
        }
        convo.finish_reveal();

        assert_eq!(convo.messages().len(), 2);
        assert_eq!(convo.messages()[0].role, ChatRole::User);
        assert_eq!(convo.messages()[0].text, "Hello");
        assert_eq!(convo.messages()[1].role, ChatRole::Assistant);
        assert_eq!(convo.messages()[1].text, "Hi there");
        assert!(!convo.is_pending());
    }

    #[test]
    fn test_failed_cycle_appends_error_marked_message() {
        let (mut convo, _store) = conversation(Language::English);

        convo.begin_submit("Hello").unwrap();
        convo.fail("timeout");

        assert_eq!(convo.messages().len(), 2);
        assert_eq!(convo.messages()[1].role, ChatRole::Assistant);
        assert_eq!(convo.messages()[1].text, "⚠️ Error: timeout");
        assert!(!convo.is_pending());
    }

    #[test]
    fn test_category_prompt_english() {
        let (convo, _store) = conversation(Language::English);
        assert_eq!(
            convo.category_prompt("Health"),
            "Please give me information about Health."
        );
    }

    #[test]
    fn test_category_prompt_amharic() {
        let (convo, _store) = conversation(Language::Amharic);
        assert_eq!(convo.category_prompt("Health"), "እባክህ መረጃ ስጠኝ ስለ Health.");
        assert!(convo.messages().is_empty());
    }

    #[test]
    fn test_amharic_prompt_prefix() {
        let (mut convo, _store) = conversation(Language::Amharic);
        let prompt = convo.begin_submit("ሰላም").unwrap();
        assert_eq!(prompt, "እባክህ በአማርኛ መልስልኝ: ሰላም");
    }

    #[test]
    fn test_language_switch_does_not_touch_sent_messages() {
        let (mut convo, _store) = conversation(Language::English);

        convo.begin_submit("Hello").unwrap();
        convo.fail("timeout");
        convo.set_language(Language::Amharic);

        assert_eq!(convo.messages()[0].text, "Hello");
        let prompt = convo.begin_submit("ሰላም").unwrap();
        assert!(prompt.starts_with("እባክህ በአማርኛ መልስልኝ: "));
    }

    #[test]
    fn test_restore_round_trip() {
        let store = MemoryHistory::new();
        {
            let mut convo = Conversation::new(Box::new(store.clone()), Language::English);
            convo.begin_submit("Hello").unwrap();
            let target = convo.push_assistant_placeholder();
            convo.set_message_text(target, "Hi there".to_string());
            convo.finish_reveal();
        }

        let restored = Conversation::new(Box::new(store.clone()), Language::English);
        assert_eq!(restored.messages().len(), 2);
        assert_eq!(restored.messages()[0].text, "Hello");
        assert_eq!(restored.messages()[1].text, "Hi there");
        assert!(!restored.is_pending());
        // Ids are reassigned densely on restore
        assert_eq!(restored.messages()[0].id, 0);
        assert_eq!(restored.messages()[1].id, 1);
    }

    #[test]
    fn test_reset_clears_messages_and_snapshot() {
        let (mut convo, store) = conversation(Language::English);

        convo.begin_submit("Hello").unwrap();
        convo.fail("timeout");
        assert_eq!(store.snapshot().len(), 2);

        convo.reset();
        assert!(convo.messages().is_empty());
        assert!(!convo.is_pending());
        assert!(store.snapshot().is_empty());

        // The store accepts new cycles after a reset
        assert!(convo.begin_submit("again").is_some());
    }

    #[test]
    fn test_set_message_text_ignores_unknown_id() {
        let (mut convo, _store) = conversation(Language::English);
        convo.begin_submit("Hello").unwrap();
        convo.set_message_text(999, "ghost".to_string());
        assert_eq!(convo.messages()[0].text, "Hello");
    }
}
