use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::ChatApi;
use crate::chat::{Conversation, CATEGORIES};
use crate::config::Config;
use crate::history::{FileHistory, HistoryStore, MemoryHistory};
use crate::reveal::{normalize_reply, Reveal};

/// Ticks between thinking-animation frames (~300ms at the 15ms tick rate).
const ANIMATION_TICKS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in characters

    // Conversation state
    pub conversation: Conversation,
    pub reveal: Option<Reveal>,
    pub task: Option<JoinHandle<Result<String>>>,

    // Chat viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub total_chat_lines: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
    tick_count: u32,

    // Reset confirmation popup
    pub show_reset_confirm: bool,

    pub api: ChatApi,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let history: Box<dyn HistoryStore> = match FileHistory::new() {
            Ok(store) => Box::new(store),
            Err(err) => {
                warn!("falling back to in-memory history: {err:#}");
                Box::new(MemoryHistory::new())
            }
        };

        let conversation = Conversation::new(history, config.initial_language());
        let api = ChatApi::new(&config.api_base_url());

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            conversation,
            reveal: None,
            task: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            total_chat_lines: 0,

            animation_frame: 0,
            tick_count: 0,

            show_reset_confirm: false,

            api,
        }
    }

    /// True while the completion call is still on the wire (the thinking
    /// indicator shows for this window, the reveal takes over after it).
    pub fn is_thinking(&self) -> bool {
        self.conversation.is_pending() && self.reveal.is_none()
    }

    /// Submits the current input buffer. No-op when the trimmed input is
    /// empty or a cycle is already pending; the buffer is only cleared on
    /// an accepted submission.
    pub fn submit(&mut self) {
        let raw = self.input.clone();
        let Some(prompt) = self.conversation.begin_submit(&raw) else {
            return;
        };

        self.input.clear();
        self.cursor = 0;
        info!("submitting prompt ({} chars)", prompt.chars().count());

        let api = self.api.clone();
        self.task = Some(tokio::spawn(async move { api.complete(&prompt).await }));
    }

    /// Collects a finished completion call, if any. Only ever called from
    /// the run loop, so every store mutation stays on one task.
    pub async fn poll_completion(&mut self) {
        let finished = self.task.as_ref().is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }
        let Some(task) = self.task.take() else {
            return;
        };

        let outcome = match task.await {
            Ok(result) => result,
            Err(err) => Err(anyhow::anyhow!("completion task failed: {err}")),
        };

        match outcome {
            Ok(raw_reply) => {
                let reply = normalize_reply(&raw_reply);
                let target = self.conversation.push_assistant_placeholder();
                if reply.is_empty() {
                    // Nothing to type out; close the cycle right away
                    self.conversation.finish_reveal();
                } else {
                    self.reveal = Some(Reveal::new(target, &reply));
                }
            }
            Err(err) => {
                warn!("completion failed: {err:#}");
                self.conversation.fail(&err.to_string());
            }
        }
    }

    /// Advances the reveal by one character and the thinking animation on
    /// its slower cadence.
    pub fn on_tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
        if self.is_thinking() && self.tick_count % ANIMATION_TICKS == 0 {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }

        if let Some(reveal) = &mut self.reveal {
            match reveal.step() {
                Some(prefix) => self.conversation.set_message_text(reveal.target(), prefix),
                None => {
                    self.reveal = None;
                    self.conversation.finish_reveal();
                }
            }
        }
    }

    /// Snaps an in-flight reveal to its full text and closes the cycle, so
    /// no later mutation can race a live reveal.
    pub fn cancel_reveal(&mut self) {
        if let Some(reveal) = self.reveal.take() {
            self.conversation
                .set_message_text(reveal.target(), reveal.full_text());
            self.conversation.finish_reveal();
        }
    }

    /// Fills the input buffer with the quick-prompt for a category and
    /// starts editing. Nothing is sent yet.
    pub fn select_category(&mut self, index: usize) {
        if let Some(label) = CATEGORIES.get(index) {
            self.input = self.conversation.category_prompt(label);
            self.cursor = self.input.chars().count();
            self.input_mode = InputMode::Editing;
        }
    }

    pub fn toggle_language(&mut self) {
        let language = self.conversation.language().toggle();
        self.conversation.set_language(language);
        // Save to config
        let _ = Config::save_language(language);
    }

    /// Confirmed reset: abort any outstanding call, finish any reveal,
    /// clear the conversation and its snapshot.
    pub fn confirm_reset(&mut self) {
        self.show_reset_confirm = false;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.cancel_reveal();
        self.conversation.reset();
        self.chat_scroll = 0;
        info!("conversation reset");
    }

    // Chat scrolling
    pub fn scroll_down(&mut self) {
        let max_scroll = self.total_chat_lines.saturating_sub(self.chat_height);
        if self.chat_scroll < max_scroll {
            self.chat_scroll = self.chat_scroll.saturating_add(1);
        }
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    /// Scroll so the newest chat line is visible
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.conversation.messages() {
            total_lines += 1; // Role line ("You:" or "AI:")
            // Calculate wrapped lines for each line of content
            for line in msg.text.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.is_thinking() {
            total_lines += 2; // "AI:" + thinking indicator
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }
}
