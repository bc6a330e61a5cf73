use std::sync::OnceLock;

use regex::Regex;

fn bold_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid regex"))
}

/// Normalizes a raw model reply before it is revealed: `**bold**` wrapping
/// is stripped to its inner text, every line is trimmed, empty lines are
/// dropped, and the remaining lines are separated by one blank line.
///
/// Pure and idempotent; runs once per reply.
pub fn normalize_reply(raw: &str) -> String {
    let stripped = bold_marker().replace_all(raw, "$1");

    stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Character-by-character reveal of a completed reply into one message.
///
/// The target message starts out empty; each `step` advances the cursor by
/// one character and yields the new visible prefix, so a reply of N
/// characters passes through exactly N+1 states. The cursor walks
/// characters, not bytes, so multi-byte scripts reveal cleanly.
pub struct Reveal {
    target: u64,
    chars: Vec<char>,
    cursor: usize,
}

impl Reveal {
    pub fn new(target: u64, text: &str) -> Self {
        Self {
            target,
            chars: text.chars().collect(),
            cursor: 0,
        }
    }

    /// The id of the message this reveal writes into.
    pub fn target(&self) -> u64 {
        self.target
    }

    /// Advances one character and returns the new visible prefix, or `None`
    /// once the full text has been shown.
    pub fn step(&mut self) -> Option<String> {
        if self.cursor >= self.chars.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.chars[..self.cursor].iter().collect())
    }

    /// The complete text, used when a reveal is cancelled mid-flight and
    /// the target is snapped to its final state.
    pub fn full_text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.chars.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_bold_markers() {
        assert_eq!(normalize_reply("**Hello** world"), "Hello world");
        assert_eq!(normalize_reply("a **b** c **d** e"), "a b c d e");
    }

    #[test]
    fn test_normalize_trims_and_drops_empty_lines() {
        let raw = "  first line  \n\n\n   second line\n   \nthird";
        assert_eq!(normalize_reply(raw), "first line\n\nsecond line\n\nthird");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let raw = "**Title**\n\n  body text  \n\nmore **bold** text\n";
        let once = normalize_reply(raw);
        let twice = normalize_reply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize_reply(""), "");
        assert_eq!(normalize_reply("   \n  \n"), "");
    }

    #[test]
    fn test_reveal_passes_through_every_prefix() {
        let reply = "Hi there";
        let mut reveal = Reveal::new(7, reply);

        let mut states = vec![String::new()];
        while let Some(prefix) = reveal.step() {
            states.push(prefix);
        }

        assert_eq!(states.len(), reply.chars().count() + 1);
        for (i, state) in states.iter().enumerate() {
            let expected: String = reply.chars().take(i).collect();
            assert_eq!(state, &expected);
        }
        assert_eq!(states.last().map(String::as_str), Some(reply));
        assert!(reveal.is_done());
    }

    #[test]
    fn test_reveal_prefix_lengths_never_shrink() {
        let mut reveal = Reveal::new(0, "monotonic");
        let mut last_len = 0;
        while let Some(prefix) = reveal.step() {
            let len = prefix.chars().count();
            assert!(len > last_len);
            last_len = len;
        }
        assert_eq!(last_len, "monotonic".chars().count());
    }

    #[test]
    fn test_reveal_handles_multibyte_text() {
        let reply = "ሰላም ለዓለም";
        let mut reveal = Reveal::new(1, reply);

        let first = reveal.step().unwrap();
        assert_eq!(first, "ሰ");

        let mut last = first;
        while let Some(prefix) = reveal.step() {
            last = prefix;
        }
        assert_eq!(last, reply);
    }

    #[test]
    fn test_empty_reveal_is_done_immediately() {
        let mut reveal = Reveal::new(3, "");
        assert!(reveal.is_done());
        assert!(reveal.step().is_none());
    }

    #[test]
    fn test_full_text_mid_reveal() {
        let mut reveal = Reveal::new(2, "snap");
        reveal.step();
        assert_eq!(reveal.full_text(), "snap");
    }
}
