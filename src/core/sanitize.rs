//! Degenerate-tail sanitizer (spec §4.6): applied to non-streaming
//! content before it's returned to the client, to defend against known
//! generator collapse modes.

use std::sync::OnceLock;

use regex::Regex;

const FFFD: char = '\u{FFFD}';
const TAIL_WINDOW: usize = 512;

fn repeated_punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([!?.:,;~_\-*=|])\1{79,}\s*$").unwrap())
}

pub fn sanitize_tail(content: &str) -> String {
    let truncated = truncate_at_replacement_char(content);
    strip_repeated_punctuation_run(&truncated)
}

fn truncate_at_replacement_char(content: &str) -> String {
    let char_count = content.chars().count();
    if char_count <= TAIL_WINDOW {
        if let Some(idx) = content.find(FFFD) {
            return content[..idx].to_string();
        }
        return content.to_string();
    }

    let window_start_char = char_count - TAIL_WINDOW;
    let window_start_byte = content
        .char_indices()
        .nth(window_start_char)
        .map(|(i, _)| i)
        .unwrap_or(0);

    if let Some(rel_idx) = content[window_start_byte..].find(FFFD) {
        return content[..window_start_byte + rel_idx].to_string();
    }
    content.to_string()
}

fn strip_repeated_punctuation_run(content: &str) -> String {
    if let Some(mat) = repeated_punctuation_re().find(content) {
        content[..mat.start()].trim_end().to_string()
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_tail_scenario() {
        let content = format!("Answer: 42{}", "!".repeat(80));
        assert_eq!(sanitize_tail(&content), "Answer: 42");
    }

    #[test]
    fn short_punctuation_run_is_left_alone() {
        let content = "Wait, really?!";
        assert_eq!(sanitize_tail(content), content);
    }

    #[test]
    fn replacement_char_near_tail_truncates() {
        let content = format!("hello world{FFFD}garbage");
        assert_eq!(sanitize_tail(&content), "hello world");
    }

    #[test]
    fn replacement_char_far_from_tail_is_left_alone() {
        let mut content = String::from("x");
        content.push(FFFD);
        content.push_str(&"a".repeat(600));
        let sanitized = sanitize_tail(&content);
        assert_eq!(sanitized, content);
    }
}
