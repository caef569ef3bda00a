//! Tag-aware extractor (spec §4.1): splits an unframed token stream into
//! `reasoning_content` spans (inside `<think>...</think>`) and `content`
//! spans (outside), without ever emitting a byte that belongs to an
//! as-yet-incomplete marker.

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// One call's output: at most one of each side, empty strings omitted by
/// the caller (the core module keeps them as `String` — orchestration in
/// `pipeline` decides when to actually emit a delta).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPiece {
    pub content: String,
    pub reasoning: String,
}

impl ExtractedPiece {
    fn is_empty(&self) -> bool {
        self.content.is_empty() && self.reasoning.is_empty()
    }
}

pub struct Extractor {
    buffer: String,
    inside_think_block: bool,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            inside_think_block: false,
        }
    }

    pub fn is_inside_think_block(&self) -> bool {
        self.inside_think_block
    }

    /// Feed one generator text piece; returns the content/reasoning
    /// fragments safe to emit now.
    pub fn push(&mut self, piece: &str) -> ExtractedPiece {
        self.buffer.push_str(piece);
        let mut out = ExtractedPiece::default();

        loop {
            if self.inside_think_block {
                if let Some(idx) = self.buffer.find(THINK_CLOSE) {
                    out.reasoning.push_str(&self.buffer[..idx]);
                    self.buffer = self.buffer[idx + THINK_CLOSE.len()..].to_string();
                    self.inside_think_block = false;
                    continue;
                }
                self.retain_residual(THINK_CLOSE.len() - 1, &mut out.reasoning);
                break;
            } else if let Some(idx) = self.buffer.find(THINK_OPEN) {
                out.content.push_str(&self.buffer[..idx]);
                self.buffer = self.buffer[idx + THINK_OPEN.len()..].to_string();
                self.inside_think_block = true;
                continue;
            } else {
                self.retain_residual(THINK_OPEN.len() - 1, &mut out.content);
                break;
            }
        }

        out
    }

    fn retain_residual(&mut self, residual_len: usize, flush_into: &mut String) {
        if self.buffer.len() > residual_len {
            let split_at = self.buffer.len() - residual_len;
            flush_into.push_str(&self.buffer[..split_at]);
            self.buffer = self.buffer[split_at..].to_string();
        }
    }

    /// Flush whatever remains on stream end: as reasoning if a `<think>`
    /// block was left open, else as content. Never trims — trimming is
    /// only applied to the assembled non-streaming final object.
    pub fn finish(mut self) -> ExtractedPiece {
        let mut out = ExtractedPiece::default();
        if self.inside_think_block {
            out.reasoning.push_str(&self.buffer);
        } else {
            out.content.push_str(&self.buffer);
        }
        self.buffer.clear();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(pieces: &[&str]) -> (String, String) {
        let mut ex = Extractor::new();
        let mut content = String::new();
        let mut reasoning = String::new();
        for p in pieces {
            let out = ex.push(p);
            content.push_str(&out.content);
            reasoning.push_str(&out.reasoning);
        }
        let tail = ex.finish();
        content.push_str(&tail.content);
        reasoning.push_str(&tail.reasoning);
        (content, reasoning)
    }

    #[test]
    fn think_tag_split_across_pieces() {
        let (content, reasoning) = run(&["Hello <thi", "nk>secret</thi", "nk> world"]);
        assert_eq!(content, "Hello  world");
        assert_eq!(reasoning, "secret");
    }

    #[test]
    fn no_think_tags_is_all_content() {
        let (content, reasoning) = run(&["just plain text"]);
        assert_eq!(content, "just plain text");
        assert_eq!(reasoning, "");
    }

    #[test]
    fn multiple_think_blocks_in_one_piece() {
        let (content, reasoning) = run(&["A<think>r1</think>B<think>r2</think>C"]);
        assert_eq!(content, "ABC");
        assert_eq!(reasoning, "r1r2");
    }

    #[test]
    fn residual_never_leaks_partial_marker() {
        // "<thin" must never show up as content before the tag completes.
        let mut ex = Extractor::new();
        let out = ex.push("before <thin");
        assert_eq!(out.content, "before ");
        let out2 = ex.push("k>inside</think>after");
        assert_eq!(out2.reasoning, "inside");
        assert_eq!(out2.content, "after");
    }

    #[test]
    fn empty_piece_produces_empty_output() {
        let mut ex = Extractor::new();
        assert!(ex.push("").is_empty());
    }
}
