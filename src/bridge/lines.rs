use tracing::warn;

pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    limit: usize,
    skipping: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
            skipping: false,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            if std::mem::take(&mut self.skipping) {
                continue;
            }
            if raw.len() - 1 > self.limit {
                warn!(bytes = raw.len() - 1, "discarding oversized worker line");
                continue;
            }
            if let Some(line) = clean(&raw[..raw.len() - 1]) {
                lines.push(line);
            }
        }
        if self.pending.len() > self.limit {
            if !self.skipping {
                warn!(limit = self.limit, "discarding oversized worker line");
            }
            self.pending.clear();
            self.skipping = true;
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.skipping) {
            return None;
        }
        clean(&rest)
    }
}

fn clean(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_fragment_across_reads() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"{\"type\":").is_empty());
        assert_eq!(buffer.push(b"\"ready\"}\n{\"a\""), vec!["{\"type\":\"ready\"}"]);
        assert_eq!(buffer.push(b":1}\n"), vec!["{\"a\":1}"]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn tolerates_crlf_and_blank_lines() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"one\r\n\r\n\ntwo\n"), vec!["one", "two"]);
    }

    #[test]
    fn finish_returns_unterminated_tail() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"first\nsecond");
        assert_eq!(buffer.finish().as_deref(), Some("second"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn oversized_fragment_is_dropped_until_its_newline() {
        let mut buffer = LineBuffer::with_limit(8);
        assert!(buffer.push(b"0123456").is_empty());
        assert!(buffer.push(b"789abcdef").is_empty());
        assert!(buffer.pending.is_empty());
        assert!(buffer.push(b"more garbage").is_empty());
        assert!(buffer.pending.len() <= 8);
        assert_eq!(buffer.push(b"tail\nok\n"), vec!["ok"]);
        assert_eq!(buffer.push(b"next"), Vec::<String>::new());
        assert_eq!(buffer.finish().as_deref(), Some("next"));
    }

    #[test]
    fn oversized_complete_line_is_dropped() {
        let mut buffer = LineBuffer::with_limit(4);
        assert_eq!(buffer.push(b"toolong\nfine\n"), vec!["fine"]);
    }

    #[test]
    fn unterminated_oversized_tail_is_not_returned() {
        let mut buffer = LineBuffer::with_limit(4);
        buffer.push(b"overflowing");
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn multibyte_characters_split_between_reads() {
        let mut buffer = LineBuffer::new();
        let bytes = "名前\n".as_bytes();
        assert!(buffer.push(&bytes[..2]).is_empty());
        assert_eq!(buffer.push(&bytes[2..]), vec!["名前"]);
    }
}
