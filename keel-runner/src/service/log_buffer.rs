//! Log batch buffer
//!
//! Accumulates sanitized log lines and hands them out in fixed-size
//! batches, so persistence round-trips are bounded regardless of how much
//! output a job produces.

/// Fixed-capacity line buffer
#[derive(Debug)]
pub struct LogBatch {
    lines: Vec<String>,
    capacity: usize,
}

impl LogBatch {
    /// Creates a buffer flushing every `capacity` lines (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds a line; returns the full batch once `capacity` lines are buffered
    pub fn push(&mut self, line: String) -> Option<Vec<String>> {
        self.lines.push(line);
        if self.lines.len() >= self.capacity {
            Some(std::mem::replace(
                &mut self.lines,
                Vec::with_capacity(self.capacity),
            ))
        } else {
            None
        }
    }

    /// Drains whatever is buffered, if anything
    pub fn drain(&mut self) -> Option<Vec<String>> {
        if self.lines.is_empty() {
            None
        } else {
            Some(self.lines.drain(..).collect())
        }
    }
}

/// Strips the line terminator and null bytes from a raw output line
///
/// Returns `None` for lines that are empty once sanitized.
pub fn sanitize_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

    let line: String = String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| *c != '\0')
        .collect();

    if line.is_empty() { None } else { Some(line) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_flushes_at_capacity() {
        let mut batch = LogBatch::new(2);
        assert_eq!(batch.push("a".to_string()), None);
        assert_eq!(
            batch.push("b".to_string()),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(batch.push("c".to_string()), None);
        assert_eq!(batch.drain(), Some(vec!["c".to_string()]));
        assert_eq!(batch.drain(), None);
    }

    #[test]
    fn test_zero_capacity_behaves_as_one() {
        let mut batch = LogBatch::new(0);
        assert_eq!(batch.push("a".to_string()), Some(vec!["a".to_string()]));
        assert_eq!(batch.drain(), None);
    }

    #[test]
    fn test_sanitize_line() {
        assert_eq!(sanitize_line(b"hello\n"), Some("hello".to_string()));
        assert_eq!(sanitize_line(b"hello\r\n"), Some("hello".to_string()));
        assert_eq!(sanitize_line(b"he\0llo"), Some("hello".to_string()));
        assert_eq!(sanitize_line(b"\0\0\n"), None);
        assert_eq!(sanitize_line(b"\n"), None);
        assert_eq!(sanitize_line(b""), None);
        assert_eq!(sanitize_line(b"  \n"), Some("  ".to_string()));
    }
}
