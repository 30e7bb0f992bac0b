//! Named, line-indexed source buffers.

/// One named block of program text, split into lines.
///
/// Buffers are immutable once loaded. The `trusted` flag records whether the
/// buffer's content hash matched the trusted stdlib hash at registration
/// time (the sandbox exemption, decided once since content never changes).
#[derive(Clone, Debug)]
pub struct SourceBuffer {
    key: String,
    raw: String,
    lines: Vec<String>,
    trusted: bool,
}

impl SourceBuffer {
    /// Create a buffer from raw text, splitting it into lines.
    pub fn new(key: impl Into<String>, text: impl Into<String>, trusted: bool) -> Self {
        let raw = text.into();
        let lines = raw.lines().map(str::to_string).collect();
        Self {
            key: key.into(),
            raw,
            lines,
            trusted,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The original text as loaded (the input to the trust hash).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// The set of loaded source buffers, in registration order.
///
/// Registration order matters: function lookup walks sources in the order
/// they were loaded, main first. Re-registering a key replaces the buffer in
/// place without changing its position.
#[derive(Clone, Debug, Default)]
pub struct SourceSet {
    buffers: Vec<SourceBuffer>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a buffer, replacing any existing buffer with the same key.
    pub fn insert(&mut self, buffer: SourceBuffer) {
        if let Some(existing) = self.buffers.iter_mut().find(|b| b.key == buffer.key) {
            *existing = buffer;
        } else {
            self.buffers.push(buffer);
        }
    }

    pub fn get(&self, key: &str) -> Option<&SourceBuffer> {
        self.buffers.iter().find(|b| b.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Line text at (key, index), if both exist.
    pub fn line(&self, key: &str, index: usize) -> Option<&str> {
        self.get(key).and_then(|b| b.line(index))
    }

    /// Buffers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceBuffer> {
        self.buffers.iter()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_splits_lines() {
        let buf = SourceBuffer::new("main", "a\nb\nc", false);
        assert_eq!(buf.line_count(), 3);
        assert_eq!(buf.line(0), Some("a"));
        assert_eq!(buf.line(2), Some("c"));
        assert_eq!(buf.line(3), None);
    }

    #[test]
    fn buffer_handles_crlf() {
        let buf = SourceBuffer::new("main", "a\r\nb\r\n", false);
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.line(0), Some("a"));
        assert_eq!(buf.line(1), Some("b"));
    }

    #[test]
    fn empty_buffer_has_no_lines() {
        let buf = SourceBuffer::new("main", "", false);
        assert_eq!(buf.line_count(), 0);
    }

    #[test]
    fn raw_text_preserved() {
        let buf = SourceBuffer::new("main", "x\ny", false);
        assert_eq!(buf.raw(), "x\ny");
    }

    #[test]
    fn set_preserves_registration_order() {
        let mut set = SourceSet::new();
        set.insert(SourceBuffer::new("main", "", false));
        set.insert(SourceBuffer::new("lib", "", false));
        set.insert(SourceBuffer::new("util", "", false));
        let keys: Vec<&str> = set.iter().map(|b| b.key()).collect();
        assert_eq!(keys, vec!["main", "lib", "util"]);
    }

    #[test]
    fn set_replace_keeps_position() {
        let mut set = SourceSet::new();
        set.insert(SourceBuffer::new("main", "old", false));
        set.insert(SourceBuffer::new("lib", "", false));
        set.insert(SourceBuffer::new("main", "new", true));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("main").unwrap().raw(), "new");
        assert!(set.get("main").unwrap().is_trusted());
        let keys: Vec<&str> = set.iter().map(|b| b.key()).collect();
        assert_eq!(keys, vec!["main", "lib"]);
    }

    #[test]
    fn line_lookup_through_set() {
        let mut set = SourceSet::new();
        set.insert(SourceBuffer::new("main", "one\ntwo", false));
        assert_eq!(set.line("main", 1), Some("two"));
        assert_eq!(set.line("main", 9), None);
        assert_eq!(set.line("ghost", 0), None);
    }
}
