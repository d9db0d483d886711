const RECORD_DELIMITER: &str = "\n\n";

/// Largest incomplete record kept in memory by default (1 MiB)
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Text buffer that hands out complete SSE records
///
/// Records are separated by a blank line. Whatever follows the last delimiter stays
/// buffered until more text arrives.
pub struct SseRecordBuffer {
    buffer: String,
    // Where the delimiter search resumes; everything before it has no delimiter
    scan_from: usize,
    max_record: usize,
}

impl SseRecordBuffer {
    /// Create a new buffer with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: String::with_capacity(capacity),
            scan_from: 0,
            max_record: DEFAULT_MAX_RECORD_BYTES,
        }
    }

    pub fn with_max_record(mut self, max_record: usize) -> Self {
        self.max_record = max_record;
        self
    }

    pub fn max_record(&self) -> usize {
        self.max_record
    }

    /// True when the unterminated text left after `next_record` is past the limit
    pub fn is_over_limit(&self) -> bool {
        self.buffer.len() > self.max_record
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scan_from = 0;
    }

    /// Add decoded text to the buffer
    pub fn push_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Extract the next complete record (without its delimiter)
    /// Returns None if no complete record is available
    pub fn next_record(&mut self) -> Option<String> {
        let pos = match self.buffer[self.scan_from..].find(RECORD_DELIMITER) {
            Some(rel) => self.scan_from + rel,
            None => {
                // A trailing '\n' may be the first half of the next delimiter
                self.scan_from = self.buffer.len().saturating_sub(1);
                while !self.buffer.is_char_boundary(self.scan_from) {
                    self.scan_from -= 1;
                }
                return None;
            }
        };

        let record: String = self.buffer.drain(..pos + RECORD_DELIMITER.len()).collect();
        self.scan_from = 0;

        Some(record[..pos].to_string())
    }

    /// Take whatever is left once the input has ended
    ///
    /// Returns None when only whitespace remains.
    pub fn take_remainder(&mut self) -> Option<String> {
        self.scan_from = 0;
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Current buffer size in bytes
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for SseRecordBuffer {
    fn default() -> Self {
        Self::with_capacity(4096)
    }
}
