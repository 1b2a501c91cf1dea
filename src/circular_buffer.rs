use crate::error::Error;
use crate::scan::{self, Linear, Logical, Window};

pub const DEFAULT_CAPACITY: usize = 64;

/// Fixed-capacity circular byte buffer with overwrite-oldest writes.
///
/// One storage slot always stays unused so that `read_pos == write_pos`
/// means empty; a buffer of capacity N holds at most N - 1 bytes.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    storage: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self {
            storage: vec![0; DEFAULT_CAPACITY].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
        }
    }
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity(capacity));
        }
        Ok(Self {
            storage: vec![0; capacity].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
        })
    }

    /// Rewinds both indices and clears storage to zero.
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.storage.fill(0);
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn usable_capacity(&self) -> usize {
        self.capacity() - 1
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        (self.write_pos + self.capacity() - self.read_pos) % self.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    pub fn is_full(&self) -> bool {
        (self.write_pos + 1) % self.capacity() == self.read_pos
    }

    /// Appends a byte. A full buffer drops its oldest unread byte first.
    pub fn write(&mut self, byte: u8) {
        if self.is_full() {
            self.read_pos = (self.read_pos + 1) % self.capacity();
        }
        self.storage[self.write_pos] = byte;
        self.write_pos = (self.write_pos + 1) % self.capacity();
    }

    pub fn extend(&mut self, data: &[u8]) {
        for &byte in data {
            self.write(byte);
        }
    }

    pub fn read(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.storage[self.read_pos];
        self.read_pos = (self.read_pos + 1) % self.capacity();
        Some(byte)
    }

    /// Like [`read`](Self::read), but yields 0 for an empty buffer. A zero
    /// byte in the stream looks the same; check `is_empty` first when that
    /// matters.
    pub fn read_raw(&mut self) -> u8 {
        self.read().unwrap_or(0)
    }

    /// Drains `dest.len()` bytes into `dest`. Slots past the end of the
    /// unread data are filled with 0.
    pub fn copy_out(&mut self, dest: &mut [u8]) {
        for slot in dest.iter_mut() {
            *slot = self.read_raw();
        }
    }

    /// Unread bytes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        let window = self.logical();
        (0..window.len()).map(move |i| window.at(i))
    }

    /// Scans the unread bytes for `pattern` and, when found, advances the
    /// read position by `pattern.len()`. Nothing is consumed on failure.
    ///
    /// The scan restarts from zero on every mismatch, so a match beginning
    /// inside a failed partial match is missed. See [`consume_through`]
    /// for a scan without that limitation.
    ///
    /// [`consume_through`]: Self::consume_through
    pub fn consuming_find(&mut self, pattern: &[u8]) -> bool {
        if pattern.len() > self.capacity() || self.is_empty() {
            return false;
        }
        if scan::reset_scan(&self.logical(), pattern).is_none() {
            return false;
        }
        self.advance_read(pattern.len());
        true
    }

    /// Non-consuming presence check over the unread bytes.
    pub fn contains(&self, pattern: &[u8]) -> bool {
        self.position(pattern).is_some()
    }

    /// Offset of the first match of `pattern`, counted from the oldest
    /// unread byte.
    pub fn position(&self, pattern: &[u8]) -> Option<usize> {
        scan::find(&self.logical(), pattern)
    }

    /// Consumes everything up to and including the first match of
    /// `pattern`. Returns false, consuming nothing, when there is no match.
    pub fn consume_through(&mut self, pattern: &[u8]) -> bool {
        if pattern.is_empty() {
            return false;
        }
        match self.position(pattern) {
            Some(start) => {
                self.advance_read(start + pattern.len());
                true
            }
            None => false,
        }
    }

    /// Copies the text starting at the first match of `pattern` into
    /// `dest`, up to a NUL, CR or LF, and at most `dest.len() - 1` bytes so
    /// the field stays NUL-terminated. `dest` is zeroed first.
    ///
    /// The search runs over raw storage from index 0 up to its first zero
    /// byte, not over the unread bytes, which is only exact while the
    /// buffer has not wrapped since its last reset. Returns the number of
    /// bytes copied, or `None` when the buffer is empty or there is no
    /// match.
    pub fn copy_from_match(&self, dest: &mut [u8], pattern: &[u8]) -> Option<usize> {
        dest.fill(0);
        if self.is_empty() {
            return None;
        }
        copy_match_into(&self.linear(), dest, pattern)
    }

    /// Wrap-aware [`copy_from_match`](Self::copy_from_match): searches and
    /// copies the unread bytes only.
    pub fn copy_from_match_logical(&self, dest: &mut [u8], pattern: &[u8]) -> Option<usize> {
        dest.fill(0);
        if self.is_empty() {
            return None;
        }
        copy_match_into(&self.logical(), dest, pattern)
    }

    /// Copies the bytes following the first match of `start` into `dest`
    /// until `finish`, a NUL, or `max_len - 1` bytes, then NUL-terminates.
    /// `max_len` is capped at `dest.len()`. Bytes after the terminator are
    /// left as they were.
    ///
    /// Uses the same storage-from-index-0 search as `copy_from_match` and
    /// does not look at the read position, so already drained bytes are
    /// still visible until the next reset. When `start` is missing,
    /// `dest[0]` is set to 0 and `None` is returned.
    pub fn copy_between(
        &self,
        dest: &mut [u8],
        start: &[u8],
        finish: u8,
        max_len: usize,
    ) -> Option<usize> {
        copy_between_into(&self.linear(), dest, start, finish, max_len)
    }

    /// Wrap-aware [`copy_between`](Self::copy_between) over the unread
    /// bytes only.
    pub fn copy_between_logical(
        &self,
        dest: &mut [u8],
        start: &[u8],
        finish: u8,
        max_len: usize,
    ) -> Option<usize> {
        copy_between_into(&self.logical(), dest, start, finish, max_len)
    }

    fn advance_read(&mut self, count: usize) {
        self.read_pos = (self.read_pos + count) % self.capacity();
    }

    fn linear(&self) -> Linear<'_> {
        Linear::new(&self.storage)
    }

    fn logical(&self) -> Logical<'_> {
        Logical::new(&self.storage, self.read_pos, self.len())
    }
}

fn copy_match_into<W: Window>(window: &W, dest: &mut [u8], pattern: &[u8]) -> Option<usize> {
    let start = scan::find(window, pattern)?;
    let limit = dest.len().saturating_sub(1);
    let mut copied = 0;
    while copied < limit && start + copied < window.len() {
        let byte = window.at(start + copied);
        if matches!(byte, 0 | b'\r' | b'\n') {
            break;
        }
        dest[copied] = byte;
        copied += 1;
    }
    Some(copied)
}

fn copy_between_into<W: Window>(
    window: &W,
    dest: &mut [u8],
    start: &[u8],
    finish: u8,
    max_len: usize,
) -> Option<usize> {
    let Some(at) = scan::find(window, start) else {
        if let Some(first) = dest.first_mut() {
            *first = 0;
        }
        return None;
    };
    let limit = max_len.min(dest.len());
    if limit == 0 {
        if let Some(first) = dest.first_mut() {
            *first = 0;
        }
        return Some(0);
    }

    let mut pos = at + start.len();
    let mut copied = 0;
    while copied < limit - 1 && pos < window.len() {
        let byte = window.at(pos);
        if byte == finish || byte == 0 {
            break;
        }
        dest[copied] = byte;
        copied += 1;
        pos += 1;
    }
    dest[copied] = 0;
    Some(copied)
}
