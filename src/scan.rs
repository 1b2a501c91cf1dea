/// Read-only view over a run of bytes that need not be contiguous in memory.
pub trait Window {
    fn len(&self) -> usize;

    fn at(&self, index: usize) -> u8;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Storage read the way a C string is read: from index 0 up to the first
/// zero byte, or the whole slice when there is none. Ignores ring indices.
pub struct Linear<'a> {
    bytes: &'a [u8],
}

impl<'a> Linear<'a> {
    pub fn new(storage: &'a [u8]) -> Self {
        let end = storage.iter().position(|&b| b == 0).unwrap_or(storage.len());
        Self { bytes: &storage[..end] }
    }
}

impl Window for Linear<'_> {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn at(&self, index: usize) -> u8 {
        self.bytes[index]
    }
}

/// The unread bytes of a ring: `len` bytes starting at `start`, wrapping
/// at the end of `storage`.
pub struct Logical<'a> {
    storage: &'a [u8],
    start: usize,
    len: usize,
}

impl<'a> Logical<'a> {
    pub fn new(storage: &'a [u8], start: usize, len: usize) -> Self {
        debug_assert!(len < storage.len() || storage.is_empty());
        Self { storage, start, len }
    }
}

impl Window for Logical<'_> {
    fn len(&self) -> usize {
        self.len
    }

    fn at(&self, index: usize) -> u8 {
        self.storage[(self.start + index) % self.storage.len()]
    }
}

/// Offset of the first occurrence of `needle`. Every start position is
/// tried, so overlapping prefixes are never missed. An empty needle matches
/// at 0.
pub fn find<W: Window + ?Sized>(window: &W, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > window.len() {
        return None;
    }
    (0..=window.len() - needle.len()).find(|&start| {
        needle
            .iter()
            .enumerate()
            .all(|(i, &b)| window.at(start + i) == b)
    })
}

/// Single forward pass with a match-length counter that drops to zero on a
/// mismatch. The mismatching byte is not re-tested against the first needle
/// byte, so a match that starts inside a failed partial match is missed
/// (`"aab"` is not found in `"aaab"`).
///
/// Returns the offset just past the end of the match.
pub fn reset_scan<W: Window + ?Sized>(window: &W, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let mut matched = 0;
    for i in 0..window.len() {
        if window.at(i) == needle[matched] {
            matched += 1;
            if matched == needle.len() {
                return Some(i + 1);
            }
        } else {
            matched = 0;
        }
    }
    None
}

/// The text of a NUL-terminated output field.
pub fn until_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}
