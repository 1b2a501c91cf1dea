use crate::circular_buffer::RingBuffer;
use crate::config::{ChannelConfig, FieldRule};
use crate::error::Error;
use crate::scan::until_nul;
use crate::sources::ByteSource;
use log::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: Vec<u8>,
}

/// Fields extracted from one delimited frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: String,
    pub fields: Vec<Field>,
}

impl Frame {
    /// One `<channel> <field>=<value>` line per field, or `<channel> frame`
    /// when nothing was extracted.
    pub fn render(&self) -> Vec<String> {
        if self.fields.is_empty() {
            return vec![format!("{} frame", self.channel)];
        }
        self.fields
            .iter()
            .map(|f| {
                let value = String::from_utf8_lossy(&f.value);
                format!("{} {}={}", self.channel, f.name, value)
            })
            .collect()
    }
}

/// A receive buffer plus the rules that turn its contents into frames.
///
/// Bytes go in through [`feed`](Channel::feed). Once the delimiter shows up
/// the field rules run against the buffered frame, which is then dropped:
/// by a reset in the default mode, so the storage-order searches start from
/// index 0 again, or by consuming through the delimiter in wrap-aware mode.
/// A frame that overran the buffer has wrapped storage, so its fields are
/// taken from the unread bytes in either mode.
pub struct Channel {
    id: String,
    ring: RingBuffer,
    delimiter: Vec<u8>,
    fields: Vec<FieldRule>,
    chunk: usize,
    timeout_ms: u64,
    wrap_aware: bool,
    overruns: u64,
    lost_in_frame: bool,
    frames: u64,
}

impl Channel {
    pub fn new(cfg: ChannelConfig) -> Result<Self, Error> {
        Ok(Self {
            ring: RingBuffer::new(cfg.capacity)?,
            id: cfg.id,
            delimiter: cfg.delimiter,
            fields: cfg.fields,
            chunk: cfg.chunk,
            timeout_ms: cfg.timeout_ms,
            wrap_aware: cfg.wrap_aware,
            overruns: 0,
            lost_in_frame: false,
            frames: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Bytes dropped because they were overwritten before a frame completed.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let last = self.delimiter.last().copied();
        for &byte in bytes {
            if self.ring.is_full() {
                self.overruns += 1;
                self.lost_in_frame = true;
            }
            self.ring.write(byte);
            if Some(byte) == last {
                if let Some(frame) = self.try_frame() {
                    frames.push(frame);
                }
            }
        }
        frames
    }

    fn try_frame(&mut self) -> Option<Frame> {
        let logical = self.wrap_aware || self.lost_in_frame;
        let complete = if logical {
            self.ring.contains(&self.delimiter)
        } else {
            self.ring.consuming_find(&self.delimiter)
        };
        if !complete {
            return None;
        }

        let fields = self.extract(logical);
        if self.wrap_aware {
            self.ring.consume_through(&self.delimiter);
        } else {
            self.ring.reset();
        }

        self.frames += 1;
        if self.lost_in_frame {
            warn!(
                "Channel '{}': frame {} completed after buffer overrun ({} bytes lost so far)",
                self.id, self.frames, self.overruns
            );
            self.lost_in_frame = false;
        }
        debug!(
            "Channel '{}': frame {} with {} fields",
            self.id,
            self.frames,
            fields.len()
        );

        Some(Frame {
            channel: self.id.clone(),
            fields,
        })
    }

    fn extract(&self, logical: bool) -> Vec<Field> {
        let mut out = Vec::with_capacity(self.fields.len());
        for rule in &self.fields {
            let (dest, found) = match rule {
                FieldRule::Match { pattern, size, .. } => {
                    let mut dest = vec![0u8; *size];
                    let found = if logical {
                        self.ring.copy_from_match_logical(&mut dest, pattern)
                    } else {
                        self.ring.copy_from_match(&mut dest, pattern)
                    };
                    (dest, found)
                }
                FieldRule::Between { start, finish, size, .. } => {
                    let mut dest = vec![0u8; *size];
                    let found = if logical {
                        self.ring.copy_between_logical(&mut dest, start, *finish, *size)
                    } else {
                        self.ring.copy_between(&mut dest, start, *finish, *size)
                    };
                    (dest, found)
                }
            };
            if found.is_some() {
                out.push(Field {
                    name: rule.name().to_string(),
                    value: until_nul(&dest).to_vec(),
                });
            }
        }
        out
    }

    /// Pulls chunks from `source` until it is exhausted, handing each
    /// completed frame to `sink`. Returns the number of frames seen.
    pub async fn run<F>(&mut self, source: &dyn ByteSource, mut sink: F) -> Result<u64, Error>
    where
        F: FnMut(&Frame),
    {
        info!("Channel '{}' started (capacity {})", self.id, self.ring.capacity());
        while let Some(chunk) = source.read_chunk(self.chunk, self.timeout_ms).await? {
            for frame in self.feed(&chunk) {
                sink(&frame);
            }
        }
        if !self.ring.is_empty() {
            debug!(
                "Channel '{}': {} trailing bytes without delimiter",
                self.id,
                self.ring.len()
            );
        }
        info!(
            "Channel '{}' finished: {} frames, {} bytes overrun",
            self.id, self.frames, self.overruns
        );
        Ok(self.frames)
    }
}
