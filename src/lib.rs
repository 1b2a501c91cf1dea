//! Fixed-capacity circular byte buffer for incrementally received bytes,
//! with in-place searches that pull delimited fields out of the stream.
//!
//! [`RingBuffer`] is the core. [`Channel`] drives it from a
//! [`ByteSource`] and turns completed frames into named fields.

pub mod channel;
pub mod circular_buffer;
pub mod config;
pub mod critical;
pub mod error;
pub mod scan;
pub mod sources;

pub use channel::{Channel, Field, Frame};
pub use circular_buffer::{RingBuffer, DEFAULT_CAPACITY};
pub use critical::{CriticalSection, FnGuard, Guarded, NoGuard};
pub use error::Error;
pub use sources::{ByteSource, FileSource, MemorySource};
