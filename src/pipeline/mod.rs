//! Pipeline stages for table recognition.
//!
//! Each submodule implements exactly one step of a file's journey, so each
//! can be tested on its own and the provider can be swapped without touching
//! the others.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ encode ──▶ recognize ──▶ persist
//! (walkdir)    (base64)   (provider)    (atomic write)
//! ```
//!
//! 1. [`discover`]: walk the input tree, keep files with an allowed extension
//! 2. [`encode`]: read and base64-encode a file, enforcing the payload limit
//! 3. [`recognize`]: call the provider with timeout and optional retry; the
//!    only stage with network I/O
//! 4. [`persist`]: name outputs after their sources and write them atomically

pub mod discover;
pub mod encode;
pub mod persist;
pub mod recognize;
