//! Incremental sports-news digest
//!
//! A separately-gated side channel of the relay run: within the configured
//! local hours the site's main page is scraped, entries newer than the
//! persisted cursor are collected into one HTML message, and the cursor is
//! advanced after the message is confirmed delivered.
//!
//! - `cursor` - persisted watermark + hour-of-day gate
//! - `page` - fetch, windows-1251 decode and structural parse
//! - `builder` - cursor filter and message formatting

pub mod builder;
pub mod cursor;
pub mod page;

pub use builder::{build_digest, Digest};
pub use cursor::{Cursor, ScrapeWindow};
pub use page::{DigestEntry, DigestError};
