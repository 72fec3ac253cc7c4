//! newsrelay - scheduled channel relay
//!
//! A short batch run, invoked periodically by a scheduler, that:
//! - polls a fixed list of source channels for recent posts
//! - keeps posts that match the keyword list and fall inside the lookback
//!   window, skipping anything already relayed
//! - republishes survivors to one destination channel in chronological
//!   order, forwarding multi-part albums atomically
//! - appends a separately-gated digest scraped from the sports site
//! - persists the dedup store and digest cursor once at run end
//!
//! The platform itself sits behind the [`transport::Transport`] trait; the
//! pipeline never assumes more than fetch/send/forward.

pub mod config;
pub mod digest;
pub mod pipeline;
pub mod runlock;
pub mod transport;
