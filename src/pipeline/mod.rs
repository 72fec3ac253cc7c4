//! Relay pipeline
//!
//! Candidate flow for one batch run:
//!
//! 1. `poller` fetches recent posts per source and applies the lookback,
//!    dedup and keyword filters, resolving album membership in one pass
//! 2. `emitter` merges all candidates into timestamp order and sends them
//!    sequentially with pacing, recording a per-item outcome
//! 3. `sent_store` keeps the insertion-ordered set of relayed ids with
//!    bounded eviction, persisted once at run end
//! 4. `runner` ties the steps together with the digest side channel
//!
//! - `types` - CandidateItem, emission outcome and run report types
//! - `sent_store` - persisted dedup store
//! - `poller` - per-source fetch + filters + grouping resolver
//! - `emitter` - chronological merge-and-emit
//! - `runner` - one run end to end

pub mod emitter;
pub mod poller;
pub mod runner;
pub mod sent_store;
pub mod types;

pub use runner::run_relay;
pub use sent_store::{SentStore, StoreError, EVICT_BATCH, MAX_TRACKED};
pub use types::{CandidateItem, EmissionOutcome, EmissionStatus, RunReport};
