//! # Activity Feed Model
//!
//! ## Purpose:
//! Runtime-independent pieces of the live activity feed: the entry type and
//! category rules, the strict payload decoders, the `text/event-stream`
//! framer, and the bounded newest-first log. The tasks that drive them live
//! in `ingestors::live_feed`.
//!
//! ## Contained Modules:
//!
//! - **`entry`**: `FeedEntry`, `Category`, `CategoryFilter`, time conversion.
//! - **`decode`**: live payload and bulk document decoders.
//! - **`sse`**: incremental server-sent-events parser.
//! - **`log`**: `FeedLog` plus the load and stream states.

pub mod decode;
pub mod entry;
pub mod log;
pub mod sse;

pub use decode::{decode_live_entry, DecodeError, LiveEvent, UpdateRecord, UpdatesPayload};
pub use entry::{epoch_millis_to_iso, Category, CategoryFilter, EntryId, FeedEntry};
pub use log::{
    FeedLog, FeedSnapshot, LoadState, StreamState, DISCONNECTED_MESSAGE, FETCH_FAILED_MESSAGE,
    NETWORK_ERROR_MESSAGE,
};
pub use sse::{SseDecoder, SseEvent};
