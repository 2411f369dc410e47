//! # board_common
//!
//! Client library for the coding-challenge leaderboard backend.
//!
//! ## Always compiled:
//! - **`session`**: the signed-in user's session, its persistence, sign-in
//!   completion and sign-out.
//! - **`retrieve`**: the session-aware `ApiClient` with single
//!   refresh-and-retry, plus typed read endpoints.
//! - **`feed`**: activity feed entries, decoders, SSE framing and the
//!   bounded log.
//! - **`models`**, **`configs`**, **`error`**.
//!
//! ## Feature gated:
//! - `ingestors`: live feed and leaderboard poller tasks (tokio).
//! - `catalog`: TTL-cached repositories and issues (tokio).
//! - `loggers`: `tracing` subscriber setup with log-file pruning.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod configs;
pub mod error;
pub mod feed;
pub mod models;
pub mod retrieve;
pub mod session;

#[cfg(feature = "catalog")]
pub mod catalog;
#[cfg(feature = "ingestors")]
pub mod ingestors;
#[cfg(feature = "loggers")]
pub mod loggers;

pub use configs::ClientConfig;
pub use error::{ClientError, SESSION_EXPIRED_MESSAGE};
pub use retrieve::{ApiClient, ApiRequest, ApiResponse, HttpMethod};
pub use session::{Session, SessionService};
