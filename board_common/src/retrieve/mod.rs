//! # Data Retrieval Module
//!
//! ## Purpose:
//! Every request to the leaderboard backend goes through the session-aware
//! [`ApiClient`], which attaches credentials, recovers once from an expired
//! access token, and folds every outcome into an [`ApiResponse`].
//!
//! ## Contained Modules:
//!
//! - **`api_client`**: the client, request builder and response envelope,
//!   built on `reqwest` and `reqwest-middleware` with optional transient
//!   retries.
//! - **`endpoints`**: typed helpers for the read endpoints (leaderboard,
//!   profile, registrations, projects, issues).

/// Session-aware HTTP client with single refresh-and-retry.
pub mod api_client;

/// Typed read endpoints.
pub mod endpoints;

pub use api_client::{ApiClient, ApiRequest, ApiResponse, AttemptState, HttpMethod};
