//! # Session Manager
//!
//! ## Purpose:
//! Owns the signed-in user's credentials. The [`SessionService`] holds the
//! current [`Session`] in memory and writes every change through to a
//! [`SessionStore`]; the api client reads tokens from it on every call and
//! swaps the access token after a successful refresh.
//!
//! ## Contained Modules:
//!
//! - **`model`**: `Session` and `Identity`.
//! - **`store`**: the persistence trait plus file and in-memory stores.
//! - **`service`**: the shared, lock-protected session owner.
//! - **`auth`**: sign-in completion against the verify endpoint, and sign-out.

pub mod auth;
pub mod model;
pub mod service;
pub mod store;

pub use auth::{complete_sign_in, sign_out, VERIFY_PATH};
pub use model::{Identity, Session};
pub use service::SessionService;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, STORAGE_KEY};
