//! Memo capture client.
//!
//! Client-side state and orchestration for capturing notes into remote
//! databases and pages: a TTL cache over backend reads, chat history with a
//! bounded AI context window, schema-driven forms, and persisted preferences.
//! Front ends drive an [`controller::AppController`] and render the
//! [`events::ClientEvent`]s it emits.

pub mod api;
pub mod cache;
pub mod controller;
pub mod error;
pub mod events;
pub mod models;
pub mod preferences;
pub mod session;
pub mod settings;
pub mod state;
pub mod storage;
pub mod target;

#[cfg(feature = "cli")]
pub mod cli;


pub use controller::{AppController, PendingChat};
pub use error::{ClientError, Result};
