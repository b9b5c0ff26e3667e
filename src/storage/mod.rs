//! Storage Layer - the local workflow store
//!
//! System of record is SQLite with tables:
//! - workflows(id, node_id, name, path, state, created_at, updated_at, url, html_url, badge_url)
//! - repository(name, owner, token)
//!
//! A single storage actor owns the connection. Everything else reaches the
//! database through [`Store::submit`] and the typed helpers built on it.

pub mod schema;
pub(crate) mod sqlite;
pub mod actor;
pub mod store;

pub use actor::{ActorState, Message, Reply};
pub use store::{Store, StoreOptions, DEFAULT_MAILBOX_CAPACITY, DEFAULT_SUBMIT_TIMEOUT};
