//! Canopy Ledger - idempotent record stores
//!
//! A ledger answers one question, "has this (topic, item) been recorded
//! yet?", and records it if not. Every backend implements the same
//! [`Ledger`] contract:
//! - [`RealtimeLedger`]: Firebase Realtime Database over REST
//! - [`FirestoreLedger`]: Cloud Firestore over REST
//! - [`SledLedger`]: a local sled tree
//! - [`MemoryLedger`]: a map behind a mutex
//!
//! Records are never overwritten. A second discovery of the same item is
//! a no-op that reports "not new".

mod auth;
mod error;
mod firestore;
mod ledger;
mod local;
pub mod memory;
mod realtime;

pub use auth::{fetch_access_token, ServiceAccount, TOKEN_SCOPES};
pub use error::{LedgerError, Result};
pub use firestore::{FirestoreLedger, FIRESTORE_BASE_URL};
pub use ledger::{Entry, Ledger, LedgerKey};
pub use local::SledLedger;
pub use memory::MemoryLedger;
pub use realtime::RealtimeLedger;
