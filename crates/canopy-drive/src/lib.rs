//! Canopy Drive - remote folder listing
//!
//! This crate is the only place that knows how to ask the remote side
//! "what is inside this folder":
//! - [`ListQuery`] describes one listing and renders the filter expression
//! - [`ListingService`] is the seam the walker is written against
//! - [`DriveClient`] talks to the Drive v3 REST API
//! - [`MemoryDrive`] serves a fixed tree from memory
//!
//! Pagination is always drained by [`list_children`] before a folder's
//! listing is handed back.

mod client;
mod error;
mod listing;
pub mod memory;
mod query;

pub use client::{DriveClient, DriveConfig, DEFAULT_BASE_URL};
pub use error::{DriveError, Result};
pub use listing::{list_children, ListingService, Page};
pub use memory::MemoryDrive;
pub use query::ListQuery;
