//! Canopy Core - shared data model
//!
//! This crate holds the types every other Canopy crate agrees on:
//! the items a remote folder listing produces, the records written
//! into the ledgers, and the immutable run configuration.
//!
//! # Example
//!
//! ```
//! use canopy_core::{Item, Record};
//! use chrono::Utc;
//!
//! let item = Item::file("1AbC", "lecture-01.pdf");
//! let record = Record::new("Physics_S1", &item, Utc::now());
//! assert_eq!(record.link, "https://drive.google.com/file/d/1AbC/view?usp=sharing");
//! ```

pub mod config;
pub mod error;
pub mod item;

pub use config::{Pacing, Root, RootsFile, Settings, SyncMode};
pub use error::{ConfigError, Result};
pub use item::{viewer_link, Item, ItemKind, Placeholder, Record, FOLDER_MIME_TYPE};
