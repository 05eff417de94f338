//! Canopy Walker - folder tree enumeration and change filtering
//!
//! This crate handles the remote tree side of things:
//! - Walking a folder hierarchy down to its files, cycle-safe
//! - Restricting a walk to recently modified files without losing
//!   files added deep below untouched folders
//!
//! Listing failures never abort a walk. They are collected on the
//! [`WalkResult`] and the affected subtree counts as empty.

mod enumerator;
mod filter;

pub use enumerator::{enumerate, VisitedSet, WalkFailure, WalkOptions, WalkResult};
pub use filter::ChangeFilter;
