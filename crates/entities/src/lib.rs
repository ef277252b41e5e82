//! Core entity definitions for the knowledge workspace.
//!
//! This crate defines the data types shared by the article store, the
//! workspace core and the command-line front end: articles and their
//! presentation metadata, tags, version snapshots, comments and the
//! current-user context.

mod article;
mod comment;
mod sort;
mod tag;
mod user;
mod version;

pub use article::*;
pub use comment::*;
pub use sort::*;
pub use tag::*;
pub use user::*;
pub use version::*;
