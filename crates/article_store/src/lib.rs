//! Record store boundary for knowledge articles
//!
//! The workspace never talks to the host directly. Everything it reads or
//! writes goes through the [`ArticleStore`] trait: record search and read,
//! record write and create, and the handful of remote procedures that are
//! not plain CRUD (view counters, likes, favorites, comments, version diff
//! and restore).
//!
//! Two implementations are provided. [`MemoryArticleStore`] keeps everything
//! in process and is used by tests and the demo front end.
//! [`RpcArticleStore`] speaks the host's JSON-RPC protocol over HTTP.

mod diff;
mod error;
mod memory;
mod rpc;
mod traits;

pub use diff::html_word_diff;
pub use error::*;
pub use memory::*;
pub use rpc::*;
pub use traits::*;
