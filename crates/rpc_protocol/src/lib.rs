//! JSON-RPC protocol definitions for talking to the host record service
//!
//! The host exposes its object-relational layer through a JSON-RPC 2.0
//! `call` endpoint (`/web/dataset/call_kw`) plus a few plain JSON routes for
//! operations that are not model methods. This crate defines the envelope,
//! the error object and the model/method names the article store uses.

mod error;
mod methods;
mod types;

pub use error::*;
pub use methods::*;
pub use types::*;
