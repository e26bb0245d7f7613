//! Shared wire types and errors for the fnchat client and anything else that
//! talks to the chat backend.

pub mod error;
pub mod models;

pub use error::*;
pub use models::*;
