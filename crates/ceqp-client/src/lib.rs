//! CEQP client adapter: a typed request/response API over a plain TCP
//! connection to a CEQP server.
//!
//! One request is ever in flight: each method writes a frame and blocks on
//! its response before returning, mirroring the server's strictly
//! sequential per-session handling.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;

pub use client::Client;
pub use error::ClientError;
