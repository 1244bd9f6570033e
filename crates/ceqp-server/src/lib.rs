//! CEQP server: request dispatcher, single-session server loop, and an
//! in-process demonstration target.
//!
//! # Components
//!
//! - [`request`]: decodes a wire frame's payload into a typed [`request::Request`]
//! - [`dispatch`]: executes a decoded request against a target process
//! - [`server`]: the accept/session loop and its `start`/`stop`/`set_test_env`
//!   control surface
//! - [`demo`]: an in-process `Vec<u8>`-backed target for the demonstration
//!   binary and integration tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod demo;
pub mod dispatch;
pub mod error;
pub mod request;
pub mod server;

pub use dispatch::{DispatchError, DispatchOk};
pub use error::ServerError;
pub use request::Request;
pub use server::Server;
