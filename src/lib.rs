//! Container image filesystem introspection.
//!
//! Files are never extracted: every directory listing and every file read is a
//! short-lived command run against the image through the container runtime CLI.

pub mod config;
pub mod error;
pub mod exec;
pub mod image;
pub mod probe;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
