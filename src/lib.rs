//! Image recompression function for Salesforce files
//!
//! Downloads each ContentVersion in an invocation batch, re-encodes it as a
//! smaller JPEG or PNG, and uploads the result as a new major version of the
//! same document. Failures are isolated per file and reported in the result.

pub mod app;
pub mod batch;
pub mod content_version;
pub mod error;
pub mod image;
pub mod models;
pub mod transport;

pub use error::{Error, Result};
