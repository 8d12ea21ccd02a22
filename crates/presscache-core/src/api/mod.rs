//! REST API client module for the upstream content service.
//!
//! The API uses JWT bearer token authentication: a token is obtained from the
//! login endpoint, checked against the validation endpoint, and then sent with
//! every content request.

pub mod client;
pub mod error;

pub use client::{HttpClient, RemoteClient};
pub use error::ApiError;
