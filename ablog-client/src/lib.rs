//! HTTP client library for the ABlog REST API.

pub mod error;
pub mod http_client;
pub mod models;

pub use error::AblogClientError;
pub use http_client::HttpClient;
pub use models::*;
