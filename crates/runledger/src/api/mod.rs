//! Client for the extraction backend's REST API.

mod client;
mod error;

pub use client::ExtractionApiClient;
pub use error::ApiError;
