pub mod client;
pub mod error;
pub mod types;

pub use client::{API_URL, DEFAULT_MODE, MasteringClient};
pub use error::ApiError;
pub use types::{AudioResponse, CreateMasteringRequest, MasteringResponse};
