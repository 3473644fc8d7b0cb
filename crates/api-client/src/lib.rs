pub mod client;
pub mod error;
pub mod gateway;

pub use client::ApiClient;
pub use error::ApiError;
pub use gateway::ResourceGateway;
pub use reqwest::StatusCode;
pub use scenewatch_api;
