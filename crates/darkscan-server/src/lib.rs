//! HTTP API for the darkscan classifiers.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, Settings};
