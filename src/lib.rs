pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod media;
pub mod models;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
