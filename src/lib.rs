//! Social network backend: accounts, a follow graph, posts with likes and
//! comments, a fan-out-on-read feed and notifications, served over HTTP by
//! axum on either PostgreSQL or an in-memory store.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
pub use routes::build_app;
pub use state::AppState;
