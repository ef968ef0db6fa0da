pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod types;

pub use error::{Error, Result};
pub use routes::{app, API_BASE};
pub use state::AppState;
