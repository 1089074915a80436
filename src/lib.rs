pub mod admission;
pub mod app;
pub mod assets;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;

pub use app::{router, AppState};
