//! Shardbox HTTP server library.
//!
//! Exposes the application state, router and handlers so integration tests
//! can drive the API in-process.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod sweeper;

pub use routes::create_router;
pub use state::AppState;
