//! HTTP and gRPC transports for the Stubby URL shortener.

pub mod app;
pub mod auth;
pub mod error;
pub mod grpc;
pub mod handlers;
pub mod model;
pub mod state;
pub mod subnet;

pub use app::App;
pub use state::AppState;
