//! gRPC transport for the Stubby URL shortener.
//!
//! Serves the same workflows as the HTTP routes. Callers authenticate with
//! `authorization: Bearer <owner id>` metadata; unlike HTTP, an identity is
//! never issued on the fly.

mod error;
mod interceptor;
mod server;

pub use interceptor::authenticate;
pub use server::ShortenerRpc;

use crate::state::AppState;
use stubby_proto_schema::v1::shortener_service_server::ShortenerServiceServer;
use tonic::service::interceptor::InterceptedService;
use tonic::{Request, Status};

pub type Authenticator = fn(Request<()>) -> Result<Request<()>, Status>;

pub type ShortenerGrpcService = InterceptedService<ShortenerServiceServer<ShortenerRpc>, Authenticator>;

/// Builds the authenticated gRPC service over the shared state.
pub fn service(state: AppState) -> ShortenerGrpcService {
    ShortenerServiceServer::with_interceptor(ShortenerRpc::new(state), authenticate as Authenticator)
}
