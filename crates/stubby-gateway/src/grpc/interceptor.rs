use crate::auth::bearer_token;
use stubby_core::{OwnerId, RequestContext};
use tonic::metadata::MetadataMap;
use tonic::{Request, Status};
use tracing::debug;

const AUTHORIZATION: &str = "authorization";

fn caller_id(metadata: &MetadataMap) -> Result<OwnerId, Status> {
    let value = metadata
        .get(AUTHORIZATION)
        .ok_or_else(|| Status::unauthenticated("authorization token is not provided"))?
        .to_str()
        .map_err(|_| Status::unauthenticated("authorization token is not valid ascii"))?;
    let token = bearer_token(value)
        .ok_or_else(|| Status::unauthenticated("the token is not a Bearer token"))?;
    OwnerId::new(token).map_err(|e| Status::unauthenticated(e.to_string()))
}

/// Attaches the caller's [`RequestContext`] or rejects the call as unauthenticated.
pub fn authenticate(mut request: Request<()>) -> Result<Request<()>, Status> {
    let owner = caller_id(request.metadata()).inspect_err(|status| {
        debug!(reason = status.message(), "rejected unauthenticated rpc");
    })?;
    request
        .extensions_mut()
        .insert(RequestContext::for_owner(owner));
    Ok(request)
}
