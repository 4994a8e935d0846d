use super::error::{guard_status, status};
use crate::state::AppState;
use crate::subnet;
use stubby_core::{RequestContext, ShortCode};
use stubby_proto_schema::v1::shortener_service_server::ShortenerService;
use stubby_proto_schema::v1::{
    parse_short_code, DatabaseStatus, DeleteUrlsRequest, DeleteUrlsResponse, DeletionStatus,
    GetOriginalUrlRequest, GetOriginalUrlResponse, GetStatsRequest, GetStatsResponse,
    GetUserUrlsRequest, GetUserUrlsResponse, MakeUrlBatchRequest, MakeUrlBatchResponse,
    MakeUrlRequest, MakeUrlResponse, PingDbRequest, PingDbResponse,
};
use tonic::{Request, Response, Status};
use tracing::warn;

type RpcResult<T> = Result<Response<T>, Status>;

/// Serves the shortener workflows over gRPC.
#[derive(Clone)]
pub struct ShortenerRpc {
    state: AppState,
}

impl ShortenerRpc {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

/// Context attached by the interceptor; calls that bypassed it are anonymous.
fn context<T>(request: &Request<T>) -> RequestContext {
    request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(RequestContext::anonymous)
}

#[tonic::async_trait]
impl ShortenerService for ShortenerRpc {
    async fn make_url(&self, request: Request<MakeUrlRequest>) -> RpcResult<MakeUrlResponse> {
        let ctx = context(&request);
        let url = request.into_inner().url;
        let shortened = self
            .state
            .shortener()
            .shorten(&ctx, &url)
            .await
            .map_err(status)?;
        Ok(Response::new(shortened.into()))
    }

    async fn make_url_batch(
        &self,
        request: Request<MakeUrlBatchRequest>,
    ) -> RpcResult<MakeUrlBatchResponse> {
        let ctx = context(&request);
        let items = request.into_inner().items.into_iter().map(Into::into).collect();
        let entries = self
            .state
            .shortener()
            .shorten_batch(&ctx, items)
            .await
            .map_err(status)?;
        Ok(Response::new(MakeUrlBatchResponse {
            entries: entries.into_iter().map(Into::into).collect(),
        }))
    }

    async fn get_original_url(
        &self,
        request: Request<GetOriginalUrlRequest>,
    ) -> RpcResult<GetOriginalUrlResponse> {
        let code = parse_short_code(&request.into_inner().short_url)
            .map_err(|e| status(e.into()))?;
        let original_url = self
            .state
            .shortener()
            .resolve(&code)
            .await
            .map_err(status)?;
        Ok(Response::new(GetOriginalUrlResponse { original_url }))
    }

    async fn get_user_urls(
        &self,
        request: Request<GetUserUrlsRequest>,
    ) -> RpcResult<GetUserUrlsResponse> {
        let ctx = context(&request);
        let urls = self
            .state
            .shortener()
            .list_owned(&ctx)
            .await
            .map_err(status)?;
        Ok(Response::new(GetUserUrlsResponse {
            user_urls: urls.into_iter().map(Into::into).collect(),
        }))
    }

    async fn delete_urls(
        &self,
        request: Request<DeleteUrlsRequest>,
    ) -> RpcResult<DeleteUrlsResponse> {
        let ctx = context(&request);
        let codes = request
            .into_inner()
            .urls
            .iter()
            .map(|url| parse_short_code(url))
            .collect::<Result<Vec<ShortCode>, _>>()
            .map_err(|e| status(e.into()))?;
        self.state
            .shortener()
            .delete(&ctx, codes)
            .await
            .map_err(status)?;
        Ok(Response::new(DeleteUrlsResponse {
            status: DeletionStatus::Accepted.into(),
        }))
    }

    async fn ping_db(&self, _request: Request<PingDbRequest>) -> RpcResult<PingDbResponse> {
        let status = match self.state.shortener().ping().await {
            Ok(()) => DatabaseStatus::Active,
            Err(e) => {
                warn!(error = %e, "storage ping failed");
                DatabaseStatus::Inactive
            }
        };
        Ok(Response::new(PingDbResponse {
            status: status.into(),
        }))
    }

    async fn get_stats(&self, request: Request<GetStatsRequest>) -> RpcResult<GetStatsResponse> {
        let headers = request.metadata().clone().into_headers();
        subnet::authorize(self.state.trusted_subnet(), &headers).map_err(guard_status)?;
        let stats = self.state.shortener().stats().await.map_err(status)?;
        Ok(Response::new(stats.into()))
    }
}
