mod cli;

use crate::cli::{StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use stubby_gateway::grpc::{self, ShortenerRpc};
use stubby_gateway::{App, AppState};
use stubby_generator::Sha256Generator;
use stubby_proto_schema::v1::shortener_service_server::ShortenerServiceServer;
use stubby_shortener::{DeletionWorker, ShortenerService};
use stubby_storage::{InMemoryRepository, MySqlRepository, Repository};
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(&config.log_level, config.log_json)?;

    info!(
        listen_addr = %config.listen_addr,
        grpc_listen_addr = %config.grpc_listen_addr,
        base_url = %config.base_url,
        storage_backend = %config.storage,
        "starting gateway"
    );

    match config.storage {
        StorageBackendArg::InMemory => {
            let repository = match &config.storage_file {
                Some(path) => InMemoryRepository::with_file(path)
                    .await
                    .with_context(|| format!("open storage file {}", path.display()))?,
                None => InMemoryRepository::new(),
            };
            run_server(config, Arc::new(repository)).await
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(mysql_dsn)
                .await
                .context("connect to mysql")?;
            repository.migrate().await.context("apply mysql schema")?;
            run_server(config, Arc::new(repository)).await
        }
    }
}

fn init_tracing(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!(e))
}

async fn run_server<R: Repository>(config: CLI, repository: Arc<R>) -> anyhow::Result<()> {
    let (queue, worker) = DeletionWorker::new(Arc::clone(&repository), config.deletion_settings());
    let deletions = worker.spawn();

    let grpc_addr = config.grpc_listen_addr;
    let service = ShortenerService::new(repository, Sha256Generator::new(), config.base_url, queue);
    let state = AppState::new(Arc::new(service)).with_trusted_subnet(config.trusted_subnet);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<ShortenerServiceServer<ShortenerRpc>>()
        .await;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let http = async {
        let served = axum::serve(listener, App::router(state.clone()))
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await
            .context("serve http");
        shutdown.cancel();
        served
    };
    let rpc = async {
        info!(grpc_listen_addr = %grpc_addr, "gateway grpc listening");
        let served = Server::builder()
            .add_service(health_service)
            .add_service(grpc::service(state.clone()))
            .serve_with_shutdown(grpc_addr, shutdown.clone().cancelled_owned())
            .await
            .context("serve grpc");
        shutdown.cancel();
        served
    };
    let (http, rpc) = tokio::join!(http, rpc);

    info!("draining deletion queue");
    deletions.shutdown().await;
    info!("gateway stopped");

    http.and(rpc)
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
    shutdown.cancel();
}
