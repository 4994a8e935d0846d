use clap::{Parser, ValueEnum};
use ipnetwork::IpNetwork;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use stubby_shortener::DeletionSettings;

pub const LISTEN_ADDR_ENV: &str = "STUBBY_LISTEN_ADDR";
pub const GRPC_LISTEN_ADDR_ENV: &str = "STUBBY_GRPC_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "STUBBY_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "STUBBY_STORAGE_BACKEND";
pub const STORAGE_FILE_ENV: &str = "STUBBY_STORAGE_FILE";
pub const MYSQL_DSN_ENV: &str = "STUBBY_MYSQL_DSN";
pub const TRUSTED_SUBNET_ENV: &str = "STUBBY_TRUSTED_SUBNET";
pub const LOG_LEVEL_ENV: &str = "STUBBY_LOG_LEVEL";
pub const LOG_JSON_ENV: &str = "STUBBY_LOG_JSON";
pub const DELETION_QUEUE_CAPACITY_ENV: &str = "STUBBY_DELETION_QUEUE_CAPACITY";
pub const DELETION_BATCH_SIZE_ENV: &str = "STUBBY_DELETION_BATCH_SIZE";
pub const DELETION_FLUSH_INTERVAL_ENV: &str = "STUBBY_DELETION_FLUSH_INTERVAL_MS";
pub const DELETION_MAX_IN_FLIGHT_ENV: &str = "STUBBY_DELETION_MAX_IN_FLIGHT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_GRPC_LISTEN_ADDR: &str = "127.0.0.1:3200";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "stubby-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(long, env = GRPC_LISTEN_ADDR_ENV, default_value = DEFAULT_GRPC_LISTEN_ADDR)]
    pub grpc_listen_addr: SocketAddr,

    /// Prefix of every returned short URL.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    /// JSON-lines file backing the in-memory store.
    #[arg(long, env = STORAGE_FILE_ENV)]
    pub storage_file: Option<PathBuf>,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    /// CIDR allowed to call internal endpoints.
    #[arg(long, env = TRUSTED_SUBNET_ENV)]
    pub trusted_subnet: Option<IpNetwork>,

    #[arg(long, env = LOG_LEVEL_ENV, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    #[arg(long, env = LOG_JSON_ENV)]
    pub log_json: bool,

    #[arg(long, env = DELETION_QUEUE_CAPACITY_ENV, default_value_t = 10)]
    pub deletion_queue_capacity: usize,

    #[arg(long, env = DELETION_BATCH_SIZE_ENV, default_value_t = 100)]
    pub deletion_batch_size: usize,

    #[arg(long, env = DELETION_FLUSH_INTERVAL_ENV, default_value_t = 10_000)]
    pub deletion_flush_interval_ms: u64,

    #[arg(long, env = DELETION_MAX_IN_FLIGHT_ENV, default_value_t = 5)]
    pub deletion_max_in_flight: usize,
}

impl CLI {
    pub fn deletion_settings(&self) -> DeletionSettings {
        DeletionSettings::builder()
            .queue_capacity(self.deletion_queue_capacity)
            .batch_size(self.deletion_batch_size)
            .flush_interval(Duration::from_millis(self.deletion_flush_interval_ms))
            .max_in_flight(self.deletion_max_in_flight)
            .build()
    }
}
