use crate::Result;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const MYSQL_PORT: u16 = 3306;

/// The entrypoint first boots a temporary server on port 0 to run the init
/// scripts; only the final server announces the real port.
const READY_MESSAGE: &str = "port: 3306  MySQL Community Server";

/// Settings for the disposable MySQL server.
#[derive(Debug, Clone, TypedBuilder)]
pub struct MysqlConfig {
    #[builder(default = "8.4".to_string(), setter(into))]
    tag: String,
    #[builder(default = "stubby".to_string(), setter(into))]
    database: String,
    #[builder(default = "stubby".to_string(), setter(into))]
    username: String,
    #[builder(default = "stubby".to_string(), setter(into))]
    password: String,
    /// Server-wide default collation. Tables that do not pin their own
    /// collation inherit it.
    #[builder(default = "utf8mb4_0900_ai_ci".to_string(), setter(into))]
    collation: String,
}

impl MysqlConfig {
    fn server_args(&self) -> Vec<String> {
        vec![
            "--character-set-server=utf8mb4".to_string(),
            format!("--collation-server={}", self.collation),
        ]
    }

    fn dsn(&self, host: impl std::fmt::Display, port: u16) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.username, self.password, host, port, self.database
        )
    }
}

/// Test fixture for a disposable MySQL server.
///
/// The container is stopped when the fixture is dropped.
pub struct MySqlServer {
    container: ContainerAsync<GenericImage>,
    config: MysqlConfig,
}

impl MySqlServer {
    /// Starts a MySQL container with an empty database named after the config.
    pub async fn new(config: MysqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", config.tag.as_str())
            .with_exposed_port(MYSQL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr(READY_MESSAGE))
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .with_env_var("MYSQL_ROOT_PASSWORD", "root")
            .with_cmd(config.server_args())
            .start()
            .await?;

        Ok(Self { container, config })
    }

    /// DSN the repository under test should connect with.
    pub async fn database_url(&self) -> Result<String> {
        let host = self.container.get_host().await?;
        let port = self.container.get_host_port_ipv4(MYSQL_PORT).await?;
        Ok(self.config.dsn(host, port))
    }
}
