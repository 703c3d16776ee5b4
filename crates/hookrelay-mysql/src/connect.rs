//! Shared MySQL connection utilities.

use hookrelay_config::DatabaseConfig;
use mysql_async::{Opts, OptsBuilder, Pool};
use tracing::debug;

/// Build connection options from a (resolved) database config.
pub fn opts(config: &DatabaseConfig) -> Opts {
    let password = (!config.password.is_empty()).then(|| config.password.clone());

    OptsBuilder::default()
        .ip_or_hostname(config.host.clone())
        .tcp_port(config.port)
        .user(Some(config.username.clone()))
        .pass(password)
        .db_name(Some(config.database.clone()))
        .into()
}

/// Create a connection pool. Connections are opened lazily.
pub fn new_pool(config: &DatabaseConfig) -> Pool {
    debug!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        "Creating MySQL pool"
    );
    Pool::new(opts(config))
}
