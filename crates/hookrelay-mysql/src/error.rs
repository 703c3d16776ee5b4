use mysql_async::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MysqlError {
    #[error("mysql error: {0}")]
    Mysql(String),

    #[error("connection failed: {0}")]
    Connection(String),
}

impl From<mysql_async::Error> for MysqlError {
    fn from(e: mysql_async::Error) -> Self {
        if is_connection_error(&e) {
            MysqlError::Connection(describe(&e))
        } else {
            MysqlError::Mysql(describe(&e))
        }
    }
}

pub type MysqlResult<T> = Result<T, MysqlError>;

/// Whether the error leaves the connection unusable.
pub(crate) fn is_connection_error(e: &mysql_async::Error) -> bool {
    matches!(
        e,
        mysql_async::Error::Io(_) | mysql_async::Error::Driver(DriverError::ConnectionClosed)
    )
}

/// Render a driver error in the MySQL client's wording.
///
/// Transport failures are reported as lost connections so callers matching
/// on message text treat them like the classic client errors.
pub(crate) fn describe(e: &mysql_async::Error) -> String {
    match e {
        mysql_async::Error::Server(server) => {
            format!("{} (errno {}, state {})", server.message, server.code, server.state)
        }
        e if is_connection_error(e) => format!("Lost connection to MySQL server: {}", e),
        other => other.to_string(),
    }
}
