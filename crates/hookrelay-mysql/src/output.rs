use std::future::Future;

use hookrelay_core::{Escape, OutputError, SqlOutput};
use mysql_async::prelude::*;
use mysql_async::{Conn, Pool};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{describe, is_connection_error, MysqlResult};

/// The live connection plus the session settings it must carry.
#[derive(Default)]
struct Session {
    conn: Option<Conn>,
    foreign_key_checks: Option<bool>,
}

impl Session {
    /// Statements replayed on every newly opened connection.
    fn setup_statements(&self) -> Vec<String> {
        self.foreign_key_checks
            .map(foreign_key_checks_sql)
            .into_iter()
            .collect()
    }
}

fn foreign_key_checks_sql(enabled: bool) -> String {
    format!("SET FOREIGN_KEY_CHECKS = {}", if enabled { 1 } else { 0 })
}

/// The destination connection.
///
/// Holds a single connection from `pool`; after a transport failure the
/// connection is discarded and the next statement opens a fresh one, with
/// the session settings applied again.
pub struct MysqlOutput {
    pool: Pool,
    session: Mutex<Session>,
}

impl MysqlOutput {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            session: Mutex::new(Session::default()),
        }
    }

    /// Open the connection eagerly so an unreachable server fails at startup.
    pub async fn connect(pool: Pool) -> MysqlResult<Self> {
        let conn = pool.get_conn().await?;
        Ok(Self {
            pool,
            session: Mutex::new(Session {
                conn: Some(conn),
                foreign_key_checks: None,
            }),
        })
    }

    /// Toggle `FOREIGN_KEY_CHECKS`; the setting survives reconnects.
    pub async fn set_foreign_key_checks(&self, enabled: bool) -> Result<(), OutputError> {
        self.session.lock().await.foreign_key_checks = Some(enabled);
        self.run(&foreign_key_checks_sql(enabled)).await?;
        info!(enabled, "Foreign key checks updated");
        Ok(())
    }

    /// Release the connection and close the pool.
    pub async fn close(self) {
        if let Some(conn) = self.session.into_inner().conn {
            if let Err(e) = conn.disconnect().await {
                warn!(error = %e, "Failed to close destination connection");
            }
        }
        if let Err(e) = self.pool.disconnect().await {
            warn!(error = %e, "Failed to close destination pool");
        }
    }

    async fn run(&self, sql: &str) -> Result<(), OutputError> {
        let mut session = self.session.lock().await;

        if session.conn.is_none() {
            let mut conn = self.pool.get_conn().await.map_err(|e| {
                OutputError::new(format!("Can't connect to MySQL server: {}", describe(&e)))
            })?;
            for statement in session.setup_statements() {
                conn.query_drop(statement.as_str())
                    .await
                    .map_err(|e| OutputError::new(describe(&e)))?;
            }
            session.conn = Some(conn);
        }

        let Some(conn) = session.conn.as_mut() else {
            return Err(OutputError::new("Can't connect to MySQL server"));
        };

        match conn.query_drop(sql).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if is_connection_error(&e) {
                    session.conn = None;
                }
                Err(OutputError::new(describe(&e)))
            }
        }
    }
}

impl Escape for MysqlOutput {
    fn escape(&self, text: &str) -> String {
        escape_string(text)
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }
}

impl SqlOutput for MysqlOutput {
    fn execute(&self, sql: &str) -> impl Future<Output = Result<(), OutputError>> + Send {
        self.run(sql)
    }
}

/// Escape with the server's backslash rules, without the surrounding quotes.
pub fn escape_string(text: &str) -> String {
    let literal = mysql_async::Value::Bytes(text.as_bytes().to_vec()).as_sql(false);
    literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(str::to_string)
        .unwrap_or(literal)
}
