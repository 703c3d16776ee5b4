use hookrelay_core::{Error as CoreError, Result as CoreResult, SchemaProbe};
use mysql_async::prelude::*;
use mysql_async::Pool;
use tracing::warn;

use crate::error::describe;

const LIST_TABLES: &str = "
    SELECT TABLE_NAME
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA = ?
    AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME";

const LIST_COLUMNS: &str = "
    SELECT COLUMN_NAME
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = ?
    AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION";

/// Reads table and column names from `information_schema`.
pub struct MysqlSchemaProbe {
    pool: Pool,
    database: String,
    /// "source" or "destination", for error messages.
    side: &'static str,
}

impl MysqlSchemaProbe {
    pub fn new(pool: Pool, database: impl Into<String>, side: &'static str) -> Self {
        Self {
            pool,
            database: database.into(),
            side,
        }
    }

    pub async fn close(self) {
        if let Err(e) = self.pool.disconnect().await {
            warn!(side = self.side, error = %e, "Failed to close schema probe pool");
        }
    }

    fn catalog_error(&self, e: mysql_async::Error) -> CoreError {
        CoreError::Catalog {
            side: self.side,
            message: describe(&e),
        }
    }
}

impl SchemaProbe for MysqlSchemaProbe {
    async fn list_tables(&self) -> CoreResult<Vec<String>> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| self.catalog_error(e))?;

        conn.exec(LIST_TABLES, (self.database.as_str(),))
            .await
            .map_err(|e| self.catalog_error(e))
    }

    async fn list_columns(&self, table: &str) -> CoreResult<Vec<String>> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| self.catalog_error(e))?;

        conn.exec(LIST_COLUMNS, (self.database.as_str(), table))
            .await
            .map_err(|e| self.catalog_error(e))
    }
}
