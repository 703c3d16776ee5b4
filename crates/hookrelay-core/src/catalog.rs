//! Snapshot of which tables and columns exist on each side of the replication.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use tracing::debug;

use crate::error::Result;

/// Read-only access to a database's information schema.
pub trait SchemaProbe: Send + Sync {
    /// Names of all base tables in the configured database.
    fn list_tables(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Column names of `table`, in ordinal order.
    fn list_columns(&self, table: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Existence information for one table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub source_exists: bool,
    pub dest_exists: bool,
    pub source_columns: BTreeSet<String>,
    pub dest_columns: BTreeSet<String>,
}

impl TableInfo {
    /// A table present on both sides with no column information.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_exists: true,
            dest_exists: true,
            source_columns: BTreeSet::new(),
            dest_columns: BTreeSet::new(),
        }
    }
}

/// Union of source and destination tables, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, TableInfo>,
}

impl SchemaCatalog {
    /// Build the catalog by probing both connections.
    ///
    /// Any probe failure aborts the build.
    pub async fn build<S, D>(source: &S, dest: &D) -> Result<Self>
    where
        S: SchemaProbe,
        D: SchemaProbe,
    {
        let source_tables: BTreeSet<String> = source.list_tables().await?.into_iter().collect();
        let dest_tables: BTreeSet<String> = dest.list_tables().await?.into_iter().collect();

        let mut tables = BTreeMap::new();
        for name in source_tables.union(&dest_tables) {
            let source_exists = source_tables.contains(name);
            let dest_exists = dest_tables.contains(name);

            let source_columns = if source_exists {
                source.list_columns(name).await?.into_iter().collect()
            } else {
                BTreeSet::new()
            };
            let dest_columns = if dest_exists {
                dest.list_columns(name).await?.into_iter().collect()
            } else {
                BTreeSet::new()
            };

            tables.insert(
                name.clone(),
                TableInfo {
                    name: name.clone(),
                    source_exists,
                    dest_exists,
                    source_columns,
                    dest_columns,
                },
            );
        }

        debug!(
            source_tables = source_tables.len(),
            dest_tables = dest_tables.len(),
            total = tables.len(),
            "Built schema catalog"
        );

        Ok(Self { tables })
    }

    pub fn from_tables(tables: impl IntoIterator<Item = TableInfo>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// All tables, ordered by name.
    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
