use std::collections::HashMap;

use crate::table::TableConfig;
use crate::types::ChangeEvent;

/// Routes events to the configured table they belong to.
#[derive(Debug, Clone, Default)]
pub struct Router {
    database: String,
    tables: HashMap<String, TableConfig>,
}

impl Router {
    pub fn new(database: impl Into<String>, tables: impl IntoIterator<Item = TableConfig>) -> Self {
        Self {
            database: database.into(),
            tables: tables
                .into_iter()
                .map(|t| (t.table_name.clone(), t))
                .collect(),
        }
    }

    /// The table config for an event, or `None` if the event is out of scope.
    ///
    /// Events from other databases and unconfigured tables are ignored.
    pub fn route(&self, event: &ChangeEvent) -> Option<&TableConfig> {
        if event.database != self.database {
            return None;
        }
        self.tables.get(&event.table)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableConfig> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
