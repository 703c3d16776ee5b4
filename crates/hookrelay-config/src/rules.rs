use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;

use hookrelay_core::{HookScope, HookSpec};

use crate::error::{ConfigError, ConfigResult};

/// Selector value meaning "every table in the catalog".
pub const WILDCARD: &str = "*";

/// A string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

/// One `[[tables]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TableRule {
    /// Table name(s), or `"*"` for every table.
    pub table: OneOrMany,
    /// Exclusions applied to a wildcard selector.
    #[serde(default)]
    pub table_without: Vec<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub hooks: Vec<HookDecl>,
}

impl TableRule {
    pub fn is_wildcard(&self) -> bool {
        self.table.to_vec().iter().any(|t| t == WILDCARD)
    }
}

/// One `[[tables.hooks]]` entry: a single `row` or `column` key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HookDecl {
    pub scopes: BTreeMap<String, HookBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookBody {
    #[serde(default)]
    pub name: Option<OneOrMany>,
    #[serde(default)]
    pub scripts: Option<OneOrMany>,
}

impl HookDecl {
    /// Expand the declaration into hook specs.
    ///
    /// Row hooks yield one spec per script; column hooks yield every
    /// (column, script) pair, columns outermost.
    pub fn to_specs(&self, table: &str, apply: bool) -> ConfigResult<Vec<HookSpec>> {
        let mut entries = self.scopes.iter();
        let (key, body) = match (entries.next(), entries.next()) {
            (None, _) => {
                return Err(ConfigError::MissingHookType {
                    table: table.to_string(),
                })
            }
            (Some(entry), None) => entry,
            (Some(_), Some(_)) => {
                return Err(ConfigError::AmbiguousHook {
                    table: table.to_string(),
                })
            }
        };

        let scope = HookScope::from_str(key).map_err(|_| ConfigError::InvalidHookType {
            table: table.to_string(),
            scope: key.clone(),
        })?;

        let scripts = non_empty(body.scripts.as_ref()).ok_or_else(|| ConfigError::MissingScripts {
            table: table.to_string(),
            scope: scope.to_string(),
        })?;

        match scope {
            HookScope::Row => Ok(scripts
                .into_iter()
                .map(|script| HookSpec::row(script, apply))
                .collect()),
            HookScope::Column => {
                let names = non_empty(body.name.as_ref()).ok_or_else(|| {
                    ConfigError::MissingColumnNames {
                        table: table.to_string(),
                    }
                })?;

                Ok(names
                    .iter()
                    .flat_map(|name| {
                        scripts
                            .iter()
                            .map(move |script| HookSpec::column(name, script, apply))
                    })
                    .collect())
            }
        }
    }
}

fn non_empty(values: Option<&OneOrMany>) -> Option<Vec<String>> {
    values
        .map(OneOrMany::to_vec)
        .filter(|v| !v.is_empty() && v.iter().all(|s| !s.is_empty()))
}
