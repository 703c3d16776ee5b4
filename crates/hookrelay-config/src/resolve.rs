use std::collections::{BTreeMap, BTreeSet};

use hookrelay_core::{SchemaCatalog, TableConfig};

use crate::error::{ConfigError, ConfigResult};
use crate::rules::{TableRule, WILDCARD};

/// The outcome of resolving table rules against the catalog.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTables {
    pub tables: BTreeMap<String, TableConfig>,
    /// Tables selected by more than one rule, each listed once in first-seen order.
    pub duplicates: Vec<String>,
}

/// Resolve `rules` against `catalog` into per-table configs.
///
/// Rules apply in order and a later rule replaces an earlier one for the
/// same table. Explicitly named tables missing from the catalog are skipped,
/// and a rule that selects nothing is not validated. Hook errors name the
/// first selected table. `apply` is stamped onto every hook (false for dry runs).
pub fn resolve(
    rules: &[TableRule],
    catalog: &SchemaCatalog,
    apply: bool,
) -> ConfigResult<ResolvedTables> {
    let mut resolved = ResolvedTables::default();

    for rule in rules {
        let names = select_tables(rule, catalog)?;
        let Some(first) = names.first() else {
            continue;
        };

        let mut hooks = Vec::new();
        for decl in &rule.hooks {
            hooks.extend(decl.to_specs(first, apply)?);
        }

        for name in names {
            let Some(info) = catalog.get(&name) else {
                continue;
            };

            let mut table = TableConfig::from_info(info).with_hooks(hooks.clone());
            if let Some(pk) = &rule.primary_key {
                table = table.with_primary_key(pk);
            }

            if resolved.tables.insert(name.clone(), table).is_some()
                && !resolved.duplicates.contains(&name)
            {
                resolved.duplicates.push(name);
            }
        }
    }

    Ok(resolved)
}

fn select_tables(rule: &TableRule, catalog: &SchemaCatalog) -> ConfigResult<Vec<String>> {
    let selector = rule.table.to_vec();
    if selector.is_empty() {
        return Err(ConfigError::EmptySelector);
    }

    if rule.is_wildcard() {
        let excluded: BTreeSet<&str> = rule.table_without.iter().map(String::as_str).collect();
        return Ok(catalog
            .tables()
            .map(|info| info.name.clone())
            .filter(|name| !excluded.contains(name.as_str()))
            .collect());
    }

    Ok(selector
        .into_iter()
        .filter(|name| name != WILDCARD && catalog.contains(name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectConfig;
    use hookrelay_core::{HookSpec, TableInfo};

    fn catalog(names: &[&str]) -> SchemaCatalog {
        SchemaCatalog::from_tables(names.iter().map(|n| TableInfo::new(*n)))
    }

    fn rules(tables_toml: &str) -> Vec<TableRule> {
        let toml_str = format!(
            r#"
[source]
host = "h"
username = "u"
database = "app"

[destination]
host = "h"
username = "u"
database = "copy"

{}
"#,
            tables_toml
        );
        ProjectConfig::parse(&toml_str).unwrap().tables
    }

    #[test]
    fn test_wildcard_with_exclusions() {
        let rules = rules(
            r#"
[[tables]]
table = "*"
table_without = ["b"]
"#,
        );

        let resolved = resolve(&rules, &catalog(&["a", "b", "c"]), true).unwrap();
        let names: Vec<&String> = resolved.tables.keys().collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(resolved.duplicates.is_empty());
    }

    #[test]
    fn test_explicit_names_skip_unknown_tables() {
        let rules = rules(
            r#"
[[tables]]
table = ["a", "ghost"]
primary_key = "uuid"
"#,
        );

        let resolved = resolve(&rules, &catalog(&["a", "b"]), true).unwrap();
        assert_eq!(resolved.tables.len(), 1);
        assert_eq!(resolved.tables["a"].primary_key, "uuid");
    }

    #[test]
    fn test_duplicates_reported_once_last_wins() {
        let rules = rules(
            r#"
[[tables]]
table = "x"
primary_key = "first"

[[tables]]
table = ["x", "y"]
primary_key = "second"

[[tables]]
table = "x"
primary_key = "third"
"#,
        );

        let resolved = resolve(&rules, &catalog(&["x", "y"]), true).unwrap();
        assert_eq!(resolved.duplicates, vec!["x"]);
        assert_eq!(resolved.tables["x"].primary_key, "third");
        assert_eq!(resolved.tables["y"].primary_key, "second");
    }

    #[test]
    fn test_hooks_and_apply_flag_are_attached() {
        let rules = rules(
            r#"
[[tables]]
table = "users"

[[tables.hooks]]
row = { scripts = ["scrub.rb"] }

[[tables.hooks]]
column = { name = ["email"], scripts = ["mask.rb"] }
"#,
        );

        let resolved = resolve(&rules, &catalog(&["users"]), false).unwrap();
        assert_eq!(
            resolved.tables["users"].hooks,
            vec![
                HookSpec::row("scrub.rb", false),
                HookSpec::column("email", "mask.rb", false),
            ]
        );
    }

    #[test]
    fn test_invalid_hook_fails_resolution() {
        let rules = rules(
            r#"
[[tables]]
table = "users"

[[tables.hooks]]
column = { scripts = ["mask.rb"] }
"#,
        );

        let err = resolve(&rules, &catalog(&["users"]), true).unwrap_err();
        assert!(matches!(err, ConfigError::MissingColumnNames { ref table } if table == "users"));
    }

    #[test]
    fn test_wildcard_hook_error_names_a_selected_table() {
        let rules = rules(
            r#"
[[tables]]
table = "*"
table_without = ["audit"]

[[tables.hooks]]
row = { scripts = [] }
"#,
        );

        let err = resolve(&rules, &catalog(&["audit", "orders", "users"]), true).unwrap_err();
        assert!(matches!(err, ConfigError::MissingScripts { ref table, .. } if table == "orders"));
    }

    #[test]
    fn test_rule_selecting_nothing_is_not_validated() {
        let rules = rules(
            r#"
[[tables]]
table = ["ghost"]

[[tables.hooks]]
column = { scripts = ["mask.rb"] }

[[tables]]
table = "users"
"#,
        );

        let resolved = resolve(&rules, &catalog(&["users"]), true).unwrap();
        let names: Vec<&String> = resolved.tables.keys().collect();
        assert_eq!(names, vec!["users"]);
    }

    #[test]
    fn test_catalog_flags_carried_over() {
        let mut info = TableInfo::new("orders");
        info.dest_exists = false;
        let catalog = SchemaCatalog::from_tables(vec![info]);

        let rules = rules(
            r#"
[[tables]]
table = "orders"
"#,
        );

        let resolved = resolve(&rules, &catalog, true).unwrap();
        let table = &resolved.tables["orders"];
        assert!(table.source_exists);
        assert!(!table.dest_exists);
        assert_eq!(table.primary_key, "id");
    }
}
