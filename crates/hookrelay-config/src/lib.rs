mod error;
mod project;
mod resolve;
mod rules;

pub use error::{ConfigError, ConfigResult};
pub use project::{
    resolve_env, DatabaseConfig, HooksConfig, ProjectConfig, SourceProcessConfig, StatsConfig,
};
pub use resolve::{resolve, ResolvedTables};
pub use rules::{HookBody, HookDecl, OneOrMany, TableRule, WILDCARD};
