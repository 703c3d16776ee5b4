mod start;
mod tables;

pub use start::{cmd_dryrun, cmd_start};
pub use tables::cmd_tables;
