mod connect;
mod error;
mod output;
mod probe;

pub use connect::{new_pool, opts};
pub use error::{MysqlError, MysqlResult};
pub use output::{escape_string, MysqlOutput};
pub use probe::MysqlSchemaProbe;
