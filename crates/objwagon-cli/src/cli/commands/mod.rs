//! CLI command handlers, one file per command.

mod checksum;
mod deploy;
mod get;
mod inspect;
mod put;
mod validate;

pub use checksum::run_checksum;
pub use deploy::run_deploy;
pub use get::run_get;
pub use inspect::{run_exists, run_list, run_newer};
pub use put::run_put;
pub use validate::run_validate;
