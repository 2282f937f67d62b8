//! CLI command handlers, one file per command.

mod checksum;
mod fetch;
mod inspect;

pub use checksum::run_checksum;
pub use fetch::{run_fetch, FetchOverrides};
pub use inspect::run_inspect;
