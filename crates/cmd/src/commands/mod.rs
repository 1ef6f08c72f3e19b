pub mod catalog;
pub mod fetch;
pub mod open;
pub mod resolve;
pub mod show_config;
pub mod sync;

pub use catalog::list_command;
pub use fetch::fetch_command;
pub use open::{OpenArgs, open_command};
pub use resolve::resolve_command;
pub use show_config::show_config_command;
pub use sync::{SyncUpArgs, run_with_retry, sync_down_command, sync_test_command, sync_up_command};
